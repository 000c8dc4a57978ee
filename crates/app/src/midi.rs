//! Hardware MIDI access over midir.

use midi_motion_core::{
    MidiAccess, MidiCapability, MidiMotionError, MidiPlatform, RawFrameCallback, Result,
    SourceInfo,
};
use midir::{MidiInput, MidiInputConnection};

const CLIENT_NAME: &str = "midi-motion";

/// Platform implementation backed by the system MIDI service.
pub struct HardwareMidi;

impl MidiPlatform for HardwareMidi {
    fn request_access(&mut self) -> Result<MidiCapability> {
        match MidiInput::new(CLIENT_NAME) {
            Ok(_) => Ok(MidiCapability::Available(Box::new(MidirAccess {
                connection: None,
            }))),
            Err(err) => {
                tracing::debug!(%err, "MIDI backend unavailable");
                Ok(MidiCapability::Unavailable)
            }
        }
    }
}

/// At most one open input connection at a time, keyed by port id.
struct MidirAccess {
    connection: Option<(String, MidiInputConnection<()>)>,
}

impl MidirAccess {
    fn close_current(&mut self) {
        if let Some((_, connection)) = self.connection.take() {
            connection.close();
        }
    }
}

impl MidiAccess for MidirAccess {
    fn sources(&mut self) -> Vec<SourceInfo> {
        let Ok(input) = MidiInput::new(CLIENT_NAME) else {
            return Vec::new();
        };
        input
            .ports()
            .iter()
            .map(|port| SourceInfo {
                id: port.id(),
                name: input
                    .port_name(port)
                    .unwrap_or_else(|_| "unknown device".to_string()),
            })
            .collect()
    }

    fn attach(&mut self, source_id: &str, mut callback: RawFrameCallback) -> Result<()> {
        self.close_current();

        let input = MidiInput::new(CLIENT_NAME)
            .map_err(|err| MidiMotionError::Acquisition(err.to_string()))?;
        let port = input
            .ports()
            .into_iter()
            .find(|port| port.id() == source_id)
            .ok_or_else(|| MidiMotionError::msg(format!("unknown MIDI source `{source_id}`")))?;
        let connection = input
            .connect(
                &port,
                "midi-motion-in",
                move |_timestamp, frame, _| callback(frame),
                (),
            )
            .map_err(|err| MidiMotionError::Acquisition(err.to_string()))?;

        self.connection = Some((source_id.to_string(), connection));
        Ok(())
    }

    fn detach(&mut self, source_id: &str) {
        if self
            .connection
            .as_ref()
            .is_some_and(|(id, _)| id == source_id)
        {
            self.close_current();
        }
    }
}
