mod midi;
mod surface;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use crossbeam_channel::unbounded;
use midi_motion_core::{
    AppConfig, GeometryPool, GraphicsHost, InputRouter, RipplePool, VisualPool,
};
use tracing_subscriber::EnvFilter;

use crate::midi::HardwareMidi;
use crate::surface::{TerminalPump, TerminalSurfaceProvider};

fn main() -> midi_motion_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            device,
            config,
            fps,
        } => run(device.as_deref(), config.as_deref(), fps),
        Commands::Sources => list_sources(),
    }
}

fn run(device: Option<&str>, config: Option<&Path>, fps: Option<u32>) -> midi_motion_core::Result<()> {
    let mut config = match config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(fps) = fps {
        config.render.target_fps = fps;
    }

    let mut platform = HardwareMidi;
    let mut router = InputRouter::connect(&mut platform)?;

    let (sender, receiver) = unbounded();
    router.add_listener(Box::new(move |event| {
        let _ = sender.send(*event);
    }));

    match device {
        Some(wanted) => {
            let id = router
                .list_sources()
                .iter()
                .find(|source| source.id == wanted || source.name == wanted)
                .map(|source| source.id.clone())
                .ok_or_else(|| format!("no MIDI source matches `{wanted}`"))?;
            router.select(Some(&id))?;
        }
        None => router.on_hot_plug(),
    }
    match router.selected() {
        Some(source) => tracing::info!(source, "MIDI input selected"),
        None => tracing::warn!("no MIDI input available; rendering an idle scene"),
    }

    let pools: Vec<Box<dyn VisualPool>> = vec![
        Box::new(GeometryPool::new(config.visual.cube_capacity)),
        Box::new(RipplePool::new(config.visual.ripple_capacity)),
    ];
    let (mut host, handle) = GraphicsHost::new(
        Box::new(TerminalSurfaceProvider),
        pools,
        &config.render,
    );
    host.initialize()?;

    let mut pump = TerminalPump::new(config.render.target_fps);
    let result = host.run(&mut pump, &receiver);

    handle.dispose();
    router.dispose();
    result
}

fn list_sources() -> midi_motion_core::Result<()> {
    let mut platform = HardwareMidi;
    let router = InputRouter::connect(&mut platform)?;

    if !router.is_available() {
        println!("MIDI access is not available");
        return Ok(());
    }
    if router.list_sources().is_empty() {
        println!("No MIDI inputs available");
        return Ok(());
    }
    for source in router.list_sources() {
        println!("{}\t{}", source.id, source.name);
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "MIDI-driven motion graphics in the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render MIDI events as live geometry.
    Run {
        /// MIDI source to use, by id or name. Defaults to the first one.
        #[arg(short, long)]
        device: Option<String>,
        /// Optional configuration file to load on startup.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the configured frame rate.
        #[arg(long)]
        fps: Option<u32>,
    },
    /// List the available MIDI input sources.
    Sources,
}
