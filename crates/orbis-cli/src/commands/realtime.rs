//! Realtime rendering between audio devices.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Args;
use orbis_config::AudioBackendKind;
use orbis_flows::SceneSource;
use orbis_io::{CpalBackend, DuplexConfig, DuplexStream};

use super::common::{RendererArgs, build_renderer};

#[derive(Args)]
pub struct RealtimeArgs {
    #[command(flatten)]
    renderer: RendererArgs,

    /// UDP port for scene messages
    #[arg(short, long)]
    port: Option<u16>,

    /// Capture device (name substring)
    #[arg(long)]
    input_device: Option<String>,

    /// Playback device (name substring)
    #[arg(long)]
    output_device: Option<String>,

    /// Hardware buffer size in frames (default: the renderer period)
    #[arg(long)]
    buffer_size: Option<u32>,
}

pub fn run(args: RealtimeArgs) -> anyhow::Result<()> {
    let config = args.renderer.load_config()?;
    let port = args.port.or(config.scene.port);
    let source = port.map_or(SceneSource::External, SceneSource::Udp);
    if port.is_none() {
        tracing::warn!("no scene port configured, objects stay silent");
    }
    let flow = build_renderer(&config, source)?;

    let backend = match config.audio.backend {
        AudioBackendKind::Cpal => CpalBackend::new(),
    };
    let duplex = DuplexConfig {
        input_device: args.input_device.or(config.audio.input_device),
        output_device: args.output_device.or(config.audio.output_device),
        buffer_size: args.buffer_size,
    };

    let r = &config.renderer;
    println!("Rendering {} object(s) to {} output(s)", r.inputs, r.outputs);
    println!("  Array:       {}", r.array.display());
    println!("  Sample rate: {} Hz", r.sample_rate);
    println!("  Period:      {} samples", r.period);
    match port {
        Some(port) => println!("  Scene port:  UDP {port}"),
        None => println!("  Scene port:  none"),
    }
    println!("\nPress Ctrl+C to stop...\n");

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        flag.store(false, Ordering::SeqCst);
    })?;

    let stream = DuplexStream::start(&backend, &duplex, flow)?;
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    let stats = stream.stats();
    println!("Blocks:    {}", stats.callbacks.load(Ordering::Relaxed));
    println!("Silenced:  {}", stats.silenced.load(Ordering::Relaxed));
    println!("Aborted:   {}", stats.aborted.load(Ordering::Relaxed));
    println!("Underruns: {} samples", stats.underruns.load(Ordering::Relaxed));
    println!("Overruns:  {} samples", stats.overruns.load(Ordering::Relaxed));
    drop(stream);
    println!("Done!");
    Ok(())
}
