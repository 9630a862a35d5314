//! Offline rendering of WAV files.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use orbis_core::StringParameter;
use orbis_flows::SceneSource;
use orbis_io::{read_wav_info, render_offline};

use super::common::{RendererArgs, build_renderer};

#[derive(Args)]
pub struct OfflineArgs {
    /// Input WAV with one channel per object signal
    input: PathBuf,

    /// Output WAV with one channel per loudspeaker output
    output: PathBuf,

    /// JSON scene message applied before the first block
    #[arg(short, long)]
    scene: Option<PathBuf>,

    #[command(flatten)]
    renderer: RendererArgs,
}

pub fn run(args: OfflineArgs) -> anyhow::Result<()> {
    let info = read_wav_info(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let mut config = args.renderer.load_config()?;
    config.renderer.sample_rate = info.sample_rate;

    let mut flow = build_renderer(&config, SceneSource::External)?;
    if let Some(scene) = &args.scene {
        let message = std::fs::read_to_string(scene)
            .with_context(|| format!("reading scene {}", scene.display()))?;
        let sender = flow
            .parameter_sender("sceneInput")
            .context("renderer has no scene input")?;
        sender.send(StringParameter::new(message))?;
    }

    println!(
        "Rendering {} ({} ch, {} Hz, {:.2}s)",
        args.input.display(),
        info.channels,
        info.sample_rate,
        info.duration().as_secs_f64()
    );
    let report = render_offline(&mut flow, &args.input, &args.output)?;
    println!(
        "Wrote {} frames in {} blocks to {}",
        report.frames,
        report.blocks,
        args.output.display()
    );
    if report.silenced_blocks > 0 {
        println!("{} block(s) were silenced", report.silenced_blocks);
    }
    Ok(())
}
