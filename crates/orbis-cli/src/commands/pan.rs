//! VBAP gain calculation for a single direction.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use orbis_panning::{LoudspeakerArray, Vbap, spherical_to_cartesian};

#[derive(Args)]
pub struct PanArgs {
    /// Loudspeaker array file (.xml or text format)
    array: PathBuf,

    /// Azimuth in degrees, counter-clockwise from the x axis
    #[arg(allow_hyphen_values = true)]
    azimuth: f32,

    /// Elevation in degrees
    #[arg(default_value_t = 0.0, allow_hyphen_values = true)]
    elevation: f32,

    /// Distance in metres
    #[arg(short, long, default_value_t = 1.0)]
    distance: f32,

    /// Treat the direction as a plane wave
    #[arg(long)]
    plane_wave: bool,
}

pub fn run(args: PanArgs) -> anyhow::Result<()> {
    let array = LoudspeakerArray::load(&args.array)
        .with_context(|| format!("loading {}", args.array.display()))?;
    let mut vbap = Vbap::new(&array)?;
    let position = spherical_to_cartesian(args.azimuth, args.elevation, args.distance);

    let mut gains = vec![0.0; array.number_of_regular_speakers()];
    let Some(triplet) = vbap.calculate_gains(position, args.plane_wave, &mut gains) else {
        println!("No triplet covers az {} el {}", args.azimuth, args.elevation);
        return Ok(());
    };

    println!(
        "az {} el {} r {}: triplet {triplet}",
        args.azimuth, args.elevation, args.distance
    );
    for (speaker, gain) in array.speakers().iter().zip(&gains) {
        if let Some(channel) = speaker.channel() {
            println!("  speaker {:>3} ch {:>3}  {gain:.4}", speaker.id(), channel);
        }
    }
    Ok(())
}
