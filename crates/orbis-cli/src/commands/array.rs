//! Loudspeaker array inspection.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use orbis_panning::LoudspeakerArray;

#[derive(Args)]
pub struct ArrayArgs {
    /// Loudspeaker array file (.xml or text format)
    file: PathBuf,
}

pub fn run(args: ArrayArgs) -> anyhow::Result<()> {
    let array = LoudspeakerArray::load(&args.file)
        .with_context(|| format!("loading {}", args.file.display()))?;

    println!("Array: {}", args.file.display());
    let kind = match (array.is_2d(), array.is_infinite()) {
        (true, true) => "2D, plane waves",
        (true, false) => "2D",
        (false, true) => "3D, plane waves",
        (false, false) => "3D",
    };
    println!("  Layout:     {kind}");
    println!(
        "  Speakers:   {} ({} regular, {} virtual)",
        array.number_of_speakers(),
        array.number_of_regular_speakers(),
        array.number_of_virtual_speakers()
    );
    println!("  Triplets:   {}", array.number_of_triplets());
    println!("  Subwoofers: {}", array.number_of_subwoofers());
    println!("  Outputs:    {}", array.number_of_outputs());

    println!("\nLoudspeakers:");
    for speaker in array.speakers() {
        let p = speaker.position();
        let channel = speaker
            .channel()
            .map_or_else(|| "virtual".to_owned(), |c| format!("ch {c}"));
        println!(
            "  {:>3}  {:<8} ({:>6.3}, {:>6.3}, {:>6.3})  gain {:.3}  delay {:.4}s",
            speaker.id(),
            channel,
            p.x,
            p.y,
            p.z,
            speaker.gain(),
            speaker.delay()
        );
    }

    if !array.triplets().is_empty() {
        println!("\nTriplets:");
        for (index, triplet) in array.triplets().iter().enumerate() {
            let ids: Vec<String> = triplet
                .vertices()
                .iter()
                .filter_map(|&v| array.speakers().get(v).map(|s| s.id().to_string()))
                .collect();
            println!("  {index:>3}  {}", ids.join(" "));
        }
    }

    if !array.subwoofers().is_empty() {
        println!("\nSubwoofers:");
        for sub in array.subwoofers() {
            println!(
                "  ch {}  gain {:.3}  delay {:.4}s",
                sub.channel(),
                sub.gain(),
                sub.delay()
            );
        }
    }
    Ok(())
}
