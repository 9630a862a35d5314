//! Audio device listing.

use clap::{Args, Subcommand};
use orbis_io::{AudioBackend, AudioDevice, CpalBackend, StreamDirection};

#[derive(Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    command: Option<DevicesCommand>,
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List all devices with their capture/playback capabilities
    List,

    /// Show the devices used when none is configured
    Default,
}

fn direction_flags(device: &AudioDevice) -> &'static str {
    match (device.is_input, device.is_output) {
        (true, true) => "in/out",
        (true, false) => "in",
        (false, true) => "out",
        (false, false) => "-",
    }
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    let backend = CpalBackend::new();
    match args.command.unwrap_or(DevicesCommand::List) {
        DevicesCommand::List => {
            let devices = backend.devices()?;
            if devices.is_empty() {
                println!("No audio devices found ({} backend).", backend.name());
                return Ok(());
            }
            println!("{:<6} {:>8} {:>4}  Name", "Dir", "Rate", "Ch");
            for device in &devices {
                println!(
                    "{:<6} {:>8} {:>4}  {}",
                    direction_flags(device),
                    device.default_sample_rate,
                    device.channels,
                    device.name
                );
            }
            println!("\nSelect a device with a name substring, e.g.");
            println!("  orbis realtime --config renderer.toml --output-device \"USB\"");
        }
        DevicesCommand::Default => {
            for direction in [StreamDirection::Capture, StreamDirection::Playback] {
                match backend.default_device(direction)? {
                    Some(d) => println!(
                        "{:<9} {} ({} Hz, {} ch)",
                        direction.label(),
                        d.name,
                        d.default_sample_rate,
                        d.channels
                    ),
                    None => println!("{:<9} none", direction.label()),
                }
            }
        }
    }
    Ok(())
}
