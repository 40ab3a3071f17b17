use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use coreaudio_aggregate::{
    AudioDevice, AudioHalError, AudioSystem, DeviceSpec, MemoryBackend, PresetFile, Result,
};

#[derive(Parser)]
#[command(name = "coreaudio-aggregate", version, about = "Inspect devices and manage aggregate devices")]
struct Cli {
    /// Run against a simulated device set instead of the system HAL.
    /// The set is rebuilt on every run, so `destroy` is not available.
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all devices
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one device, including its sub-devices if it is an aggregate
    Show {
        uid: String,
        #[arg(long)]
        json: bool,
    },
    /// List the presets in a preset file
    Presets {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Create the aggregate device described by a preset
    Create {
        #[arg(long)]
        preset: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Destroy an aggregate device by object id
    Destroy { id: u32 },
}

fn simulated_system() -> AudioSystem {
    let memory = MemoryBackend::new();
    memory.add_device(
        DeviceSpec::new("BuiltInMicrophoneDevice", "Built-in Microphone")
            .manufacturer("Apple Inc.")
            .input(1),
    );
    memory.add_device(
        DeviceSpec::new("BuiltInSpeakerDevice", "Built-in Speakers")
            .manufacturer("Apple Inc.")
            .output(2),
    );
    memory.add_device(
        DeviceSpec::new("USBInterface:1", "USB Interface")
            .input(2)
            .output(2)
            .sample_rate(96000.0),
    );
    AudioSystem::with_backend(Arc::new(memory))
}

fn load_presets(config: Option<PathBuf>) -> Result<PresetFile> {
    match config {
        Some(path) => PresetFile::load(&path),
        None => PresetFile::load_default(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| AudioHalError::Other(e.to_string()))
}

fn print_device(device: &AudioDevice, indent: &str) {
    let info = device.info();
    println!(
        "{}{:>4}  {:<32} {:<40} in:{:<3} out:{:<3} {}",
        indent,
        info.id,
        info.name.as_deref().unwrap_or("Unknown"),
        info.uid.as_deref().unwrap_or("-"),
        info.input_channels,
        info.output_channels,
        info.sample_rate
            .map(|r| format!("{} Hz", r))
            .unwrap_or_default(),
    );
}

fn run(cli: Cli) -> Result<()> {
    if cli.simulate && matches!(cli.command, Command::Destroy { .. }) {
        return Err(AudioHalError::NotSupported(
            "destroy with --simulate, simulated devices do not outlive the command".to_string(),
        ));
    }

    let system = if cli.simulate {
        simulated_system()
    } else {
        AudioSystem::new()?
    };

    match cli.command {
        Command::List { json } => {
            let devices = system.all_devices();
            if json {
                let infos: Vec<_> = devices.iter().map(AudioDevice::info).collect();
                println!("{}", to_json(&infos)?);
            } else {
                for device in &devices {
                    print_device(device, "");
                }
            }
        }
        Command::Show { uid, json } => {
            let device = system
                .device_by_uid(&uid)
                .ok_or_else(|| AudioHalError::DeviceNotFound(uid.clone()))?;
            let subs = device.owned_aggregate_devices().unwrap_or_default();

            if json {
                let infos: Vec<_> = subs.iter().map(AudioDevice::info).collect();
                let value = serde_json::json!({
                    "device": device.info(),
                    "main_sub_device": device.main_sub_device().and_then(|d| d.uid()),
                    "clock_device": device.clock_device().and_then(|d| d.uid()),
                    "sub_devices": infos,
                });
                println!("{}", to_json(&value)?);
                return Ok(());
            }

            print_device(&device, "");
            if let Some(main) = device.main_sub_device() {
                println!("  main:  {}", main);
            }
            if let Some(clock) = device.clock_device() {
                println!("  clock: {}", clock);
            }
            for sub in &subs {
                print_device(sub, "  ");
                println!(
                    "        latency: {}  drift: {}  quality: {}",
                    sub.extra_latency().map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                    sub.drift_compensation().map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                    sub.drift_compensation_quality()
                        .map(|v| format!("{:#04x}", v))
                        .unwrap_or_else(|| "-".into()),
                );
            }
        }
        Command::Presets { config } => {
            let presets = load_presets(config)?;
            for preset in &presets.presets {
                println!(
                    "{:<24} {:<40} main: {}  subs: {}",
                    preset.name,
                    preset.uid,
                    preset.main.as_deref().unwrap_or("-"),
                    preset.sub_devices.join(", ")
                );
            }
        }
        Command::Create { preset, config } => {
            let presets = load_presets(config)?;
            let preset = presets
                .find(&preset)
                .ok_or_else(|| AudioHalError::Config(format!("No preset named {}", preset)))?;
            let aggregate = system.create_from_preset(preset)?;
            println!("Created {}", aggregate);
        }
        Command::Destroy { id } => {
            system.remove_aggregate_device(id)?;
            println!("Destroyed {}", id);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> Result<()> {
        run(Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn test_simulated_destroy_rejected() {
        let err = run_args(&["coreaudio-aggregate", "--simulate", "destroy", "4"]).unwrap_err();
        assert!(matches!(err, AudioHalError::NotSupported(_)));
    }

    #[test]
    fn test_simulated_list_and_show() {
        run_args(&["coreaudio-aggregate", "--simulate", "list", "--json"]).unwrap();
        run_args(&["coreaudio-aggregate", "show", "BuiltInSpeakerDevice", "--simulate"]).unwrap();

        let err = run_args(&["coreaudio-aggregate", "--simulate", "show", "missing"]).unwrap_err();
        assert_eq!(err, AudioHalError::DeviceNotFound("missing".to_string()));
    }
}
