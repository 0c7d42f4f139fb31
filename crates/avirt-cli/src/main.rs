//! AVIRT command-line interface for creating streams, sealing the card, and
//! inspecting the registered sound card.

use anyhow::{bail, Context, Result};
use avirt_alsa::SystemControlProvider;
use avirt_core::{
    config::{bootstrap_template, AvirtConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH},
    logging,
    session::{AvirtSession, SessionStatus},
    stream::StreamSpec,
    workflow::{self, ApplyOptions, WorkflowLevel, WorkflowReport},
};
use avirt_provider::{CardInfo, PcmInfo, StreamDirection};
use clap::{Parser, Subcommand};
use log::debug;
use schemars::schema_for;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type SystemSession = AvirtSession<SystemControlProvider>;

/// Top-level command-line options shared by every subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "avirt",
    version,
    about = "Configure the AVIRT virtual sound card through configfs."
)]
struct Cli {
    /// Path to the AVIRT configuration file (defaults to $AVIRT_CONFIG, then /etc/avirt.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or list PCM streams.
    Stream {
        #[command(subcommand)]
        command: StreamCommands,
    },

    /// Seal the card; the driver registers it and no more streams can be added.
    Seal,

    /// Create every stream listed in the configuration, then seal the card.
    Apply {
        /// Create the streams but leave the card unsealed.
        #[arg(long)]
        no_seal: bool,

        /// Skip streams that already exist instead of failing.
        #[arg(long)]
        skip_existing: bool,
    },

    /// Show mount, seal, and stream state.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Show the registered card as reported by the control interface.
    CardInfo {
        #[arg(long)]
        json: bool,
    },

    /// Resolve the PCM device backing a stream.
    Pcm {
        /// Stream name.
        name: String,

        #[arg(short, long, default_value = "playback")]
        direction: StreamDirection,

        #[arg(long)]
        json: bool,
    },

    /// Validate a configuration file or emit the config schema.
    Validate {
        /// Path to the configuration file to validate.
        #[arg(short = 'f', long, default_value = DEFAULT_CONFIG_PATH)]
        file: PathBuf,

        /// Output the JSON schema instead of validating a file.
        #[arg(long)]
        schema: bool,
    },

    /// Bootstrap helpers for installers and provisioning scripts.
    Bootstrap {
        #[command(subcommand)]
        command: BootstrapCommands,
    },
}

#[derive(Subcommand, Debug)]
enum StreamCommands {
    /// Create a stream directory and write its attributes.
    Add {
        /// Stream name; becomes the PCM name once the card is sealed.
        name: String,

        /// Number of channels.
        #[arg(long)]
        channels: u32,

        #[arg(short, long, default_value = "playback")]
        direction: StreamDirection,

        /// Audio path to map the stream to.
        #[arg(long)]
        map: Option<String>,

        /// Also record the stream in the configuration file.
        #[arg(long)]
        save: bool,
    },

    /// List streams currently present in configfs.
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BootstrapCommands {
    /// Emit the bootstrap configuration template.
    Template,
}

/// Entry point: parse arguments and surface errors with an exit code.
fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

/// Dispatch to the requested subcommand.
fn run() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Stream { command } => {
            let mut session = open_session(&config_path)?;
            match command {
                StreamCommands::Add {
                    name,
                    channels,
                    direction,
                    map,
                    save,
                } => {
                    let path = session
                        .stream_new(&name, channels, direction, map.as_deref())
                        .with_context(|| format!("failed to create {direction} stream `{name}`"))?;
                    println!("Created {direction} stream {name} at {}", path.display());
                    if save {
                        let mut spec = StreamSpec::new(&name, channels, direction);
                        spec.map = map;
                        save_stream(session.config(), spec)?;
                    }
                }
                StreamCommands::List { json } => {
                    let status = session.status()?;
                    if json {
                        print_json(&status.streams)?;
                    } else {
                        print_stream_table(&status);
                    }
                }
            }
        }
        Commands::Seal => {
            let mut session = open_session(&config_path)?;
            session.card_seal().context("failed to seal card")?;
            println!("Card sealed.");
            match session.card_index() {
                Ok(index) => println!("Registered as card {index}."),
                Err(err) => println!("Registered card not located yet: {err}"),
            }
        }
        Commands::Apply {
            no_seal,
            skip_existing,
        } => {
            let mut session = open_session(&config_path)?;
            let options = ApplyOptions {
                seal: !no_seal,
                skip_existing,
            };
            let report = workflow::apply(&mut session, options)
                .with_context(|| format!("failed to apply {}", config_path.display()))?;
            print_report(report);
        }
        Commands::Status { json } => {
            let mut session = open_session(&config_path)?;
            let status = session.status()?;
            if json {
                print_json(&status)?;
            } else {
                print_status(&status);
            }
        }
        Commands::CardInfo { json } => {
            let mut session = open_session(&config_path)?;
            let info = session.card_info().context("failed to query card info")?;
            if json {
                print_json(&info)?;
            } else {
                print_card_info(&info);
            }
        }
        Commands::Pcm {
            name,
            direction,
            json,
        } => {
            let mut session = open_session(&config_path)?;
            let pcm = session
                .pcm_device(&name, direction)
                .with_context(|| format!("failed to resolve {direction} stream `{name}`"))?;
            if json {
                print_json(&pcm)?;
            } else {
                print_pcm(&pcm);
            }
        }
        Commands::Validate { file, schema } => {
            if schema {
                let schema = schema_for!(AvirtConfig);
                println!("{}", to_string_pretty(&schema)?);
                return Ok(());
            }

            let config = AvirtConfig::load(&file)
                .with_context(|| format!("failed to load {}", file.display()))?;
            let issues = config.validate();
            if issues.is_empty() {
                println!(
                    "{} is valid ({} stream(s)).",
                    file.display(),
                    config.streams.len()
                );
            } else {
                println!("{} has {} issue(s):", file.display(), issues.len());
                for issue in &issues {
                    println!("  - {issue}");
                }
                bail!("configuration validation failed");
            }
        }
        Commands::Bootstrap { command } => match command {
            BootstrapCommands::Template => print!("{}", bootstrap_template()),
        },
    }

    Ok(())
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| {
        std::env::var_os(CONFIG_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn load_cli_config(path: &Path) -> Result<AvirtConfig> {
    AvirtConfig::load_or_bootstrap(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Add `spec` to the configuration file, replacing an entry with the same name and direction.
fn save_stream(config: &AvirtConfig, spec: StreamSpec) -> Result<()> {
    let mut config = config.clone();
    let replaced = match config.stream(&spec.name, spec.direction) {
        Some(existing) if *existing == spec => {
            println!("{} already lists this stream.", config.path.display());
            return Ok(());
        }
        Some(_) => true,
        None => false,
    };
    config
        .streams
        .retain(|stream| !(stream.name == spec.name && stream.direction == spec.direction));
    config.streams.push(spec);
    config
        .save()
        .with_context(|| format!("failed to update {}", config.path.display()))?;
    println!(
        "{} stream in {}.",
        if replaced { "Updated" } else { "Recorded" },
        config.path.display()
    );
    Ok(())
}

fn open_session(path: &Path) -> Result<SystemSession> {
    let config = load_cli_config(path)?;
    for issue in config.validate() {
        debug!("configuration issue: {issue}");
    }
    let control = SystemControlProvider::from_config(&config);
    Ok(AvirtSession::new(Arc::new(config), control))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", to_string_pretty(value)?);
    Ok(())
}

/// Pretty-print a workflow report so humans can follow along.
fn print_report(report: WorkflowReport) {
    println!("{}", report.title);
    for event in report.events {
        println!("  [{}] {}", level_tag(event.level), event.message);
    }
}

/// Short tag used when printing workflow severity levels.
fn level_tag(level: WorkflowLevel) -> &'static str {
    match level {
        WorkflowLevel::Info => "INFO",
        WorkflowLevel::Success => "OK",
        WorkflowLevel::Warn => "WARN",
        WorkflowLevel::Error => "ERR",
    }
}

fn print_status(status: &SessionStatus) {
    match &status.configfs_root {
        Some(root) if status.mounted => println!("configfs: mounted at {}", root.display()),
        _ => println!("configfs: not mounted"),
    }
    println!(
        "card: {}",
        if status.sealed { "sealed" } else { "unsealed" }
    );
    if let Some(index) = status.card_index {
        println!("card index: {index}");
    }
    print_stream_table(status);
}

fn print_stream_table(status: &SessionStatus) {
    if status.streams.is_empty() {
        println!("No streams configured.");
        return;
    }
    println!("{:<10} {:<32} {:>8}  MAP", "DIRECTION", "NAME", "CHANNELS");
    for stream in &status.streams {
        let channels = stream
            .channels
            .map(|value| value.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{:<10} {:<32} {:>8}  {}",
            stream.direction,
            stream.name,
            channels,
            stream.map.as_deref().unwrap_or("-")
        );
    }
}

fn print_card_info(info: &CardInfo) {
    println!("Card {}", info.card);
    println!("  id:         {}", info.id);
    println!("  driver:     {}", info.driver);
    println!("  name:       {}", info.name);
    println!("  longname:   {}", info.longname);
    if !info.mixername.is_empty() {
        println!("  mixername:  {}", info.mixername);
    }
    if !info.components.is_empty() {
        println!("  components: {}", info.components);
    }
}

fn print_pcm(pcm: &PcmInfo) {
    println!(
        "{} stream {} -> hw:{},{} ({} subdevice(s), {} available)",
        pcm.direction, pcm.name, pcm.card, pcm.device, pcm.subdevices_count, pcm.subdevices_avail
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn stream_add_parses_direction_and_map() {
        let cli = Cli::try_parse_from([
            "avirt", "stream", "add", "voice", "--channels", "1", "-d", "capture", "--map",
            "ap_fddsp", "--save",
        ])
        .unwrap();
        match cli.command {
            Commands::Stream {
                command:
                    StreamCommands::Add {
                        name,
                        channels,
                        direction,
                        map,
                        save,
                    },
            } => {
                assert!(save);
                assert_eq!(name, "voice");
                assert_eq!(channels, 1);
                assert_eq!(direction, StreamDirection::Capture);
                assert_eq!(map.as_deref(), Some("ap_fddsp"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let result = Cli::try_parse_from([
            "avirt", "stream", "add", "voice", "--channels", "1", "-d", "sideways",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn save_stream_records_and_replaces_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avirt.toml");
        let config = AvirtConfig::load_or_bootstrap(&path).unwrap();

        let spec = StreamSpec::new("media", 2, StreamDirection::Playback).with_map("ap_loopback");
        save_stream(&config, spec.clone()).unwrap();
        let config = AvirtConfig::load(&path).unwrap();
        assert_eq!(config.streams, vec![spec]);

        let wider = StreamSpec::new("media", 6, StreamDirection::Playback);
        save_stream(&config, wider.clone()).unwrap();
        let config = AvirtConfig::load(&path).unwrap();
        save_stream(&config, StreamSpec::new("media", 1, StreamDirection::Capture)).unwrap();
        let config = AvirtConfig::load(&path).unwrap();
        assert_eq!(config.streams.len(), 2);
        assert_eq!(config.stream("media", StreamDirection::Playback), Some(&wider));
    }

    #[test]
    fn explicit_config_flag_wins() {
        let path = resolve_config_path(Some(PathBuf::from("/tmp/avirt.toml")));
        assert_eq!(path, PathBuf::from("/tmp/avirt.toml"));
    }
}
