//! Proctor Agent CLI
//!
//! Integrity event engine for proctored video interviews.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use proctor_agent::{
    config::Config,
    core::ProctorEngine,
    perception::FrameReport,
    MONITORING_NOTICE, VERSION,
};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "proctor-agent")]
#[command(version = VERSION)]
#[command(about = "Integrity event engine for proctored video interviews", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the frame analysis endpoints
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind to (defaults to the configured address)
        #[arg(long)]
        bind: Option<String>,

        /// Recording backend base URL
        #[arg(long, env = "BACKEND_URL")]
        recorder_url: Option<String>,

        /// Keep events local instead of forwarding them
        #[arg(long)]
        no_recorder: bool,
    },

    /// Replay recorded frame reports (JSON lines) through the engine
    Replay {
        /// File with one frame report per line
        file: PathBuf,

        /// Interview id to analyze under
        #[arg(long, default_value = "replay")]
        session: String,
    },

    /// Show effective configuration
    Config,

    /// Show persisted audit counters
    Status,

    /// Display the monitoring notice shown to candidates
    Notice,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("proctor_agent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Could not load configuration, using defaults: {}", e);
            Config::default()
        }
    };

    match cli.command {
        Commands::Serve {
            port,
            bind,
            recorder_url,
            no_recorder,
        } => {
            cmd_serve(config, port, bind, recorder_url, no_recorder);
        }
        Commands::Replay { file, session } => {
            cmd_replay(&config, &file, &session);
        }
        Commands::Config => {
            cmd_config(&config);
        }
        Commands::Status => {
            cmd_status(&config);
        }
        Commands::Notice => {
            println!("{MONITORING_NOTICE}");
        }
    }
}

#[cfg(feature = "server")]
fn cmd_serve(
    config: Config,
    port: Option<u16>,
    bind: Option<String>,
    recorder_url: Option<String>,
    no_recorder: bool,
) {
    use proctor_agent::recorder::RecorderConfig;
    use proctor_agent::server::{run, ServerConfig};

    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create directories: {}", e);
    }

    let bind = bind.unwrap_or_else(|| config.server.bind_address.clone());
    let bind_address = match bind.parse() {
        Ok(address) => address,
        Err(e) => {
            eprintln!("Error: invalid bind address '{bind}': {e}");
            std::process::exit(1);
        }
    };

    let recorder = if no_recorder {
        None
    } else {
        Some(RecorderConfig::new(
            recorder_url.unwrap_or_else(|| config.recorder_url.clone()),
        ))
    };

    let server_config = ServerConfig {
        bind_address,
        port: port.unwrap_or(config.server.port),
        detection: config.detection.clone(),
        recorder,
        audit_path: Some(config.audit_path()),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: could not start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let result: anyhow::Result<()> = runtime.block_on(async move {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Proctor Agent v{VERSION} listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        // Let the server drain and persist the audit log
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        Ok(())
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "server"))]
fn cmd_serve(
    _config: Config,
    _port: Option<u16>,
    _bind: Option<String>,
    _recorder_url: Option<String>,
    _no_recorder: bool,
) {
    eprintln!("Error: serve requires the `server` feature");
    std::process::exit(1);
}

/// One recorded frame.
#[derive(Deserialize)]
struct ReplayFrame {
    #[serde(flatten)]
    report: FrameReport,
    /// Unix seconds; frames without one are spaced one second apart
    #[serde(default)]
    timestamp: Option<f64>,
}

fn replay_time(timestamp: Option<f64>, start: DateTime<Utc>, index: usize) -> DateTime<Utc> {
    timestamp
        .and_then(|secs| DateTime::<Utc>::from_timestamp_millis((secs * 1000.0).round() as i64))
        .unwrap_or_else(|| start + Duration::seconds(index as i64))
}

fn cmd_replay(config: &Config, file: &Path, session: &str) {
    let handle = match std::fs::File::open(file) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error opening {file:?}: {e}");
            std::process::exit(1);
        }
    };

    let engine = ProctorEngine::new(config.detection.clone());
    let start = Utc::now();
    engine.open_session(session);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut frames = 0usize;
    let mut total_events = 0usize;

    for (index, line) in BufReader::new(handle).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error reading {file:?}: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let frame: ReplayFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Skipping malformed frame on line {}: {}", index + 1, e);
                continue;
            }
        };

        let at = replay_time(frame.timestamp, start, index);
        let events = engine.analyze_report(session, &frame.report, at);
        frames += 1;
        total_events += events.len();

        for event in &events {
            match serde_json::to_string(event) {
                Ok(json) => {
                    let _ = writeln!(out, "{json}");
                }
                Err(e) => eprintln!("Error serializing event: {e}"),
            }
        }
    }

    if let Some(stats) = engine.session_stats(session) {
        tracing::info!(frames, total_events, recorded = stats.total_events, "replay finished");
    }
    engine.end_session(session);
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_status(config: &Config) {
    println!("Proctor Agent Status");
    println!("====================");
    println!();

    let stats_path = config.audit_path();
    if !stats_path.exists() {
        println!("No audit data found at {stats_path:?}.");
        return;
    }

    let content = match std::fs::read_to_string(&stats_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {stats_path:?}: {e}");
            return;
        }
    };

    match serde_json::from_str::<proctor_agent::audit::log::PersistedStats>(&content) {
        Ok(stats) => {
            println!("Cumulative Statistics:");
            println!("  Frames analyzed: {}", stats.frames_analyzed);
            println!("  Alerts emitted: {}", stats.events_emitted);
            println!(
                "    multiple faces: {}, focus lost: {}, drowsiness: {}",
                stats.events_by_kind[0], stats.events_by_kind[1], stats.events_by_kind[2]
            );
            println!(
                "    face missing: {}, suspicious object: {}",
                stats.events_by_kind[3], stats.events_by_kind[4]
            );
            println!(
                "  Sessions started/ended: {}/{}",
                stats.sessions_started, stats.sessions_ended
            );
            println!(
                "  Deliveries ok/failed: {}/{}",
                stats.deliveries_succeeded, stats.deliveries_failed
            );
            println!("  Last updated: {}", stats.last_updated.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        Err(e) => eprintln!("Error parsing audit data: {e}"),
    }
}
