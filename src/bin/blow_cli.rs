use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mist_reveal::audio::Sample;
use mist_reveal::config::AppConfig;
use mist_reveal::engine::backend::wav_duration;
use mist_reveal::engine::{
    default_input, BlowIntensityDetector, GrantedPermission, SamplerStats, Thresholds, WavInput,
};
use mist_reveal::reveal::RevealSession;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(
    name = "blow_cli",
    about = "Desktop harness for the Mist Reveal blow detector"
)]
struct Cli {
    /// JSON configuration file (defaults to assets/blow_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a single metering reading
    Classify {
        /// Average power in dBFS
        #[arg(long, allow_negative_numbers = true)]
        average: f32,
        /// Peak power in dBFS
        #[arg(long, allow_negative_numbers = true)]
        peak: f32,
    },
    /// Replay a WAV fixture through detector and reveal, one JSON line per update
    Replay {
        wav: PathBuf,
    },
    /// Sample the default input device and print blow samples
    Listen {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

fn main() -> ExitCode {
    mist_reveal::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_else(AppConfig::load);

    match cli.command {
        Commands::Classify { average, peak } => run_classify(&config, average, peak),
        Commands::Replay { wav } => run_replay(&config, &wav),
        Commands::Listen { seconds } => run_listen(&config, Duration::from_secs(seconds)),
    }
}

#[derive(Serialize)]
struct ClassifyReport {
    average_power: f32,
    peak_power: f32,
    blow_threshold: f32,
    peak_threshold: f32,
    is_blowing: bool,
    intensity: f32,
}

fn run_classify(config: &AppConfig, average: f32, peak: f32) -> Result<ExitCode> {
    let thresholds = Thresholds::from_config(&config.detector)?;
    let blow = thresholds.classify(&Sample::new(average, peak));
    let report = ClassifyReport {
        average_power: average,
        peak_power: peak,
        blow_threshold: thresholds.blow_threshold(),
        peak_threshold: thresholds.peak_threshold(),
        is_blowing: blow.is_blowing,
        intensity: blow.intensity,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct ReplaySummary {
    revealed: bool,
    blur_radius: f32,
    stats: SamplerStats,
}

fn run_replay(config: &AppConfig, path: &Path) -> Result<ExitCode> {
    let duration =
        wav_duration(path).with_context(|| format!("reading fixture {}", path.display()))?;
    let interval = Duration::from_millis(config.detector.sample_interval_ms);

    let detector = BlowIntensityDetector::new(
        &config.detector,
        config.session.clone(),
        Arc::new(WavInput::new(path, interval)),
        Arc::new(GrantedPermission),
    )?;
    let session = RevealSession::new(detector, &config.reveal)?;
    let mut updates = session.subscribe();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building replay runtime")?;

    runtime.block_on(async {
        session.start().await?;

        // One extra tick so the tail of the file is read
        let drive = session.drive();
        let deadline = tokio::time::sleep(duration + interval);
        tokio::pin!(drive, deadline);

        loop {
            tokio::select! {
                _ = &mut drive => break,
                _ = &mut deadline => break,
                update = updates.recv() => match update {
                    Ok(update) => println!("{}", serde_json::to_string(&update)?),
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("[blow_cli] {} updates skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        Ok::<_, anyhow::Error>(())
    })?;

    session.close();
    while let Ok(update) = updates.try_recv() {
        println!("{}", serde_json::to_string(&update)?);
    }

    let state = session.state();
    let summary = ReplaySummary {
        revealed: state.is_revealed,
        blur_radius: state.blur_radius,
        stats: session.detector().stats(),
    };
    eprintln!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(if state.is_revealed {
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    })
}

fn run_listen(config: &AppConfig, duration: Duration) -> Result<ExitCode> {
    let input = default_input();
    let detector = BlowIntensityDetector::new(
        &config.detector,
        config.session.clone(),
        input,
        Arc::new(GrantedPermission),
    )?;
    let mut subscription = detector.register_listener()?;
    let mut lifecycle = detector.subscribe_lifecycle();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building listen runtime")?;

    runtime.block_on(async {
        detector.request_activation().await?;
        while let Ok(event) = lifecycle.try_recv() {
            eprintln!("{}", serde_json::to_string(&event)?);
        }

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                sample = subscription.recv() => match sample {
                    Some(sample) => println!("{}", serde_json::to_string(&sample)?),
                    None => break,
                },
            }
        }
        Ok::<_, anyhow::Error>(())
    })?;

    detector.deactivate();
    eprintln!("{}", serde_json::to_string_pretty(&detector.stats())?);
    Ok(ExitCode::from(0))
}
