use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyshift::config::load_config;
use keyshift::server::KeyServer;
use keyshift::{OutputFormat, Pipeline, ServiceConfig};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "keyshift")]
#[command(about = "Estimate the musical key of audio files and transpose them")]
#[command(version)]
struct Cli {
    /// JSON configuration file; missing fields use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the key of one or more files
    Analyze {
        /// Audio files (mp3 or wav)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print full results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Shift the pitch of a file by whole semitones, keeping its tempo
    Transpose {
        /// Audio file (mp3 or wav)
        file: PathBuf,

        /// Semitones to shift by, negative for down
        #[arg(long, allow_hyphen_values = true)]
        shift: i32,

        /// Output format
        #[arg(long, default_value = "mp3")]
        format: OutputFormat,

        /// Output path (default: <stem>_shifted_<shift>.<format> next to the input)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Run the request server
    Serve {
        /// Address to listen on (overrides the configuration)
        #[arg(long)]
        listen: Option<String>,

        /// Transient file directory (overrides the configuration)
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },

    /// Print the effective configuration as JSON
    ShowConfig,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    match cli.command {
        Commands::Analyze { files, json } => analyze(&config, &files, json),
        Commands::Transpose {
            file,
            shift,
            format,
            output,
        } => transpose(&config, &file, shift, format, output),
        Commands::Serve { listen, temp_dir } => {
            let mut config = config;
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            if let Some(temp_dir) = temp_dir {
                config.temp_dir = temp_dir;
            }
            serve(config)
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn analyze(config: &ServiceConfig, files: &[PathBuf], json: bool) -> Result<()> {
    let pipeline = Pipeline::new(config);
    let start = Instant::now();

    let results: Vec<_> = files
        .par_iter()
        .map(|path| (path, pipeline.analyze(path)))
        .collect();

    let mut failures = 0;
    for (path, result) in results {
        match result {
            Ok(result) if json => {
                println!("{}", serde_json::to_string(&result)?);
            }
            Ok(result) => {
                let runners_up = result
                    .top_keys
                    .iter()
                    .skip(1)
                    .map(|(key, r)| format!("{} ({:.3})", key, r))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{}:", path.display());
                println!("  Key: {} (confidence: {:.2})", result.key, result.confidence);
                println!("  Runners-up: {}", runners_up);
                println!(
                    "  Analyzed: {:.1}s of {:.1}s at {} Hz",
                    result.metadata.analyzed_seconds,
                    result.metadata.duration_seconds,
                    result.metadata.sample_rate
                );
                if !result.metadata.flags.is_empty() {
                    println!("  Flags: {:?}", result.metadata.flags);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", path.display(), e);
            }
        }
    }

    log::info!(
        "Analyzed {} files in {:.2}s ({} failed)",
        files.len(),
        start.elapsed().as_secs_f32(),
        failures
    );
    if failures > 0 {
        anyhow::bail!("{} of {} files failed", failures, files.len());
    }
    Ok(())
}

fn transpose(
    config: &ServiceConfig,
    file: &Path,
    shift: i32,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let pipeline = Pipeline::new(config);
    let encoded = pipeline
        .transpose(file, shift, format)
        .with_context(|| format!("failed to transpose {}", file.display()))?;

    let output = output.unwrap_or_else(|| {
        let name = keyshift::service::download_name(
            &file.file_name().unwrap_or_default().to_string_lossy(),
            shift,
            format,
        );
        file.with_file_name(name)
    });
    std::fs::write(&output, &encoded.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({} frames at {} Hz, {} bytes)",
        output.display(),
        encoded.frames,
        encoded.sample_rate,
        encoded.bytes.len()
    );
    Ok(())
}

fn serve(config: ServiceConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let server = KeyServer::bind(config).await?;
        server
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for shutdown signal: {}", e);
                }
            })
            .await?;
        Ok(())
    })
}
