//! Command-line entry point for optomask.
//!
//! ```bash
//! optomask models --json
//! optomask check --config config/optomask.toml
//! RUST_LOG=debug optomask dry-run --frames 8
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ndarray::{s, Array3};
use optomask::camera::configure_camera;
use optomask::config::{OptomaskConfig, DEFAULT_CONFIG_PATH};
use optomask::device::DeviceSpecRegistry;
use optomask::sequence::SequenceAllocator;
use optomask::session::mock::{MockCamera, MockSession};
use optomask::session::{upload_sequence, SlmController};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "optomask", version, about = "Validate and drive SLM/DMD mask hardware")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the supported modulator models.
    Models {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Load and validate a configuration file.
    Check {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Run the configured devices against in-memory sessions.
    DryRun {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Number of projector frames to stage.
        #[arg(long, default_value_t = 4)]
        frames: usize,
    },
}

fn init_tracing(default_level: &str) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Models { json } => {
            init_tracing("warn");
            list_models(json)
        }
        Command::Check { config } => {
            let config = load(&config)?;
            init_tracing(&config.application.log_level);
            println!("Configuration '{}' is valid", config.application.name);
            if let Some(slm) = config.slm_state()? {
                println!("  slm: {} reference={:?}", slm.model(), slm.reference());
            }
            if let Some(dmd) = config.dmd_state()? {
                println!("  dmd: {} reference={:?}", dmd.model(), dmd.reference());
            }
            Ok(())
        }
        Command::DryRun { config, frames } => {
            let config = load(&config)?;
            init_tracing(&config.application.log_level);
            dry_run(&config, frames).await
        }
    }
}

fn load(path: &Path) -> Result<OptomaskConfig> {
    OptomaskConfig::load_from(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn list_models(json: bool) -> Result<()> {
    let registry = DeviceSpecRegistry::global();
    if json {
        let models: serde_json::Map<String, serde_json::Value> = registry
            .iter()
            .map(|(name, spec)| Ok::<_, anyhow::Error>((name.to_string(), serde_json::to_value(spec)?)))
            .collect::<Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("{:<12} {:>12} {:>20}", "model", "pixels", "size (mm)");
    for (name, spec) in registry.iter() {
        let (w, h) = spec.resolution_px;
        let (wmm, hmm) = spec.physical_size_mm;
        println!("{name:<12} {:>12} {:>20}", format!("{w}x{h}"), format!("{wmm:.3}x{hmm:.3}"));
    }
    Ok(())
}

async fn dry_run(config: &OptomaskConfig, frames: usize) -> Result<()> {
    if let Some(state) = config.slm_state()? {
        let mut slm = SlmController::new(state, MockSession::new("slm"));
        slm.open().await?;
        slm.close().await?;
        println!("slm: {} calls", slm.session().calls().len());
    }

    if let (Some(dmd), Some(state)) = (&config.dmd, config.dmd_state()?) {
        configure_camera(&mut MockCamera::new(), &config.camera).await?;

        // Alternate dark and bright frames so the camera sees the sync.
        let (rows, cols) = state.frame_shape();
        let mut masks = Array3::<f64>::zeros((frames, rows, cols));
        for index in (1..frames).step_by(2) {
            masks.slice_mut(s![index, .., ..]).fill(1.0);
        }

        let mut session = MockSession::new("dmd");
        let sequence = upload_sequence(
            &mut session,
            &state,
            &SequenceAllocator::default(),
            masks.view(),
            dmd.timing,
        )
        .await?;
        println!(
            "dmd: staged {} frames of {:?} ({} bytes)",
            sequence.frame_count(),
            sequence.frame_shape(),
            sequence.payload().len()
        );
    }

    Ok(())
}
