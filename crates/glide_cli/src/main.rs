//! Glide CLI
//!
//! Plays animation scenes described in TOML and logs every applied value.

mod scene;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glide_animation::{LabelRegistry, PlayMode, PlaybackEngine, StopMode, EASING_NAMES};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use crate::scene::Scene;

#[derive(Parser, Debug)]
#[command(name = "glide", author, version, about = "Play curve-driven property animations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a scene and log the values it produces.
    Run {
        /// Scene file, or a directory containing glide.toml.
        #[arg(default_value = ".")]
        scene: PathBuf,
        /// Override the scene's play mode.
        #[arg(short, long)]
        mode: Option<PlayMode>,
        /// Override when to request a stop, in seconds.
        #[arg(long)]
        stop_after: Option<f64>,
        /// Override how the stop is performed.
        #[arg(long)]
        stop_mode: Option<StopMode>,
    },
    /// Write an example scene.
    Init {
        /// Destination file, or a directory to place glide.toml in.
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// List the built-in curve names.
    Curves,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scene,
            mode,
            stop_after,
            stop_mode,
        } => {
            let mut scene = Scene::load(&scene)?;
            if let Some(mode) = mode {
                scene.mode = mode;
            }
            if stop_after.is_some() {
                scene.stop_after_secs = stop_after;
            }
            if let Some(stop_mode) = stop_mode {
                scene.stop_mode = stop_mode;
            }
            run_scene(scene).await
        }
        Commands::Init { path, force } => init_scene(&path, force),
        Commands::Curves => {
            for name in EASING_NAMES {
                println!("{name}");
            }
            println!("ease");
            println!("cubic-bezier(x1, y1, x2, y2)");
            Ok(())
        }
    }
}

async fn run_scene(scene: Scene) -> Result<()> {
    let registry = LabelRegistry::new();
    let engine = PlaybackEngine::from_config(&scene.engine, &registry)?;

    for property in &scene.properties {
        let name = property.name.clone();
        engine.add_property(property.easing()?, property.start, property.end, move |value| {
            tracing::info!(property = %name, value, "apply");
        })?;
    }

    if scene.mode.is_looping() && scene.stop_after_secs.is_none() {
        tracing::info!("looping until interrupted (Ctrl-C)");
    }

    let done = Arc::new(Notify::new());
    let handle = engine.clone();
    let notify = done.clone();
    let started = engine.play_with(scene.mode, move || {
        if handle.is_playing() {
            tracing::debug!("cycle complete");
        } else {
            notify.notify_one();
        }
    })?;
    if !started {
        anyhow::bail!("Another animation holds this scene's label");
    }
    tracing::info!(mode = %scene.mode, duration = ?engine.duration(), "playing");

    let stop_timer = async {
        match scene.stop_after_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs_f64(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop_timer);
    let mut stop_sent = false;

    loop {
        tokio::select! {
            _ = done.notified() => break,
            _ = &mut stop_timer, if !stop_sent => {
                tracing::info!(mode = %scene.stop_mode, "requesting stop");
                engine.stop(scene.stop_mode);
                stop_sent = true;
                if scene.stop_mode == StopMode::Immediate {
                    break;
                }
            }
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                tracing::warn!("interrupted");
                engine.stop(StopMode::Immediate);
                break;
            }
        }
    }

    tracing::info!("finished");
    Ok(())
}

fn init_scene(path: &Path, force: bool) -> Result<()> {
    let target = if path.is_dir() {
        path.join("glide.toml")
    } else {
        path.to_path_buf()
    };

    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists. Pass --force to overwrite it.",
            target.display()
        );
    }

    std::fs::write(&target, Scene::example().to_toml()?)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    tracing::info!(path = %target.display(), "wrote example scene");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
