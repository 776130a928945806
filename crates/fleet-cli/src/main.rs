use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fleet_channel::{ConfigSnapshot, ConfigSource};
use fleet_controller::{CommandExecutor, Config, Controller, FileInventory, Inventory};
use fleet_core::UpdatePriority;
use fleet_registry::ClusterRegistry;

#[derive(Parser)]
#[command(name = "fleetctl", version)]
struct Cli {
    /// Path to fleet.toml
    #[arg(long, default_value = "fleet.toml")]
    config: PathBuf,

    /// Log filter, overrides RUST_LOG (e.g. "info", "fleet_registry=debug")
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file
    Init {
        #[arg(long)]
        repository_url: String,
    },

    /// Create or refresh the local config mirror
    Refresh,

    /// Check out a private snapshot of a channel and print its version and path
    Checkout {
        #[arg(long)]
        channel: String,
    },

    /// Remove a snapshot directory created by `checkout`
    Release {
        #[arg(long)]
        path: PathBuf,
    },

    /// Show the order in which clusters from an inventory file would be updated
    Plan {
        #[arg(long)]
        inventory: PathBuf,
    },

    /// Run the update controller against an inventory file
    Run {
        #[arg(long)]
        inventory: PathBuf,
        /// Update every cluster once and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = cli.config;
    let load = || Config::load_from(&config_path);

    match cli.cmd {
        Command::Init { repository_url } => {
            Config::default_for(&repository_url).save_to(&config_path)?;
            println!("Wrote {}", config_path.display());
        }
        Command::Refresh => {
            load()?.config_source()?.update()?;
            println!("Mirror up to date");
        }
        Command::Checkout { channel } => {
            let snapshot = load()?.config_source()?.get(&channel)?;
            println!("{} {}", snapshot.version, snapshot.path.display());
        }
        Command::Release { path } => {
            let source = load()?.config_source()?;
            let path = std::path::absolute(&path)?;
            anyhow::ensure!(
                path.parent() == Some(source.workdir()) && path.as_path() != source.mirror_dir(),
                "{} is not a snapshot of {}",
                path.display(),
                source.repo_name()
            );
            source.delete(ConfigSnapshot { version: String::new(), path })?;
        }
        Command::Plan { inventory } => {
            let cfg = load()?;
            let registry = ClusterRegistry::new(cfg.account_filter()?);
            registry.ingest(FileInventory::new(inventory).list_clusters()?);
            let mut n = 0;
            while let Some(cluster) = registry.select_next() {
                n += 1;
                println!("{n}. {} [{:?}] channel={}", cluster.id, UpdatePriority::of(&cluster), cluster.channel);
            }
            if n == 0 {
                println!("No clusters to update");
            }
        }
        Command::Run { inventory, once } => {
            let cfg = load()?;
            let registry = ClusterRegistry::new(cfg.account_filter()?);
            let executor = CommandExecutor::new(cfg.executor.command.clone()).context("executor")?;
            let controller = Controller::new(registry, FileInventory::new(inventory), cfg.config_source()?, executor)
                .with_interval(cfg.interval());

            if once {
                let updated = controller.run_once()?;
                println!("Updated {} cluster(s)", updated.len());
                for id in updated {
                    println!("- {id}");
                }
            } else {
                let shutdown = shutdown_on_signal()?;
                controller.run(cfg.controller.workers, &shutdown);
                println!("Stopped");
            }
        }
    }

    Ok(())
}

/// Flag set by the first SIGINT or SIGTERM; a second signal exits immediately.
fn shutdown_on_signal() -> anyhow::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("Shutting down after in-flight updates (signal again to force)");
    })
    .context("install signal handler")?;
    Ok(shutdown)
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn sigterm_sets_shutdown_flag() {
        let shutdown = shutdown_on_signal().unwrap();
        assert!(!shutdown.load(Ordering::SeqCst));

        let status = Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !shutdown.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(shutdown.load(Ordering::SeqCst));
    }
}
