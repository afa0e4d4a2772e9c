use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

mod cli;
mod config;
mod devtopology;
mod error;
mod exec;
mod observability;
mod plan;
mod provider;
mod release;
mod supervisor;

use cli::{Cli, Commands, ConfigCommands, DevCommands, PlanCommands, ReleaseCommands};
use config::Config;
use error::{DevError, StagecraftError};
use exec::{command_exists, RemoteCommander, SshCommander, TokioLocalCommander};
use plan::types::{PhaseStatus, ReleaseOutcome, ReleaseRecord};
use provider::Registries;
use supervisor::{DevOpts, Supervisor};

const CONFIG_FILE: &str = "stagecraft.yml";
const CERT_PROVIDER_BINARY: &str = "mkcert";

/// Walks up from the current directory looking for `stagecraft.yml`,
/// falling back to the current directory if none is found — a
/// stagecraft-rooted project need not be a git repository.
fn find_repo_root() -> Result<PathBuf> {
    let current = std::env::current_dir().context("failed to get current directory")?;
    let mut dir = current.as_path();
    loop {
        if dir.join(CONFIG_FILE).exists() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Ok(current),
        }
    }
}

fn resolve_repo_root(explicit: Option<String>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(PathBuf::from(path)),
        None => find_repo_root(),
    }
}

fn remote_commander(cfg: &Config) -> Box<dyn RemoteCommander> {
    let user = cfg
        .infra
        .bootstrap
        .as_ref()
        .and_then(|b| b.ssh_user.clone())
        .unwrap_or_else(|| "root".to_string());
    Box::new(SshCommander::new(user))
}

fn exit_with(err: StagecraftError) -> ! {
    eprintln!("error: {err}");
    std::process::exit(err.exit_code());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init(cli.verbose, cli.json_logs);

    let repo_root = resolve_repo_root(cli.repo_root.clone())?;
    let config_path = repo_root.join(CONFIG_FILE);

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Validate => {
                let registries = Registries::new().with_defaults("backend", "frontend");
                match Config::load(&config_path, "dev", &registries) {
                    Ok(_) => println!("{} is valid", config_path.display()),
                    Err(e) => exit_with(e),
                }
            }
        },

        Commands::Dev { detach, command } => {
            if !command_exists("docker") {
                exit_with(StagecraftError::Dev(DevError::MissingBinary {
                    binary: "docker".to_string(),
                }));
            }

            let dev_dir = repo_root.join(".stagecraft").join("dev");
            let local = TokioLocalCommander;

            if let Some(DevCommands::Down) = command {
                if let Err(e) = supervisor::tear_down(&dev_dir, &local).await {
                    exit_with(e);
                }
                return Ok(());
            }

            let registries = Registries::new().with_defaults("backend", "frontend");
            let cfg = match Config::load(&config_path, "dev", &registries) {
                Ok(c) => c,
                Err(e) => exit_with(e),
            };
            let plan = match plan::plan_dev(&cfg, &registries, &repo_root, &dev_dir) {
                Ok(p) => p,
                Err(e) => exit_with(e),
            };

            let opts = DevOpts { detach };
            if let Err(e) = Supervisor::run(&plan, &dev_dir, opts, CERT_PROVIDER_BINARY, &local).await {
                exit_with(e);
            }
        }

        Commands::Plan { command } => match command {
            PlanCommands::Dev => {
                let registries = Registries::new().with_defaults("backend", "frontend");
                let cfg = match Config::load(&config_path, "dev", &registries) {
                    Ok(c) => c,
                    Err(e) => exit_with(e),
                };
                let dev_dir = repo_root.join(".stagecraft").join("dev");
                match plan::plan_dev(&cfg, &registries, &repo_root, &dev_dir) {
                    Ok(p) => print_yaml(&p),
                    Err(e) => exit_with(e),
                }
            }
            PlanCommands::Release { env, version } => {
                let registries = Registries::new().with_defaults("backend", "frontend");
                let cfg = match Config::load(&config_path, &env, &registries) {
                    Ok(c) => c,
                    Err(e) => exit_with(e),
                };
                let store = match release::ReleaseStore::open(&state_dir(&repo_root)) {
                    Ok(s) => s,
                    Err(e) => exit_with(e),
                };
                match plan::plan_release(&cfg, &env, &version, store.records()) {
                    Ok(p) => print_yaml(&p),
                    Err(e) => exit_with(e),
                }
            }
        },

        Commands::Release { command } => match command {
            ReleaseCommands::Apply { env, version } => {
                let registries = Registries::new().with_defaults("backend", "frontend");
                let cfg = match Config::load(&config_path, &env, &registries) {
                    Ok(c) => c,
                    Err(e) => exit_with(e),
                };
                let mut store = match release::ReleaseStore::open(&state_dir(&repo_root)) {
                    Ok(s) => s,
                    Err(e) => exit_with(e),
                };
                let local = TokioLocalCommander;
                let remote = remote_commander(&cfg);
                let http = reqwest::Client::new();

                match release::apply(
                    &cfg,
                    &env,
                    &version,
                    &mut store,
                    &registries,
                    &repo_root,
                    &local,
                    remote.as_ref(),
                    &http,
                )
                .await
                {
                    Ok(record) => print_release_summary(&record),
                    Err(e) => exit_with(e),
                }
            }

            ReleaseCommands::Rollback { env, to } => {
                let registries = Registries::new().with_defaults("backend", "frontend");
                let cfg = match Config::load(&config_path, &env, &registries) {
                    Ok(c) => c,
                    Err(e) => exit_with(e),
                };
                let mut store = match release::ReleaseStore::open(&state_dir(&repo_root)) {
                    Ok(s) => s,
                    Err(e) => exit_with(e),
                };
                let remote = remote_commander(&cfg);
                let http = reqwest::Client::new();

                match release::rollback(
                    &cfg,
                    &env,
                    to,
                    &mut store,
                    &registries,
                    &repo_root,
                    remote.as_ref(),
                    &http,
                )
                .await
                {
                    Ok(record) => print_release_summary(&record),
                    Err(e) => exit_with(e),
                }
            }

            ReleaseCommands::History { env } => {
                let store = match release::ReleaseStore::open(&state_dir(&repo_root)) {
                    Ok(s) => s,
                    Err(e) => exit_with(e),
                };
                for record in store.records_for(&env) {
                    print_release_summary(record);
                }
            }
        },
    }

    Ok(())
}

fn state_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(".stagecraft").join("release")
}

fn print_yaml<T: serde::Serialize>(value: &T) {
    match serde_yaml::to_string(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("error: failed to render output as YAML: {e}"),
    }
}

fn print_release_summary(record: &ReleaseRecord) {
    let outcome = match record.outcome {
        ReleaseOutcome::Succeeded => "Succeeded".green().bold(),
        ReleaseOutcome::Failed => "Failed".red().bold(),
        ReleaseOutcome::RolledBack => "RolledBack".yellow().bold(),
    };
    println!(
        "{} {} {} {}",
        ">>".bold(),
        record.env.cyan().bold(),
        format!("#{} {}", record.id, record.version).dimmed(),
        outcome
    );
    if let Some(note) = &record.note {
        println!("   {}", note.dimmed());
    }
    for phase in &record.phases {
        let status = match phase.status {
            PhaseStatus::Succeeded => "ok".green(),
            PhaseStatus::Failed => "failed".red(),
            PhaseStatus::Compensated => "compensated".yellow(),
            PhaseStatus::Pending | PhaseStatus::InFlight => "pending".dimmed(),
        };
        println!("   {} {}", phase.kind.to_string().cyan(), status);
        for host in &phase.hosts {
            println!("      {}", host.host_id.dimmed());
        }
    }
    println!();
}
