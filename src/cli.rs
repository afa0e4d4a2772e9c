//! CLI definitions for stagecraft
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stagecraft",
    version,
    about = "Deterministic local dev stacks and staged remote rollouts from a single project file",
    long_about = "Reads stagecraft.yml once and drives two things from it: a local dev stack \
(compose + Traefik + hosts-file entries + certs) and staged remote releases (build, push, \
batched rollout, migrations, rollback)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit structured JSON logs instead of human-readable ones
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Repository root containing stagecraft.yml (defaults to walking up from cwd)
    #[arg(long, global = true, env = "STAGECRAFT_REPO_ROOT")]
    pub repo_root: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the Dev Supervisor against stagecraft.yml
    Dev {
        /// Run the compose stack detached instead of attaching to its output
        #[arg(long)]
        detach: bool,

        #[command(subcommand)]
        command: Option<DevCommands>,
    },

    /// Compute and print a plan without mutating anything
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Drive a remote release environment
    Release {
        #[command(subcommand)]
        command: ReleaseCommands,
    },

    /// Validate stagecraft.yml without planning or running anything
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum DevCommands {
    /// Tear down a detached dev stack and release the supervisor lock
    Down,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Print the DevPlan computed from stagecraft.yml
    Dev,

    /// Print the ReleasePlan for one environment/version
    Release {
        #[arg(long)]
        env: String,

        #[arg(long)]
        version: String,
    },
}

#[derive(Subcommand)]
pub enum ReleaseCommands {
    /// Run the Release Engine to completion or first failure
    Apply {
        #[arg(long)]
        env: String,

        #[arg(long)]
        version: String,
    },

    /// Roll an environment back to a previous successful release
    Rollback {
        #[arg(long)]
        env: String,

        /// Release id to roll back to
        #[arg(long)]
        to: u64,
    },

    /// Print the append-only release history for one environment
    History {
        #[arg(long)]
        env: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate stagecraft.yml
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn repo_root_falls_back_to_positional_flag() {
        let cli = Cli::parse_from(["stagecraft", "--repo-root", "/srv/app", "config", "validate"]);
        assert_eq!(cli.repo_root.as_deref(), Some("/srv/app"));
    }

    // Mutates a process-wide env var clap reads for --repo-root's default,
    // so it can't run concurrently with anything else touching it.
    #[test]
    #[serial]
    fn repo_root_falls_back_to_env_var() {
        std::env::set_var("STAGECRAFT_REPO_ROOT", "/from/env");
        let cli = Cli::parse_from(["stagecraft", "config", "validate"]);
        std::env::remove_var("STAGECRAFT_REPO_ROOT");
        assert_eq!(cli.repo_root.as_deref(), Some("/from/env"));
    }
}
