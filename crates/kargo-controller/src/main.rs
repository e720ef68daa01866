//! Kargo controller - Warehouse reconciliation, Stage refresh propagation
//! and Project namespace ownership

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod controllers;
mod error;
mod exit_codes;

use commands::run::Overrides;

#[derive(Parser)]
#[command(name = "kargo-controller")]
#[command(author = "Kargo Contributors")]
#[command(version)]
#[command(about = "Progressive delivery controller for Kubernetes", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the cluster and run the controllers
    Run {
        /// Configuration file
        #[arg(short, long, env = "KARGO_CONFIG")]
        config: Option<PathBuf>,

        /// Namespace the control plane runs in
        #[arg(long, env = "KARGO_NAMESPACE")]
        kargo_namespace: Option<String>,

        /// Only handle resources labeled for this shard
        #[arg(long, env = "SHARD_NAME")]
        shard_name: Option<String>,

        /// Namespace of Argo CD Applications that Stages do not qualify
        #[arg(long, env = "ARGOCD_NAMESPACE")]
        argocd_namespace: Option<String>,

        /// Candidate catalog file
        #[arg(long, env = "KARGO_CATALOG")]
        catalog: Option<PathBuf>,
    },

    /// Validate Kargo manifests without a cluster
    Lint {
        /// Manifest files (multi-document YAML)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn dispatch(command: Commands) -> error::Result<()> {
    match command {
        Commands::Run {
            config,
            kargo_namespace,
            shard_name,
            argocd_namespace,
            catalog,
        } => {
            let config = commands::run::resolve_config(
                config.as_deref(),
                Overrides {
                    kargo_namespace,
                    shard_name,
                    argocd_namespace,
                    catalog,
                },
            )?;
            commands::run::run(config).await
        }

        Commands::Lint { files } => commands::lint::run(&files),
    }
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(err) = dispatch(cli.command).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "kargo-controller",
            "--log-level",
            "debug",
            "run",
            "--shard-name",
            "east",
            "--catalog",
            "catalog.yaml",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        let Commands::Run {
            shard_name, catalog, ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(shard_name.as_deref(), Some("east"));
        assert_eq!(catalog, Some(PathBuf::from("catalog.yaml")));
    }

    #[test]
    fn test_lint_needs_files() {
        assert!(Cli::try_parse_from(["kargo-controller", "lint"]).is_err());
    }

    #[test]
    fn test_lint_error_is_a_diagnostic() {
        let report = miette::Report::new(CliError::LintFailed { errors: 1, files: 1 });
        assert_eq!(report.to_string(), "Linting failed with 1 error(s) in 1 file(s)");
    }
}
