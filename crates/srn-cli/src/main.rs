use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "srn")]
#[command(about = "SRN CLI - Scope Resource Names and workspace-to-scope migration", long_about = None)]
struct Cli {
    /// Configuration file (defaults to <config_dir>/srn/srn.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage working directory, overriding the configuration
    #[arg(long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an SRN and print its components
    Parse { srn: String },

    /// Check whether an SRN is valid
    Validate { srn: String },

    /// Print the native address of a scope in every backend family
    Address { srn: String },

    /// List scopes present in the hierarchical store
    Scopes {
        /// Shell-style wildcard matched against canonical SRNs
        pattern: Option<String>,
    },

    /// Count legacy items per storage kind (all workspaces when omitted)
    Discover { workspace: Option<String> },

    /// Plan a migration and preview it without writing
    Plan {
        workspace: String,
        target: String,
        /// Persist the plan as a pending job
        #[arg(long)]
        submit: bool,
    },

    /// Migrate a legacy workspace into a target scope
    Migrate {
        workspace: String,
        target: String,
        /// Run every step except the final writes
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Resume a failed or interrupted job
    Resume {
        job_id: String,
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Show a job's progress and errors
    Status { job_id: String },

    /// List all jobs
    Jobs,

    /// Delete every item a job migrated
    Rollback { job_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.working_dir.clone())?;

    // Only commands that touch storage mirror logs into the working directory.
    let log_dir = match cli.command {
        Commands::Parse { .. } | Commands::Validate { .. } | Commands::Address { .. } => None,
        _ => config.storage.working_dir.clone(),
    };
    let _log_guard = logging::init(cli.verbose, log_dir.as_deref())?;

    match cli.command {
        Commands::Parse { srn } => commands::scope::parse(&srn)?,
        Commands::Validate { srn } => commands::scope::validate(&srn)?,
        Commands::Address { srn } => commands::scope::address(&srn)?,
        Commands::Scopes { pattern } => commands::scope::scopes(&config, pattern.as_deref()).await?,
        Commands::Discover { workspace } => {
            commands::migrate::discover(&config, workspace.as_deref()).await?
        }
        Commands::Plan {
            workspace,
            target,
            submit,
        } => commands::migrate::plan(&config, &workspace, &target, submit).await?,
        Commands::Migrate {
            workspace,
            target,
            dry_run,
            batch_size,
        } => commands::migrate::migrate(&config, &workspace, &target, dry_run, batch_size).await?,
        Commands::Resume { job_id, batch_size } => {
            commands::migrate::resume(&config, &job_id, batch_size).await?
        }
        Commands::Status { job_id } => commands::migrate::status(&config, &job_id).await?,
        Commands::Jobs => commands::migrate::jobs(&config).await?,
        Commands::Rollback { job_id } => commands::migrate::rollback(&config, &job_id).await?,
    }

    Ok(())
}
