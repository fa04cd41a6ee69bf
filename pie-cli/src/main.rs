#![warn(clippy::all)]
#![allow(clippy::pedantic)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pie_common::logging::init_logging;
use pie_common::util::parse_amount;
use pie_common::{Config, Error, Validate};
use pie_core::{ItemPath, JsonFileStore, PortfolioSession};
use tracing::{debug, info};

mod import;
mod render;

/// `pie` - Plan target allocations that always add up to 100%.
#[derive(Parser, Debug)]
#[command(name = "pie")]
#[command(version)]
#[command(about = "Plan pie and holding target percentages with lock-aware rebalancing.", long_about = None)]
struct Cli {
    /// Snapshot file (default: stateFile from config, else ~/.pieplanner/portfolio.json)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Print output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show pies, holdings, targets and amounts
    Show,

    /// Add a pie at 0% holding a Cash placeholder
    AddPie {
        /// Pie name (default: "New Pie")
        name: Option<String>,
    },

    /// Add a holding at 0% to a pie
    AddHolding {
        /// Pie index
        pie: usize,

        /// Holding name (default: "New Holding N")
        #[arg(long)]
        name: Option<String>,

        /// Holding description (default: "Description N")
        #[arg(long)]
        description: Option<String>,
    },

    /// Set a target percentage and rebalance its siblings
    Set {
        /// Item path: pie index ("2") or pie-holding ("2-0")
        path: ItemPath,

        /// New target (clamped to 0-100)
        #[arg(allow_negative_numbers = true)]
        target: i32,
    },

    /// Toggle the lock on a pie or holding
    Lock {
        /// Item path: "2" or "2-0"
        path: ItemPath,
    },

    /// Remove a pie or holding, handing its share to unlocked siblings
    Remove {
        /// Item path: "2" or "2-0"
        path: ItemPath,
    },

    /// Replace a pie's holdings with the Cash placeholder
    Clear {
        /// Pie index
        pie: usize,

        /// Confirm the destructive clear
        #[arg(long)]
        yes: bool,
    },

    /// Rename a pie or holding
    Rename {
        /// Item path: "2" or "2-0"
        path: ItemPath,
        name: String,
    },

    /// Set a holding's description
    Describe {
        /// Holding path, e.g. "2-0"
        path: ItemPath,
        description: String,
    },

    /// Show or set the investment amount
    Amount {
        /// New amount, e.g. 2500 or "$2,500.00"
        value: Option<String>,
    },

    /// Import positions from a brokerage CSV export
    Import(import::ImportArgs),

    /// List the accounts found in a brokerage CSV export
    Accounts {
        /// Brokerage positions export
        csv: PathBuf,
    },

    /// Drop every pie and start from a blank slate
    StartOver {
        /// Confirm the destructive reset
        #[arg(long)]
        yes: bool,
    },
}

/// What happens after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum After {
    /// State changed: persist it, then print the summary.
    SaveAndShow,
    /// Print the summary only.
    Show,
    /// The command printed its own output.
    Done,
}

fn confirm(yes: bool, action: &str) -> Result<()> {
    if yes {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("{action} is destructive; pass --yes to confirm")).into())
    }
}

fn load_config() -> Result<Config> {
    let config = Config::load_with_env().map_err(|e| Error::Config(format!("{e:#}")))?;
    config
        .validate()
        .map_err(|e| Error::Config(e.to_string()))?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config()?;
    init_logging(&config.log_level, &config.log_format);

    let state_path = cli.state.clone().unwrap_or_else(|| config.state_path());
    debug!(path = %state_path.display(), "Using snapshot");
    let store = JsonFileStore::new(state_path);
    let mut session = PortfolioSession::load(&store, config.default_investment_amount)?;

    let after = match cli.command {
        Commands::Show => After::Show,

        Commands::AddPie { name } => {
            let path = session.add_pie(name.as_deref());
            info!(%path, "Added pie");
            After::SaveAndShow
        }

        Commands::AddHolding {
            pie,
            name,
            description,
        } => {
            let path = session.add_holding(pie, name.as_deref(), description.as_deref())?;
            info!(%path, "Added holding");
            After::SaveAndShow
        }

        Commands::Set { path, target } => {
            session.set_target(path, target)?;
            After::SaveAndShow
        }

        Commands::Lock { path } => {
            session.toggle_lock(path)?;
            After::SaveAndShow
        }

        Commands::Remove { path } => {
            session.remove(path)?;
            After::SaveAndShow
        }

        Commands::Clear { pie, yes } => {
            confirm(yes, "Clearing holdings")?;
            session.clear_holdings(pie)?;
            After::SaveAndShow
        }

        Commands::Rename { path, name } => {
            session.rename(path, &name)?;
            After::SaveAndShow
        }

        Commands::Describe { path, description } => {
            session.describe(path, &description)?;
            After::SaveAndShow
        }

        Commands::Amount { value: Some(value) } => {
            let amount = parse_amount(&value).map_err(Error::InvalidInput)?;
            session.set_investment_amount(amount)?;
            After::SaveAndShow
        }

        Commands::Amount { value: None } => After::Show,

        Commands::Import(args) => import::handle_import(&args, &mut session, &config, cli.json)?,

        Commands::Accounts { csv } => import::handle_accounts(&csv, &config, cli.json)?,

        Commands::StartOver { yes } => {
            confirm(yes, "Starting over")?;
            session.start_over();
            After::SaveAndShow
        }
    };

    if after == After::SaveAndShow {
        session.save(&store)?;
    }
    if after != After::Done {
        render::print_summary(&session.summary(), cli.json)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<Error>().map_or(1, Error::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
