// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use split_ledger::{Config, ContributorRemoval, PieChart, Session, Submission, Transaction};

#[derive(Parser, Debug)]
#[command(name = "split-ledger", version, about = "Split shared expenses between friends")]
struct Cli {
    #[arg(long, global = true, help = "Ledger database file (overrides SPLIT_LEDGER_DB)")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a transaction; without --split the amount is shared evenly
    Add {
        /// Comma-separated participant names
        description: String,
        amount: String,
        #[arg(long, default_value = "", help = "Contributions as 'Name-Amount,Name-Amount'")]
        split: String,
    },
    List {
        #[arg(long, help = "Output machine-readable JSON")]
        json: bool,
    },
    Delete {
        transaction: String,
    },
    RemoveContributor {
        transaction: String,
        contributor: String,
    },
    /// Print the contribution breakdown of one transaction
    Chart {
        transaction: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        None => {
            init_tracing(&config, true)?;
            run_ui_mode(&config)
        }
        Some(command) => {
            init_tracing(&config, false)?;
            run_command(&config, command)
        }
    }
}

/// The TUI owns the terminal, so its logs go to a file
fn init_tracing(config: &Config, to_file: bool) -> Result<()> {
    let default_filter = if to_file { "info" } else { "warn" };
    let filter = EnvFilter::try_new(config.log_filter.as_deref().unwrap_or(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    if to_file {
        let path = config.log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn run_command(config: &Config, command: Commands) -> Result<()> {
    let mut session = Session::open(config)?;

    match command {
        Commands::Add { description, amount, split } => {
            let id = session.add_transaction(&Submission::new(&description, &amount, &split))?;
            if let Some(tx) = session.ledger().get(id) {
                println!("✓ Added transaction {}", short_id(tx.id));
                print_transaction(tx);
            }
        }
        Commands::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(session.ledger())?);
            } else if session.ledger().is_empty() {
                println!("No transactions yet.");
            } else {
                for tx in session.ledger().transactions() {
                    print_transaction(tx);
                    println!();
                }
            }
        }
        Commands::Delete { transaction } => {
            let id = session.resolve(&transaction)?;
            session.delete_transaction(id)?;
            println!("✓ Deleted transaction {}", short_id(id));
        }
        Commands::RemoveContributor { transaction, contributor } => {
            let id = session.resolve(&transaction)?;
            let contributor_id = match session.ledger().get(id) {
                Some(tx) => match tx.find_contributor_by_prefix(&contributor) {
                    Some(c) => c.id,
                    None => bail!("No single contributor matches '{}'", contributor.trim()),
                },
                None => bail!("Transaction {} not found", short_id(id)),
            };
            match session.delete_contributor(id, contributor_id)? {
                ContributorRemoval::Removed => println!("✓ Removed contributor {}", short_id(contributor_id)),
                ContributorRemoval::TransactionRemoved => {
                    println!("✓ Removed last contributor; transaction {} deleted", short_id(id))
                }
                ContributorRemoval::NotFound => bail!("Contributor '{}' not found", contributor),
            }
        }
        Commands::Chart { transaction } => {
            let id = session.resolve(&transaction)?;
            session.toggle_chart(id)?;
            if let Some(chart) = session.chart(id) {
                print_chart(chart);
            }
        }
    }

    Ok(())
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn print_transaction(tx: &Transaction) {
    println!("[{}] {}  ₹{:.2}", short_id(tx.id), tx.description, tx.amount);
    for c in &tx.contributors {
        println!("    {}  {:<20} ₹{:.2}", short_id(c.id), c.name, c.amount);
    }
}

fn print_chart(chart: &PieChart) {
    const WIDTH: f64 = 30.0;
    println!("{}", chart.title);
    for slice in &chart.slices {
        let bar = "█".repeat((slice.fraction * WIDTH).round() as usize);
        println!(
            "  {:<20} {:>10.2} {:>5.1}%  {}",
            slice.label,
            slice.value,
            slice.fraction * 100.0,
            bar
        );
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    let session = Session::open(config)?;

    let mut app = ui::App::new(session);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use a subcommand: split-ledger --help");
    std::process::exit(1);
}
