// Split Ledger - Core Library
// Exposes the ledger core for the CLI, the TUI and tests

pub mod contributions;
pub mod ledger;
pub mod db;
pub mod commit;
pub mod chart;
pub mod config;
pub mod session;

// Re-export commonly used types
pub use contributions::{
    fits_in_cents, parse_contributions, participant_names, round_cents, to_cents,
    Contribution, ContributionError, ParsedContributions, MAX_CENTS,
};
pub use ledger::{Contributor, ContributorRemoval, Ledger, Transaction};
pub use db::{BlobStore, MemoryBlobStore, SqliteBlobStore, setup_database, LEDGER_KEY};
pub use commit::{
    commit_transaction, parse_amount, prepare_transaction,
    CommitError, ErrorKind, Reconciler, Submission,
};
pub use chart::{ChartRegistry, ChartVisibility, PieChart, Slice, PALETTE};
pub use config::Config;
pub use session::Session;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
