// ⚖️ Transaction Commit - validate, split, reconcile, append
//
// One user submission either becomes exactly one new transaction or leaves the
// ledger untouched. The reconciliation check compares whole cents within a
// tolerance instead of exact float equality.

use crate::contributions::{fits_in_cents, parse_contributions, to_cents, ContributionError};
use crate::ledger::{Ledger, Transaction};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Raw form fields, as typed by the user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub description: String,
    pub amount: String,
    pub contributions: String,
}

impl Submission {
    pub fn new(description: &str, amount: &str, contributions: &str) -> Self {
        Submission {
            description: description.to_string(),
            amount: amount.to_string(),
            contributions: contributions.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Format,
    Underfunded,
    Mismatch,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Format => "format",
            ErrorKind::Underfunded => "underfunded",
            ErrorKind::Mismatch => "mismatch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommitError {
    #[error("{0}")]
    Validation(String),

    /// Parser message, passed through verbatim
    #[error(transparent)]
    Contribution(#[from] ContributionError),

    #[error("The total contributions ({contributed}) do not match the total amount ({declared}).")]
    Mismatch { contributed: f64, declared: f64 },
}

impl CommitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommitError::Validation(_) => ErrorKind::Validation,
            CommitError::Contribution(ContributionError::Underfunded { .. }) => ErrorKind::Underfunded,
            CommitError::Contribution(ContributionError::NoParticipants) => ErrorKind::Validation,
            CommitError::Contribution(ContributionError::OutOfRange { .. }) => ErrorKind::Validation,
            CommitError::Contribution(ContributionError::Format { .. }) => ErrorKind::Format,
            CommitError::Mismatch { .. } => ErrorKind::Mismatch,
        }
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    /// Largest accepted difference, in cents (default: 1)
    pub tolerance_cents: i64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Reconciler { tolerance_cents: 1 }
    }

    /// Zero tolerance means the rounded cents must agree exactly
    pub fn with_tolerance(tolerance_cents: i64) -> Self {
        Reconciler {
            tolerance_cents: tolerance_cents.max(0),
        }
    }

    pub fn difference_cents(&self, contributed: f64, declared: f64) -> i64 {
        (to_cents(contributed) - to_cents(declared)).abs()
    }

    pub fn is_balanced(&self, contributed: f64, declared: f64) -> bool {
        self.difference_cents(contributed, declared) <= self.tolerance_cents
    }
}

// ============================================================================
// COMMIT
// ============================================================================

pub fn parse_amount(raw: &str) -> Result<f64, CommitError> {
    let invalid = || CommitError::Validation(format!("Amount '{}' is not a valid positive number.", raw.trim()));

    let amount: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(invalid());
    }
    if !fits_in_cents(amount) {
        return Err(CommitError::Validation(format!(
            "Amount '{}' is too large to split to the cent.",
            raw.trim()
        )));
    }
    Ok(amount)
}

/// Validate a submission and build its transaction without touching any ledger
pub fn prepare_transaction(submission: &Submission, reconciler: &Reconciler) -> Result<Transaction, CommitError> {
    let description = submission.description.trim();
    if description.is_empty() {
        return Err(CommitError::Validation("Please enter a description.".to_string()));
    }
    let amount = parse_amount(&submission.amount)?;

    let parsed = parse_contributions(&submission.contributions, description, amount)?;
    debug!(
        contributors = parsed.contributions.len(),
        total_contributed = parsed.total_contributed,
        "parsed contributions"
    );

    if !reconciler.is_balanced(parsed.total_contributed, amount) {
        return Err(CommitError::Mismatch {
            contributed: parsed.total_contributed,
            declared: amount,
        });
    }

    Ok(Transaction::new(description, amount, parsed.contributions))
}

/// Append the submission to the ledger, or fail without changing it
pub fn commit_transaction<'a>(
    ledger: &'a mut Ledger,
    submission: &Submission,
    reconciler: &Reconciler,
) -> Result<&'a Transaction, CommitError> {
    let transaction = prepare_transaction(submission, reconciler)?;
    info!(
        id = %transaction.id,
        amount = transaction.amount,
        contributors = transaction.contributors.len(),
        "transaction committed"
    );
    Ok(ledger.add_transaction(transaction))
}
