// 🧮 Contribution Parser - who pays what
//
// Turns a free-form "Name-Amount, Name-Amount" spec into a reconciled list of
// contributions. An empty spec splits the total evenly across the names in the
// description; a spec that falls short has the remainder shared by whoever in
// the description was left out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// CORE TYPES
// ============================================================================

/// One parsed `{name, amount}` pair, before it is given an identity in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub name: String,
    pub amount: f64,
}

impl Contribution {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Contribution {
            name: name.into(),
            amount,
        }
    }
}

/// Output of `parse_contributions`
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedContributions {
    pub contributions: Vec<Contribution>,
    /// Running total of the contributions. For an even split this is the
    /// declared total, not the sum of the rounded shares.
    pub total_contributed: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContributionError {
    #[error("Invalid contribution format '{entry}'. Use 'Name-Amount'.")]
    Format { entry: String },

    #[error("Contributions fall short of the total by {shortfall:.2} and everyone listed has already contributed.")]
    Underfunded { shortfall: f64 },

    #[error("No participant names found in the description.")]
    NoParticipants,

    #[error("Amount {amount} is too large to split to the cent.")]
    OutOfRange { amount: f64 },
}

// ============================================================================
// MONEY HELPERS
// ============================================================================

/// Largest cent count an f64 still holds exactly (2^53)
pub const MAX_CENTS: f64 = 9_007_199_254_740_992.0;

/// Whether `amount` converts to whole cents without overflow or lost precision
pub fn fits_in_cents(amount: f64) -> bool {
    let cents = amount * 100.0;
    cents.is_finite() && cents.abs() <= MAX_CENTS
}

/// Whole cents, rounding half away from zero
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Round to two decimals, half away from zero
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Comma-separated participant names, trimmed, empty segments dropped
pub fn participant_names(description: &str) -> Vec<String> {
    description
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// PARSER
// ============================================================================

pub fn parse_contributions(
    spec: &str,
    description: &str,
    total: f64,
) -> Result<ParsedContributions, ContributionError> {
    let spec = spec.trim();

    if !fits_in_cents(total) {
        return Err(ContributionError::OutOfRange { amount: total });
    }

    if spec.is_empty() {
        return split_evenly(description, total);
    }

    let mut contributions = spec
        .split(',')
        .map(parse_entry)
        .collect::<Result<Vec<_>, _>>()?;

    let mut total_contributed: f64 = contributions.iter().map(|c| c.amount).sum();

    // Over-funding is left as is; the commit reports it as a mismatch
    let shortfall_cents = to_cents(total) - to_cents(total_contributed);
    if shortfall_cents > 0 {
        let shortfall = shortfall_cents as f64 / 100.0;
        let missing = missing_names(description, &contributions);

        if missing.is_empty() {
            return Err(ContributionError::Underfunded { shortfall });
        }

        // Whole cents per name, the first `remainder` names carry one extra,
        // so the shares add up to the shortfall exactly. Names left with
        // nothing to pay are not added.
        let count = missing.len() as i64;
        let base = shortfall_cents / count;
        let remainder = shortfall_cents % count;
        for (i, name) in missing.into_iter().enumerate() {
            let cents = base + i64::from((i as i64) < remainder);
            if cents == 0 {
                continue;
            }
            let share = cents as f64 / 100.0;
            contributions.push(Contribution::new(name, share));
            total_contributed += share;
        }
    }

    Ok(ParsedContributions {
        contributions,
        total_contributed,
    })
}

fn split_evenly(description: &str, total: f64) -> Result<ParsedContributions, ContributionError> {
    let names = participant_names(description);
    if names.is_empty() {
        return Err(ContributionError::NoParticipants);
    }

    let share = round_cents(total / names.len() as f64);
    if !share.is_finite() {
        return Err(ContributionError::OutOfRange { amount: total });
    }

    Ok(ParsedContributions {
        contributions: names
            .into_iter()
            .map(|name| Contribution::new(name, share))
            .collect(),
        total_contributed: total,
    })
}

/// `Name-Amount`, split on the first `-`
fn parse_entry(entry: &str) -> Result<Contribution, ContributionError> {
    let format_error = || ContributionError::Format {
        entry: entry.trim().to_string(),
    };

    let (name, amount) = entry.split_once('-').ok_or_else(format_error)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format_error());
    }

    let amount: f64 = amount.trim().parse().map_err(|_| format_error())?;
    if !fits_in_cents(amount) || amount < 0.0 {
        return Err(format_error());
    }

    Ok(Contribution::new(name, amount))
}

/// Names in the description with no contribution yet, compared
/// case-insensitively. Each name is returned once.
fn missing_names(description: &str, contributions: &[Contribution]) -> Vec<String> {
    let mut seen: Vec<String> = contributions
        .iter()
        .map(|c| c.name.to_lowercase())
        .collect();

    let mut missing = Vec::new();
    for name in participant_names(description) {
        let key = name.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            missing.push(name);
        }
    }
    missing
}

// ============================================================================
// TESTS
// ============================================================================
