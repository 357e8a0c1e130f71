// 📒 Transaction Store - the in-memory ledger
//
// A ledger is an ordered list of transactions, each owning its contributors.
// It is loaded and saved as a whole; there is no incremental persistence.

use crate::contributions::Contribution;
use crate::db::BlobStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person's share of one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: Uuid,
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub description: String,
    pub amount: f64,
    pub contributors: Vec<Contributor>,
}

impl Transaction {
    /// Build a transaction from parser output, giving every row a fresh id
    pub fn new(description: &str, amount: f64, contributions: Vec<Contribution>) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            description: description.to_string(),
            amount,
            contributors: contributions
                .into_iter()
                .map(|c| Contributor {
                    id: Uuid::new_v4(),
                    name: c.name,
                    amount: c.amount,
                })
                .collect(),
        }
    }

    pub fn contributed_total(&self) -> f64 {
        self.contributors.iter().map(|c| c.amount).sum()
    }

    /// Contributor whose id starts with `prefix`, if exactly one matches
    pub fn find_contributor_by_prefix(&self, prefix: &str) -> Option<&Contributor> {
        unique_prefix_match(self.contributors.iter(), |c| c.id, prefix)
    }
}

/// The one item whose id starts with `prefix` (case-insensitive); `None` for
/// an empty prefix, no match or several matches
fn unique_prefix_match<'a, T, I, F>(items: I, id: F, prefix: &str) -> Option<&'a T>
where
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> Uuid,
{
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return None;
    }
    let mut matches = items.filter(|item| id(item).to_string().starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(item), None) => Some(item),
        _ => None,
    }
}

/// Outcome of `Ledger::delete_contributor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributorRemoval {
    NotFound,
    Removed,
    /// The last contributor went, and the transaction with it
    TransactionRemoved,
}

/// Serialized as a bare JSON array of transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Ledger { transactions }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Transaction whose id starts with `prefix`, if exactly one matches
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&Transaction> {
        unique_prefix_match(self.transactions.iter(), |t| t.id, prefix)
    }

    pub fn add_transaction(&mut self, transaction: Transaction) -> &Transaction {
        self.transactions.push(transaction);
        &self.transactions[self.transactions.len() - 1]
    }

    /// Returns false when no transaction has this id
    pub fn delete_transaction(&mut self, id: Uuid) -> bool {
        let before = self.transactions.len();
        self.transactions.retain(|t| t.id != id);
        self.transactions.len() != before
    }

    pub fn delete_contributor(&mut self, transaction_id: Uuid, contributor_id: Uuid) -> ContributorRemoval {
        let Some(index) = self.transactions.iter().position(|t| t.id == transaction_id) else {
            return ContributorRemoval::NotFound;
        };

        let transaction = &mut self.transactions[index];
        let before = transaction.contributors.len();
        transaction.contributors.retain(|c| c.id != contributor_id);

        if transaction.contributors.len() == before {
            ContributorRemoval::NotFound
        } else if transaction.contributors.is_empty() {
            self.transactions.remove(index);
            ContributorRemoval::TransactionRemoved
        } else {
            ContributorRemoval::Removed
        }
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// A missing key is an empty ledger; a malformed value is an error
    pub fn load<S: BlobStore + ?Sized>(store: &S, key: &str) -> Result<Self> {
        let Some(blob) = store.get(key)? else {
            return Ok(Ledger::new());
        };

        serde_json::from_str(&blob)
            .with_context(|| format!("Stored ledger under '{}' is malformed", key))
    }

    pub fn save<S: BlobStore + ?Sized>(&self, store: &mut S, key: &str) -> Result<()> {
        let blob = serde_json::to_string(self).context("Failed to serialize ledger")?;
        store.put(key, &blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBlobStore;

    fn lunch() -> Transaction {
        Transaction::new(
            "Alice,Bob",
            100.0,
            vec![Contribution::new("Alice", 40.0), Contribution::new("Bob", 60.0)],
        )
    }

    #[test]
    fn test_new_transaction_assigns_unique_ids() {
        let tx = lunch();

        assert_eq!(tx.contributors.len(), 2);
        assert_ne!(tx.contributors[0].id, tx.contributors[1].id);
        assert_ne!(tx.id, tx.contributors[0].id);
        assert_eq!(tx.contributed_total(), 100.0);
    }

    #[test]
    fn test_add_and_delete_transaction() {
        let mut ledger = Ledger::new();
        let id = ledger.add_transaction(lunch()).id;
        ledger.add_transaction(lunch());

        assert_eq!(ledger.len(), 2);
        assert!(ledger.delete_transaction(id));
        assert!(!ledger.delete_transaction(id));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get(id).is_none());
    }

    #[test]
    fn test_delete_one_of_several_contributors() {
        let mut ledger = Ledger::new();
        let tx = ledger.add_transaction(lunch()).clone();

        let removal = ledger.delete_contributor(tx.id, tx.contributors[0].id);

        assert_eq!(removal, ContributorRemoval::Removed);
        let remaining = ledger.get(tx.id).unwrap();
        assert_eq!(remaining.contributors.len(), 1);
        assert_eq!(remaining.contributors[0].name, "Bob");
    }

    #[test]
    fn test_delete_last_contributor_removes_transaction() {
        let mut ledger = Ledger::new();
        let tx = ledger.add_transaction(lunch()).clone();

        ledger.delete_contributor(tx.id, tx.contributors[0].id);
        let removal = ledger.delete_contributor(tx.id, tx.contributors[1].id);

        assert_eq!(removal, ContributorRemoval::TransactionRemoved);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_delete_unknown_contributor() {
        let mut ledger = Ledger::new();
        let tx = ledger.add_transaction(lunch()).clone();

        assert_eq!(
            ledger.delete_contributor(tx.id, Uuid::new_v4()),
            ContributorRemoval::NotFound
        );
        assert_eq!(
            ledger.delete_contributor(Uuid::new_v4(), tx.contributors[0].id),
            ContributorRemoval::NotFound
        );
        assert_eq!(ledger.get(tx.id).unwrap().contributors.len(), 2);
    }

    #[test]
    fn test_find_by_prefix() {
        let mut ledger = Ledger::new();
        let tx = ledger.add_transaction(lunch()).clone();
        let full = tx.id.to_string();

        assert_eq!(ledger.find_by_prefix(&full[..8]).map(|t| t.id), Some(tx.id));
        assert_eq!(ledger.find_by_prefix(&full.to_uppercase()).map(|t| t.id), Some(tx.id));
        assert!(ledger.find_by_prefix("").is_none());
    }

    #[test]
    fn test_find_by_prefix_rejects_ambiguous_prefix() {
        let mut first = lunch();
        first.id = Uuid::from_u128(0xabcd_0000_0000_0000_0000_0000_0000_0001);
        let mut second = lunch();
        second.id = Uuid::from_u128(0xabcd_0000_0000_0000_0000_0000_0000_0002);
        let ledger = Ledger::from_transactions(vec![first.clone(), second]);

        assert!(ledger.find_by_prefix("abcd").is_none());
        assert_eq!(
            ledger.find_by_prefix("abcd0000-0000-0000-0000-000000000001").map(|t| t.id),
            Some(first.id)
        );
    }

    #[test]
    fn test_find_contributor_by_prefix() {
        let mut tx = lunch();
        tx.contributors[0].id = Uuid::from_u128(0x1111_0000_0000_0000_0000_0000_0000_0001);
        tx.contributors[1].id = Uuid::from_u128(0x1111_0000_0000_0000_0000_0000_0000_0002);

        assert_eq!(tx.find_contributor_by_prefix("11110000-0000-0000-0000-000000000002").map(|c| c.name.as_str()), Some("Bob"));
        assert_eq!(tx.find_contributor_by_prefix(" 11110000-0000-0000-0000-000000000001 ").map(|c| c.name.as_str()), Some("Alice"));
        // Both ids share this prefix
        assert!(tx.find_contributor_by_prefix("1111").is_none());
        assert!(tx.find_contributor_by_prefix("").is_none());
        assert!(tx.find_contributor_by_prefix("ffff").is_none());
    }

    #[test]
    fn test_round_trip_through_store() {
        let mut ledger = Ledger::new();
        ledger.add_transaction(lunch());
        ledger.add_transaction(Transaction::new(
            "Cab",
            12.5,
            vec![Contribution::new("Carol", 12.5)],
        ));

        let mut store = MemoryBlobStore::new();
        ledger.save(&mut store, "ledger").unwrap();
        let loaded = Ledger::load(&store, "ledger").unwrap();

        assert_eq!(loaded, ledger);
    }

    #[test]
    fn test_serialized_field_names() {
        let tx = lunch();
        let json = serde_json::to_value(Ledger::from_transactions(vec![tx.clone()])).unwrap();

        let first = &json[0];
        assert_eq!(first["id"], serde_json::json!(tx.id.to_string()));
        assert_eq!(first["description"], "Alice,Bob");
        assert_eq!(first["amount"], 100.0);
        assert_eq!(first["contributors"][1]["name"], "Bob");
        assert_eq!(first["contributors"][1]["amount"], 60.0);
        assert!(first["contributors"][1]["id"].is_string());
    }

    #[test]
    fn test_load_missing_key_is_empty() {
        let store = MemoryBlobStore::new();
        let ledger = Ledger::load(&store, "nothing-here").unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_load_malformed_blob_fails() {
        let mut store = MemoryBlobStore::new();
        store.put("ledger", "{not json").unwrap();

        let err = Ledger::load(&store, "ledger").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }
}
