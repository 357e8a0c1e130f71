// 🗂️ Session - one open ledger and the operations a user can run on it
//
// Every mutating operation runs against the in-memory ledger and then saves
// the whole ledger. If the save fails the in-memory ledger is rolled back, so
// memory and storage never disagree.

use crate::chart::{ChartRegistry, ChartVisibility, PieChart};
use crate::commit::{commit_transaction, Reconciler, Submission};
use crate::config::Config;
use crate::db::{BlobStore, SqliteBlobStore};
use crate::ledger::{ContributorRemoval, Ledger};
use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

pub struct Session<S: BlobStore = SqliteBlobStore> {
    store: S,
    key: String,
    ledger: Ledger,
    charts: ChartRegistry,
    reconciler: Reconciler,
}

impl Session<SqliteBlobStore> {
    pub fn open(config: &Config) -> Result<Self> {
        let store = SqliteBlobStore::open(&config.db_path)?;
        Session::new(
            store,
            &config.storage_key,
            Reconciler::with_tolerance(config.tolerance_cents),
        )
    }
}

impl<S: BlobStore> Session<S> {
    /// Load the ledger stored under `key`
    pub fn new(store: S, key: &str, reconciler: Reconciler) -> Result<Self> {
        let ledger = Ledger::load(&store, key)?;
        info!(key, transactions = ledger.len(), "ledger loaded");

        Ok(Session {
            store,
            key: key.to_string(),
            ledger,
            charts: ChartRegistry::new(),
            reconciler,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn charts(&self) -> &ChartRegistry {
        &self.charts
    }

    pub fn chart(&self, transaction_id: Uuid) -> Option<&PieChart> {
        self.charts.get(transaction_id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Throw away the in-memory ledger and read it again
    pub fn reload(&mut self) -> Result<()> {
        self.ledger = Ledger::load(&self.store, &self.key)?;
        self.charts.sync(&self.ledger);
        Ok(())
    }

    /// Full UUID, or a prefix matching exactly one transaction
    pub fn resolve(&self, id: &str) -> Result<Uuid> {
        if let Ok(uuid) = Uuid::parse_str(id.trim()) {
            if self.ledger.get(uuid).is_some() {
                return Ok(uuid);
            }
        }
        self.ledger
            .find_by_prefix(id)
            .map(|tx| tx.id)
            .ok_or_else(|| anyhow!("No single transaction matches '{}'", id.trim()))
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Commit errors come back with the commit message as the error text
    pub fn add_transaction(&mut self, submission: &Submission) -> Result<Uuid> {
        let snapshot = self.ledger.clone();
        let id = commit_transaction(&mut self.ledger, submission, &self.reconciler)?.id;
        self.persist(snapshot)?;
        Ok(id)
    }

    pub fn delete_transaction(&mut self, id: Uuid) -> Result<bool> {
        let snapshot = self.ledger.clone();
        if !self.ledger.delete_transaction(id) {
            return Ok(false);
        }
        self.persist(snapshot)?;
        self.charts.hide(id);
        info!(%id, "transaction deleted");
        Ok(true)
    }

    pub fn delete_contributor(&mut self, transaction_id: Uuid, contributor_id: Uuid) -> Result<ContributorRemoval> {
        let snapshot = self.ledger.clone();
        let removal = self.ledger.delete_contributor(transaction_id, contributor_id);
        if removal == ContributorRemoval::NotFound {
            return Ok(removal);
        }
        self.persist(snapshot)?;
        self.charts.sync(&self.ledger);
        info!(%transaction_id, %contributor_id, ?removal, "contributor deleted");
        Ok(removal)
    }

    pub fn toggle_chart(&mut self, transaction_id: Uuid) -> Result<ChartVisibility> {
        let transaction = self
            .ledger
            .get(transaction_id)
            .with_context(|| format!("Transaction {} not found", transaction_id))?;
        let visibility = self.charts.toggle(transaction);
        info!(%transaction_id, ?visibility, "chart toggled");
        Ok(visibility)
    }

    fn persist(&mut self, snapshot: Ledger) -> Result<()> {
        if let Err(err) = self.ledger.save(&mut self.store, &self.key) {
            warn!(error = %err, "save failed, rolling back");
            self.ledger = snapshot;
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{CommitError, ErrorKind};
    use crate::db::MemoryBlobStore;

    /// Store whose writes can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryBlobStore,
        fail_writes: bool,
    }

    impl BlobStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn put(&mut self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes {
                return Err(anyhow!("disk full"));
            }
            self.inner.put(key, value)
        }
    }

    fn session() -> Session<MemoryBlobStore> {
        Session::new(MemoryBlobStore::new(), "ledger", Reconciler::new()).unwrap()
    }

    #[test]
    fn test_add_persists() {
        let mut session = session();
        let id = session
            .add_transaction(&Submission::new("Alice,Bob", "100", "Alice-40"))
            .unwrap();

        let stored = Ledger::load(session.store(), "ledger").unwrap();
        assert_eq!(stored, *session.ledger());
        assert_eq!(stored.get(id).unwrap().contributors[1].amount, 60.0);
    }

    #[test]
    fn test_failed_commit_keeps_ledger_and_store() {
        let mut session = session();
        let err = session
            .add_transaction(&Submission::new("Alice", "100", "Alice-40"))
            .unwrap_err();

        let commit_err = err.downcast_ref::<CommitError>().unwrap();
        assert_eq!(commit_err.kind(), ErrorKind::Underfunded);
        assert!(session.ledger().is_empty());
        assert_eq!(session.store().get("ledger").unwrap(), None);
    }

    #[test]
    fn test_save_failure_rolls_back() {
        let mut session = Session::new(FlakyStore::default(), "ledger", Reconciler::new()).unwrap();
        let id = session.add_transaction(&Submission::new("A,B", "10", "")).unwrap();

        session.store.fail_writes = true;
        assert!(session.add_transaction(&Submission::new("C", "5", "")).is_err());
        assert!(session.delete_transaction(id).is_err());

        assert_eq!(session.ledger().len(), 1);
        assert!(session.ledger().get(id).is_some());
    }

    #[test]
    fn test_delete_contributor_cascades_and_releases_chart() {
        let mut session = session();
        let id = session.add_transaction(&Submission::new("Solo", "20", "")).unwrap();
        let contributor = session.ledger().get(id).unwrap().contributors[0].id;

        assert_eq!(session.toggle_chart(id).unwrap(), ChartVisibility::Shown);
        let removal = session.delete_contributor(id, contributor).unwrap();

        assert_eq!(removal, ContributorRemoval::TransactionRemoved);
        assert!(session.ledger().is_empty());
        assert!(session.chart(id).is_none());
        assert!(session.toggle_chart(id).is_err());
    }

    #[test]
    fn test_delete_transaction_releases_chart() {
        let mut session = session();
        let id = session.add_transaction(&Submission::new("A,B", "10", "")).unwrap();
        session.toggle_chart(id).unwrap();

        assert!(session.delete_transaction(id).unwrap());
        assert!(session.charts().is_empty());
        assert!(!session.delete_transaction(id).unwrap());
    }

    #[test]
    fn test_resolve_by_prefix() {
        let mut session = session();
        let id = session.add_transaction(&Submission::new("A,B", "10", "")).unwrap();

        assert_eq!(session.resolve(&id.to_string()).unwrap(), id);
        assert_eq!(session.resolve(&id.to_string()[..6]).unwrap(), id);
        assert!(session.resolve("zzzz").is_err());
    }

    #[test]
    fn test_reload_picks_up_external_writes_and_syncs_charts() {
        let mut session = session();
        let kept = session.add_transaction(&Submission::new("A,B", "10", "")).unwrap();
        let dropped = session.add_transaction(&Submission::new("C", "5", "")).unwrap();
        session.toggle_chart(kept).unwrap();
        session.toggle_chart(dropped).unwrap();

        // Another writer removes one transaction and a contributor of the other
        let mut external = Ledger::load(session.store(), "ledger").unwrap();
        external.delete_transaction(dropped);
        let bob = external.get(kept).unwrap().contributors[1].id;
        external.delete_contributor(kept, bob);
        external.save(&mut session.store, "ledger").unwrap();

        session.reload().unwrap();

        assert_eq!(*session.ledger(), external);
        assert!(session.chart(dropped).is_none());
        let labels: Vec<&str> = session.chart(kept).unwrap().slices.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["A"]);
    }

    #[test]
    fn test_reload_of_malformed_store_keeps_ledger() {
        let mut session = session();
        let id = session.add_transaction(&Submission::new("A,B", "10", "")).unwrap();
        session.store.put("ledger", "{oops").unwrap();

        assert!(session.reload().is_err());
        assert!(session.ledger().get(id).is_some());
    }

    #[test]
    fn test_huge_amount_leaves_store_loadable() {
        let mut session = session();
        session.add_transaction(&Submission::new("A,B", "10", "")).unwrap();

        let err = session
            .add_transaction(&Submission::new("Alice,Bob", "1e307", ""))
            .unwrap_err();
        assert_eq!(err.downcast_ref::<CommitError>().unwrap().kind(), ErrorKind::Validation);

        let err = session
            .add_transaction(&Submission::new("Alice,Bob", "10", "Alice-1e307"))
            .unwrap_err();
        assert_eq!(err.downcast_ref::<CommitError>().unwrap().kind(), ErrorKind::Format);

        let stored = Ledger::load(session.store(), "ledger").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored, *session.ledger());
    }

    #[test]
    fn test_malformed_store_fails_to_open() {
        let mut store = MemoryBlobStore::new();
        store.put("ledger", "[{\"id\": 1}]").unwrap();

        assert!(Session::new(store, "ledger", Reconciler::new()).is_err());
    }
}
