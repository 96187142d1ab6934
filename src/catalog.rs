//! In-memory catalog of stored applications, known applications and the artifact index.
//!
//! Readers take an `Arc` snapshot; commits build a new state and swap it in, so a reader sees
//! an application's generation either completely or not at all.

use crate::definition::types::ApplicationDraft;
use crate::regen::ArtifactIndex;
use crate::resolve::KnownApplications;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

/// An application definition as recorded by the service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredApplication {
    /// Normalized application name.
    pub name: String,
    pub draft: ApplicationDraft,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogState {
    pub applications: BTreeMap<String, StoredApplication>,
    pub known: KnownApplications,
    pub index: ArtifactIndex,
}

impl CatalogState {
    /// Names a new or renamed application may not take. `except` is the application being edited.
    pub fn taken_names(&self, except: Option<&str>) -> BTreeSet<String> {
        self.applications
            .keys()
            .cloned()
            .chain(self.known.iter().map(|(name, _)| name.clone()))
            .filter(|name| Some(name.as_str()) != except)
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    state: RwLock<Arc<CatalogState>>,
}

impl Catalog {
    pub fn new(state: CatalogState) -> Self {
        Catalog {
            state: RwLock::new(Arc::new(state)),
        }
    }

    pub fn snapshot(&self) -> Arc<CatalogState> {
        let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Apply `change` to a copy of the current state and publish it.
    pub fn commit<F>(&self, change: F) -> Arc<CatalogState>
    where
        F: FnOnce(&mut CatalogState),
    {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut next = CatalogState::clone(&guard);
        change(&mut next);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }
}

/// One async lock per application name; runs for different applications do not contend.
#[derive(Debug, Default)]
pub struct AppLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, application: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(application.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn snapshots_are_unaffected_by_later_commits() {
        let catalog = Catalog::new(CatalogState::default());
        let before = catalog.snapshot();
        catalog.commit(|s| s.known.insert_generated("shop", vec!["Order".into()]));
        assert!(!before.known.contains("shop"));
        assert!(catalog.snapshot().known.contains("shop"));
    }

    #[test]
    fn taken_names_exclude_the_edited_application() {
        let mut state = CatalogState::default();
        state.known.insert_generated("shop", vec![]);
        state.known.insert_opaque("auth");
        let taken = state.taken_names(Some("shop"));
        assert!(taken.contains("auth"));
        assert!(!taken.contains("shop"));
    }

    #[tokio::test]
    async fn same_application_runs_are_serialized() {
        let locks = Arc::new(AppLocks::new());
        let guard = locks.lock("shop").await;

        let other = locks.lock("blog").await;
        drop(other);

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock("shop").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }
}
