//! JSON files under `<output>/.appgen/`: `applications/<name>.json`, `index.json`, `known.json`.

use super::{Persistence, StoreError};
use crate::catalog::{CatalogState, StoredApplication};
use crate::regen::ArtifactIndex;
use crate::resolve::{KnownApplication, KnownApplications};
use crate::sink::{ArtifactSink, FsSink};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const STATE_DIR: &str = ".appgen";
const INDEX_FILE: &str = "index.json";
const KNOWN_FILE: &str = "known.json";
const APPLICATIONS_DIR: &str = "applications";

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    files: FsSink,
    /// Serializes read-modify-write of `index.json`.
    index_guard: Mutex<()>,
    /// Serializes read-modify-write of `known.json`.
    known_guard: Mutex<()>,
}

impl FileStore {
    /// Store for the output directory `output`; files live in `output/.appgen`.
    pub fn for_output(output: impl AsRef<Path>) -> Self {
        let root = output.as_ref().join(STATE_DIR);
        FileStore {
            files: FsSink::new(&root),
            root,
            index_guard: Mutex::new(()),
            known_guard: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, rel: &str) -> Result<T, StoreError> {
        match tokio::fs::read(self.root.join(rel)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: serde::Serialize>(&self, rel: &str, value: &T) -> Result<(), StoreError> {
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        self.files.write(rel, &bytes).await?;
        Ok(())
    }

    fn application_file(name: &str) -> String {
        format!("{}/{}.json", APPLICATIONS_DIR, name)
    }
}

#[async_trait]
impl Persistence for FileStore {
    async fn load(&self) -> Result<CatalogState, StoreError> {
        let mut state = CatalogState {
            known: self.read_json(KNOWN_FILE).await?,
            index: self.read_json(INDEX_FILE).await?,
            ..CatalogState::default()
        };

        let dir = self.root.join(APPLICATIONS_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(state),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let application: StoredApplication = serde_json::from_slice(&bytes)?;
            state.applications.insert(application.name.clone(), application);
        }
        tracing::debug!(root = %self.root.display(), applications = state.applications.len(), "catalog loaded from files");
        Ok(state)
    }

    async fn save_application(&self, application: &StoredApplication) -> Result<(), StoreError> {
        self.write_json(&Self::application_file(&application.name), application).await
    }

    async fn delete_application(&self, name: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.root.join(Self::application_file(name))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_index(&self, application: &str, index: &ArtifactIndex) -> Result<(), StoreError> {
        let _guard = self.index_guard.lock().await;
        let mut all: ArtifactIndex = self.read_json(INDEX_FILE).await?;
        all.replace_application(application, index.for_application(application));
        self.write_json(INDEX_FILE, &all).await
    }

    async fn save_known(&self, name: &str, entry: &KnownApplication) -> Result<(), StoreError> {
        let _guard = self.known_guard.lock().await;
        let mut known: KnownApplications = self.read_json(KNOWN_FILE).await?;
        known.insert(name, entry.clone());
        self.write_json(KNOWN_FILE, &known).await
    }

    async fn forget_known(&self, name: &str) -> Result<(), StoreError> {
        let _guard = self.known_guard.lock().await;
        let mut known: KnownApplications = self.read_json(KNOWN_FILE).await?;
        if known.remove(name).is_none() {
            return Ok(());
        }
        self.write_json(KNOWN_FILE, &known).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::types::ApplicationDraft;
    use crate::emit::ArtifactId;
    use chrono::Utc;

    #[tokio::test]
    async fn empty_directory_loads_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = FileStore::for_output(dir.path()).load().await.unwrap();
        assert!(state.applications.is_empty());
        assert!(state.index.is_empty());
    }

    #[tokio::test]
    async fn records_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::for_output(dir.path());
        let app = StoredApplication {
            name: "shop".into(),
            draft: ApplicationDraft::from_models("shop", vec![]),
            version: 1,
            updated_at: Utc::now(),
        };
        store.save_application(&app).await.unwrap();

        let mut index = ArtifactIndex::new();
        index.insert(ArtifactId::package("shop", "urls"), "shop/urls.py".into(), "ab".into());
        store.save_index("shop", &index).await.unwrap();
        let mut blog = ArtifactIndex::new();
        blog.insert(ArtifactId::package("blog", "urls"), "blog/urls.py".into(), "cd".into());
        store.save_index("blog", &blog).await.unwrap();

        let shop = KnownApplication { models: Some(vec!["Order".into()]) };
        store.save_known("shop", &shop).await.unwrap();
        let mut known = KnownApplications::new();
        known.insert("shop", shop);

        let state = FileStore::for_output(dir.path()).load().await.unwrap();
        assert_eq!(state.applications.get("shop"), Some(&app));
        assert_eq!(state.index.len(), 2);
        assert_eq!(state.known, known);
        assert!(dir.path().join(".appgen/index.json").exists());

        store.delete_application("shop").await.unwrap();
        store.forget_known("shop").await.unwrap();
        let state = store.load().await.unwrap();
        assert!(state.applications.is_empty());
        assert!(!state.known.contains("shop"));
        assert_eq!(state.index.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_known_entries_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::for_output(dir.path());
        let entry = |m: &str| KnownApplication { models: Some(vec![m.to_string()]) };
        let (order, post, lead) = (entry("Order"), entry("Post"), entry("Lead"));
        let (a, b, c) = tokio::join!(
            store.save_known("shop", &order),
            store.save_known("blog", &post),
            store.save_known("crm", &lead),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let known = FileStore::for_output(dir.path()).load().await.unwrap().known;
        for name in ["shop", "blog", "crm"] {
            assert!(known.contains(name), "{} lost", name);
        }
    }
}
