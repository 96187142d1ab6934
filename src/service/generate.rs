//! Generation service: stored applications, runs against the output sink, catalog commits.

use super::pipeline::{plan, Plan, PlanSummary};
use crate::case::normalize_app_name;
use crate::catalog::{AppLocks, Catalog, CatalogState, StoredApplication};
use crate::definition::types::ApplicationDraft;
use crate::emit::bundle::bundle;
use crate::emit::TypeMap;
use crate::error::{GenerateError, ValidationError, ValidationErrors, WriteFailure};
use crate::regen::{self, WriteReport};
use crate::resolve::{KnownApplication, KnownApplications};
use crate::sink::ArtifactSink;
use crate::store::{Persistence, StoreError};
use chrono::Utc;
use std::sync::Arc;

pub struct GenerationService {
    catalog: Catalog,
    locks: AppLocks,
    store: Arc<dyn Persistence>,
    sink: Arc<dyn ArtifactSink>,
    type_map: TypeMap,
}

impl GenerationService {
    /// Load the catalog from `store`. The framework applications are always known.
    pub async fn load(store: Arc<dyn Persistence>, sink: Arc<dyn ArtifactSink>) -> Result<Self, StoreError> {
        let mut state = store.load().await?;
        let mut known = KnownApplications::with_builtins();
        known.merge(state.known);
        state.known = known;
        Ok(GenerationService {
            catalog: Catalog::new(state),
            locks: AppLocks::new(),
            store,
            sink,
            type_map: TypeMap::django(),
        })
    }

    /// Register additional known applications (e.g. from a `--known` file) for this process.
    pub fn extend_known(&self, extra: KnownApplications) {
        self.catalog.commit(|s| s.known.merge(extra));
    }

    pub fn snapshot(&self) -> Arc<CatalogState> {
        self.catalog.snapshot()
    }

    pub fn list(&self) -> Vec<StoredApplication> {
        self.catalog.snapshot().applications.values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Result<StoredApplication, GenerateError> {
        let name = normalize_app_name(name);
        self.catalog
            .snapshot()
            .applications
            .get(&name)
            .cloned()
            .ok_or(GenerateError::NotFound(name))
    }

    /// Validate and plan a draft without storing or writing anything.
    pub fn validate(&self, draft: &ApplicationDraft) -> Result<PlanSummary, GenerateError> {
        let name = normalize_app_name(&draft.name);
        let state = self.catalog.snapshot();
        let except = state.applications.contains_key(&name).then_some(name.as_str());
        Ok(self.plan_with(&state, draft, except)?.summary())
    }

    pub async fn create(&self, draft: ApplicationDraft) -> Result<StoredApplication, GenerateError> {
        let name = normalize_app_name(&draft.name);
        let _guard = self.locks.lock(&name).await;
        let state = self.catalog.snapshot();
        if state.applications.contains_key(&name) {
            return Err(GenerateError::AlreadyExists(name));
        }
        self.plan_with(&state, &draft, None)?;
        self.record(name, draft, 1).await
    }

    /// Replace the stored draft. The application name cannot change.
    pub async fn update(&self, name: &str, draft: ApplicationDraft) -> Result<StoredApplication, GenerateError> {
        let name = normalize_app_name(name);
        let _guard = self.locks.lock(&name).await;
        let state = self.catalog.snapshot();
        let current = state
            .applications
            .get(&name)
            .ok_or_else(|| GenerateError::NotFound(name.clone()))?;
        if normalize_app_name(&draft.name) != name {
            return Err(ValidationErrors(vec![ValidationError::new(
                name.as_str(),
                "name",
                format!("cannot be changed to '{}'", draft.name),
            )])
            .into());
        }
        self.plan_with(&state, &draft, Some(&name))?;
        self.record(name, draft, current.version + 1).await
    }

    /// Create the application if absent, otherwise update it.
    pub async fn upsert(&self, draft: ApplicationDraft) -> Result<StoredApplication, GenerateError> {
        let name = normalize_app_name(&draft.name);
        if self.catalog.snapshot().applications.contains_key(&name) {
            self.update(&name, draft).await
        } else {
            self.create(draft).await
        }
    }

    /// Logical delete: the application leaves the catalog and the known applications.
    /// Emitted artifacts stay on disk and keep their index entries.
    pub async fn delete(&self, name: &str) -> Result<(), GenerateError> {
        let name = normalize_app_name(name);
        let _guard = self.locks.lock(&name).await;
        if !self.catalog.snapshot().applications.contains_key(&name) {
            return Err(GenerateError::NotFound(name));
        }
        self.store.delete_application(&name).await?;
        self.catalog.commit(|s| {
            s.applications.remove(&name);
            s.known.remove(&name);
        });
        self.store.forget_known(&name).await?;
        tracing::info!(application = %name, "application deleted");
        Ok(())
    }

    /// Generate the stored application. `overwrite` overrides the stored flag for this run.
    pub async fn generate(&self, name: &str, overwrite: Option<bool>) -> Result<WriteReport, GenerateError> {
        let name = normalize_app_name(name);
        let _guard = self.locks.lock(&name).await;
        let state = self.catalog.snapshot();
        let stored = state
            .applications
            .get(&name)
            .ok_or_else(|| GenerateError::NotFound(name.clone()))?;
        let mut draft = stored.draft.clone();
        if let Some(overwrite) = overwrite {
            draft.flags.overwrite = overwrite;
        }
        let plan = self.plan_with(&state, &draft, Some(&name))?;

        let prior = state.index.for_application(&name);
        let report = regen::apply(&plan.artifacts, &prior, draft.flags.overwrite, self.sink.as_ref()).await;
        let next = report.next_index(&prior);
        self.store.save_index(&name, &next).await?;

        let success = report.is_success();
        let entry = KnownApplication {
            models: Some(plan.definition().model_names()),
        };
        self.catalog.commit(|s| {
            s.index.replace_application(&name, next);
            if success {
                s.known.insert(name.clone(), entry.clone());
            }
        });
        if !success {
            return Err(WriteFailure { report }.into());
        }
        self.store.save_known(&name, &entry).await?;
        Ok(report)
    }

    /// Zip of every artifact the stored application would produce.
    pub fn bundle(&self, name: &str) -> Result<Vec<u8>, GenerateError> {
        let name = normalize_app_name(name);
        let state = self.catalog.snapshot();
        let stored = state
            .applications
            .get(&name)
            .ok_or_else(|| GenerateError::NotFound(name.clone()))?;
        let plan = self.plan_with(&state, &stored.draft, Some(&name))?;
        Ok(bundle(&plan.artifacts)?)
    }

    fn plan_with(
        &self,
        state: &CatalogState,
        draft: &ApplicationDraft,
        except: Option<&str>,
    ) -> Result<Plan, GenerateError> {
        plan(draft, &state.taken_names(except), &state.known, &self.type_map)
    }

    async fn record(&self, name: String, draft: ApplicationDraft, version: i64) -> Result<StoredApplication, GenerateError> {
        let stored = StoredApplication {
            name,
            draft,
            version,
            updated_at: Utc::now(),
        };
        self.store.save_application(&stored).await?;
        self.catalog.commit(|s| {
            s.applications.insert(stored.name.clone(), stored.clone());
        });
        tracing::info!(application = %stored.name, version = stored.version, "application saved");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regen::WriteOutcome;
    use crate::sink::MemorySink;
    use crate::store::FileStore;

    const SHOP: &str = r#"{"name": "Shop", "models": [
        {"name": "Order", "relationships": [
            {"name": "customer", "type": "ForeignKey", "related_model": "Customer", "options": "on_delete=models.CASCADE"}]},
        {"name": "Customer", "fields": [{"name": "name", "type": "CharField", "options": "max_length=50"}]}
    ]}"#;

    async fn service(dir: &std::path::Path, sink: Arc<MemorySink>) -> GenerationService {
        GenerationService::load(Arc::new(FileStore::for_output(dir)), sink).await.unwrap()
    }

    #[tokio::test]
    async fn create_then_generate_then_skip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let svc = service(dir.path(), sink.clone()).await;

        let stored = svc.create(serde_json::from_str(SHOP).unwrap()).await.unwrap();
        assert_eq!(stored.name, "shop");
        assert!(matches!(
            svc.create(serde_json::from_str(SHOP).unwrap()).await,
            Err(GenerateError::AlreadyExists(_))
        ));

        let first = svc.generate("shop", None).await.unwrap();
        assert!(first.entries.iter().all(|e| e.outcome == WriteOutcome::Written));
        assert!(sink.get("shop/models/customer.py").is_some());
        assert!(svc.snapshot().known.contains("shop"));

        let second = svc.generate("shop", None).await.unwrap();
        assert!(second.entries.iter().all(|e| matches!(e.outcome, WriteOutcome::Skipped { .. })));
    }

    #[tokio::test]
    async fn later_applications_can_reference_generated_ones() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), Arc::new(MemorySink::new())).await;
        svc.create(serde_json::from_str(SHOP).unwrap()).await.unwrap();

        let billing: ApplicationDraft = serde_json::from_str(
            r#"{"name": "billing", "models": [{"name": "Invoice", "relationships": [
                {"name": "order", "type": "ForeignKey", "related_model": "shop.Order", "options": "on_delete=models.PROTECT"}]}]}"#,
        )
        .unwrap();
        assert!(matches!(svc.create(billing.clone()).await, Err(GenerateError::UnknownTargets(_))));

        svc.generate("shop", None).await.unwrap();
        svc.create(billing).await.unwrap();
        let report = svc.generate("billing", None).await.unwrap();
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn failed_write_is_reported_and_index_keeps_completed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::failing_on("shop/models/order.py"));
        let svc = service(dir.path(), sink).await;
        svc.create(serde_json::from_str(SHOP).unwrap()).await.unwrap();

        let err = svc.generate("shop", None).await.unwrap_err();
        let GenerateError::Write(WriteFailure { report }) = err else {
            panic!("expected write failure");
        };
        assert!(report.entries.iter().any(|e| e.outcome == WriteOutcome::NotAttempted));
        let indexed = svc.snapshot().index.for_application("shop").len();
        assert_eq!(indexed, report.completed().len());
        assert!(!svc.snapshot().known.contains("shop"));
    }

    #[tokio::test]
    async fn delete_is_logical_and_state_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), Arc::new(MemorySink::new())).await;
        svc.create(serde_json::from_str(SHOP).unwrap()).await.unwrap();
        svc.generate("shop", None).await.unwrap();
        svc.delete("shop").await.unwrap();
        assert!(matches!(svc.get("shop"), Err(GenerateError::NotFound(_))));

        let reloaded = service(dir.path(), Arc::new(MemorySink::new())).await;
        let state = reloaded.snapshot();
        assert!(state.applications.is_empty());
        assert!(!state.known.contains("shop"));
        assert!(state.known.contains("auth"));
        assert!(!state.index.for_application("shop").is_empty());
    }

    #[tokio::test]
    async fn services_sharing_a_store_keep_each_others_known_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Persistence> = Arc::new(FileStore::for_output(dir.path()));
        let first = GenerationService::load(store.clone(), Arc::new(MemorySink::new())).await.unwrap();
        let second = GenerationService::load(store, Arc::new(MemorySink::new())).await.unwrap();
        first.create(serde_json::from_str(SHOP).unwrap()).await.unwrap();
        second
            .create(serde_json::from_str(r#"{"name": "blog", "models": [{"name": "Post"}]}"#).unwrap())
            .await
            .unwrap();

        let (a, b) = tokio::join!(first.generate("shop", None), second.generate("blog", None));
        a.unwrap();
        b.unwrap();
        assert!(!second.snapshot().known.contains("shop"));

        let reloaded = service(dir.path(), Arc::new(MemorySink::new())).await;
        let state = reloaded.snapshot();
        assert!(state.known.contains("shop"));
        assert!(state.known.contains("blog"));
    }

    #[tokio::test]
    async fn update_keeps_the_name() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), Arc::new(MemorySink::new())).await;
        svc.create(serde_json::from_str(SHOP).unwrap()).await.unwrap();
        let mut draft: ApplicationDraft = serde_json::from_str(SHOP).unwrap();
        draft.label = Some("Store".into());
        let updated = svc.update("shop", draft.clone()).await.unwrap();
        assert_eq!(updated.version, 2);

        draft.name = "store".into();
        assert!(matches!(svc.update("shop", draft).await, Err(GenerateError::Validation(_))));
    }
}
