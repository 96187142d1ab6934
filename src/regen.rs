//! Regeneration controller: decide per artifact whether to write, skip or overwrite.
//!
//! The decision uses only the artifact index (identity → fingerprint of what this system last
//! wrote). Overwrite is whole-artifact; content is never merged. The first failed write stops
//! the run and every later artifact is reported as not attempted.

use crate::emit::{Artifact, ArtifactId, ArtifactKind};
use crate::sink::ArtifactSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const SKIP_REASON: &str = "exists, overwrite disabled";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedArtifact {
    pub path: String,
    pub fingerprint: String,
}

/// Flat on-disk/over-the-wire form of one index entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexRecord {
    application: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    kind: ArtifactKind,
    path: String,
    fingerprint: String,
}

/// Fingerprints of artifacts previously written by this system, keyed by identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<IndexRecord>", into = "Vec<IndexRecord>")]
pub struct ArtifactIndex(BTreeMap<ArtifactId, IndexedArtifact>);

impl From<Vec<IndexRecord>> for ArtifactIndex {
    fn from(records: Vec<IndexRecord>) -> Self {
        ArtifactIndex(
            records
                .into_iter()
                .map(|r| {
                    (
                        ArtifactId {
                            application: r.application,
                            model: r.model,
                            kind: r.kind,
                        },
                        IndexedArtifact {
                            path: r.path,
                            fingerprint: r.fingerprint,
                        },
                    )
                })
                .collect(),
        )
    }
}

impl From<ArtifactIndex> for Vec<IndexRecord> {
    fn from(index: ArtifactIndex) -> Self {
        index
            .0
            .into_iter()
            .map(|(id, a)| IndexRecord {
                application: id.application,
                model: id.model,
                kind: id.kind,
                path: a.path,
                fingerprint: a.fingerprint,
            })
            .collect()
    }
}

impl ArtifactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index holding every artifact as if it had been written.
    pub fn from_artifacts(artifacts: &[Artifact]) -> Self {
        let mut index = Self::new();
        for a in artifacts {
            index.insert(a.id.clone(), a.path.clone(), a.fingerprint.clone());
        }
        index
    }

    pub fn insert(&mut self, id: ArtifactId, path: String, fingerprint: String) {
        self.0.insert(id, IndexedArtifact { path, fingerprint });
    }

    pub fn get(&self, id: &ArtifactId) -> Option<&IndexedArtifact> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactId, &IndexedArtifact)> {
        self.0.iter()
    }

    /// Entries belonging to one application.
    pub fn for_application(&self, application: &str) -> ArtifactIndex {
        ArtifactIndex(
            self.0
                .iter()
                .filter(|(id, _)| id.application == application)
                .map(|(id, a)| (id.clone(), a.clone()))
                .collect(),
        )
    }

    /// Replace all entries of `application` with `entries`.
    pub fn replace_application(&mut self, application: &str, entries: ArtifactIndex) {
        self.0.retain(|id, _| id.application != application);
        self.0.extend(entries.0);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    Written,
    Skipped { reason: String },
    Overwritten,
    Failed { error: String },
    NotAttempted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEntry {
    pub id: ArtifactId,
    pub path: String,
    pub fingerprint: String,
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

/// Per-artifact outcome of one run, in emission order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteReport {
    pub run_id: Uuid,
    pub application: String,
    pub generated_at: DateTime<Utc>,
    pub overwrite: bool,
    pub entries: Vec<WriteEntry>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub written: usize,
    pub skipped: usize,
    pub overwritten: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

impl WriteReport {
    /// Entries whose content is now on disk from this run.
    pub fn completed(&self) -> Vec<&WriteEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, WriteOutcome::Written | WriteOutcome::Overwritten))
            .collect()
    }

    pub fn failure(&self) -> Option<&WriteEntry> {
        self.entries.iter().find(|e| matches!(e.outcome, WriteOutcome::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut c = OutcomeCounts::default();
        for e in &self.entries {
            match e.outcome {
                WriteOutcome::Written => c.written += 1,
                WriteOutcome::Skipped { .. } => c.skipped += 1,
                WriteOutcome::Overwritten => c.overwritten += 1,
                WriteOutcome::Failed { .. } => c.failed += 1,
                WriteOutcome::NotAttempted => c.not_attempted += 1,
            }
        }
        c
    }

    /// `prior` with the fingerprints of everything this run wrote.
    pub fn next_index(&self, prior: &ArtifactIndex) -> ArtifactIndex {
        let mut next = prior.clone();
        for e in self.completed() {
            next.insert(e.id.clone(), e.path.clone(), e.fingerprint.clone());
        }
        next
    }
}

/// Write, skip or overwrite each artifact in order.
pub async fn apply(
    artifacts: &[Artifact],
    existing: &ArtifactIndex,
    overwrite: bool,
    sink: &dyn ArtifactSink,
) -> WriteReport {
    let application = artifacts
        .first()
        .map(|a| a.id.application.clone())
        .unwrap_or_default();
    let run_id = Uuid::new_v4();
    let mut entries = Vec::with_capacity(artifacts.len());
    let mut stopped = false;

    for a in artifacts {
        let exists = existing.contains(&a.id);
        let outcome = if stopped {
            WriteOutcome::NotAttempted
        } else if exists && !overwrite {
            WriteOutcome::Skipped {
                reason: SKIP_REASON.to_string(),
            }
        } else {
            match sink.write(&a.path, a.content.as_bytes()).await {
                Ok(()) if exists => WriteOutcome::Overwritten,
                Ok(()) => WriteOutcome::Written,
                Err(e) => {
                    stopped = true;
                    tracing::warn!(%run_id, artifact = %a.id, path = %a.path, error = %e, "artifact write failed");
                    WriteOutcome::Failed { error: e.to_string() }
                }
            }
        };
        tracing::debug!(%run_id, artifact = %a.id, outcome = ?outcome, "artifact");
        entries.push(WriteEntry {
            id: a.id.clone(),
            path: a.path.clone(),
            fingerprint: a.fingerprint.clone(),
            outcome,
        });
    }

    let report = WriteReport {
        run_id,
        application,
        generated_at: Utc::now(),
        overwrite,
        entries,
    };
    let c = report.counts();
    tracing::info!(
        %run_id,
        application = %report.application,
        written = c.written,
        overwritten = c.overwritten,
        skipped = c.skipped,
        failed = c.failed,
        not_attempted = c.not_attempted,
        "artifacts applied"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn artifact(model: &str, kind: ArtifactKind, content: &str) -> Artifact {
        Artifact::new(
            ArtifactId::model("shop", model, kind),
            format!("shop/{}.py", model.to_lowercase()),
            content.to_string(),
        )
    }

    fn artifacts() -> Vec<Artifact> {
        vec![
            artifact("Customer", ArtifactKind::Model, "a"),
            artifact("Order", ArtifactKind::Model, "b"),
            artifact("Tag", ArtifactKind::Model, "c"),
        ]
    }

    #[tokio::test]
    async fn new_identities_are_written() {
        let sink = MemorySink::new();
        let report = apply(&artifacts(), &ArtifactIndex::new(), false, &sink).await;
        assert!(report.entries.iter().all(|e| e.outcome == WriteOutcome::Written));
        assert_eq!(sink.get("shop/order.py"), Some(b"b".to_vec()));
        assert_eq!(report.application, "shop");
    }

    #[tokio::test]
    async fn existing_identities_skip_without_overwrite() {
        let all = artifacts();
        let mut existing = ArtifactIndex::from_artifacts(&all[..2]);
        existing.insert(
            ArtifactId::package("other", "urls"),
            "other/urls.py".into(),
            "ff".into(),
        );
        let sink = MemorySink::new();
        let report = apply(&all, &existing, false, &sink).await;
        assert_eq!(
            report.entries[0].outcome,
            WriteOutcome::Skipped { reason: SKIP_REASON.into() }
        );
        assert_eq!(report.entries[2].outcome, WriteOutcome::Written);
        assert_eq!(sink.paths(), vec!["shop/tag.py".to_string()]);
    }

    #[tokio::test]
    async fn existing_identities_are_overwritten_when_asked() {
        let all = artifacts();
        let existing = ArtifactIndex::from_artifacts(&all);
        let sink = MemorySink::new();
        let report = apply(&all, &existing, true, &sink).await;
        assert!(report.entries.iter().all(|e| e.outcome == WriteOutcome::Overwritten));
        assert_eq!(report.counts().overwritten, 3);
    }

    #[tokio::test]
    async fn first_failure_stops_the_run() {
        let sink = MemorySink::failing_on("shop/order.py");
        let report = apply(&artifacts(), &ArtifactIndex::new(), false, &sink).await;
        assert_eq!(report.entries[0].outcome, WriteOutcome::Written);
        assert!(matches!(report.entries[1].outcome, WriteOutcome::Failed { .. }));
        assert_eq!(report.entries[2].outcome, WriteOutcome::NotAttempted);
        assert!(!report.is_success());
        assert_eq!(report.completed().len(), 1);
        let next = report.next_index(&ArtifactIndex::new());
        assert_eq!(next.len(), 1);
        assert!(next.contains(&ArtifactId::model("shop", "Customer", ArtifactKind::Model)));
    }

    #[test]
    fn index_serializes_as_records() {
        let index = ArtifactIndex::from_artifacts(&artifacts());
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json.as_array().map(|a| a.len()), Some(3));
        assert_eq!(json[0]["kind"], "model");
        let back: ArtifactIndex = serde_json::from_value(json).unwrap();
        assert_eq!(back, index);

        let mut joined = ArtifactIndex::new();
        joined.insert(
            ArtifactId::model("shop", "Order", ArtifactKind::Join("tags".into())),
            "shop/models/order_tags.py".into(),
            "00".into(),
        );
        let json = serde_json::to_value(&joined).unwrap();
        assert_eq!(json[0]["kind"]["join"], "tags");
    }

    #[test]
    fn application_entries_can_be_replaced() {
        let mut index = ArtifactIndex::from_artifacts(&artifacts());
        index.insert(ArtifactId::package("blog", "urls"), "blog/urls.py".into(), "11".into());
        index.replace_application("shop", ArtifactIndex::new());
        assert_eq!(index.len(), 1);
        assert_eq!(index.for_application("blog").len(), 1);
    }
}
