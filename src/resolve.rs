//! Reference resolution: annotate every relationship with the identity of its target.
//!
//! Targets in the application being generated must exist in it. Targets in previously
//! generated applications must appear in that application's recorded model list. Framework
//! applications registered without a model list are taken on trust and left deferred.
//! Anything else is an [`UnknownTargetError`]; all of them are reported together.

use crate::definition::model::{ApplicationDefinition, ModelDefinition, RelationshipDefinition};
use crate::error::{UnknownTargetError, UnknownTargetErrors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Framework applications every generated application may reference.
pub const BUILTIN_APPLICATIONS: &[&str] = &["auth", "contenttypes"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownApplication {
    /// Emitted model names; `None` for applications whose models are not tracked here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
}

/// Read-only index of applications generated in earlier runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownApplications(BTreeMap<String, KnownApplication>);

impl KnownApplications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index holding only the framework applications.
    pub fn with_builtins() -> Self {
        let mut known = Self::new();
        for name in BUILTIN_APPLICATIONS {
            known.insert_opaque(*name);
        }
        known
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: KnownApplication) {
        self.0.insert(name.into(), entry);
    }

    pub fn insert_generated(&mut self, name: impl Into<String>, models: Vec<String>) {
        self.0.insert(name.into(), KnownApplication { models: Some(models) });
    }

    pub fn insert_opaque(&mut self, name: impl Into<String>) {
        self.0.insert(name.into(), KnownApplication { models: None });
    }

    pub fn remove(&mut self, name: &str) -> Option<KnownApplication> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&KnownApplication> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &KnownApplication)> {
        self.0.iter()
    }

    /// Entries of `other` replace entries with the same name.
    pub fn merge(&mut self, other: KnownApplications) {
        self.0.extend(other.0);
    }
}

/// Resolved identity of a relationship target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Reference {
    Resolved { application: String, model: String },
    Deferred { raw: String },
}

impl Reference {
    /// True when the target is a model of the given application (the current batch).
    pub fn is_in(&self, application: &str) -> bool {
        matches!(self, Reference::Resolved { application: a, .. } if a == application)
    }
}

/// A validated definition with one [`Reference`] per relationship.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedDefinition {
    pub definition: ApplicationDefinition,
    /// `references[m][r]` belongs to `definition.models[m].relationships[r]`.
    references: Vec<Vec<Reference>>,
}

impl ResolvedDefinition {
    pub fn application(&self) -> &str {
        &self.definition.name
    }

    pub fn references_of(&self, model_index: usize) -> &[Reference] {
        self.references.get(model_index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every relationship with its owner and reference, in declaration order.
    pub fn relationships(&self) -> impl Iterator<Item = (&ModelDefinition, &RelationshipDefinition, &Reference)> {
        self.definition
            .models
            .iter()
            .zip(self.references.iter())
            .flat_map(|(m, refs)| m.relationships.iter().zip(refs.iter()).map(move |(r, reference)| (m, r, reference)))
    }

    pub fn model_index(&self, name: &str) -> Option<usize> {
        self.definition.models.iter().position(|m| m.name == name)
    }
}

fn resolve_one(
    definition: &ApplicationDefinition,
    known: &KnownApplications,
    rel: &RelationshipDefinition,
) -> Option<Reference> {
    let target = &rel.target;
    if target.application == definition.name {
        return definition.model(&target.model).map(|_| Reference::Resolved {
            application: target.application.clone(),
            model: target.model.clone(),
        });
    }
    match known.get(&target.application)? {
        KnownApplication { models: Some(models) } => models.iter().any(|m| *m == target.model).then(|| Reference::Resolved {
            application: target.application.clone(),
            model: target.model.clone(),
        }),
        KnownApplication { models: None } => Some(Reference::Deferred { raw: target.raw() }),
    }
}

pub fn resolve(
    definition: ApplicationDefinition,
    known: &KnownApplications,
) -> Result<ResolvedDefinition, UnknownTargetErrors> {
    let mut errors = Vec::new();
    let mut references = Vec::with_capacity(definition.models.len());
    for m in &definition.models {
        let mut refs = Vec::with_capacity(m.relationships.len());
        for r in &m.relationships {
            match resolve_one(&definition, known, r) {
                Some(reference) => refs.push(reference),
                None => errors.push(UnknownTargetError {
                    application: definition.name.clone(),
                    model: m.name.clone(),
                    relation: r.name.clone(),
                    target: r.target.raw(),
                }),
            }
        }
        references.push(refs);
    }
    if !errors.is_empty() {
        tracing::debug!(application = %definition.name, unknown = errors.len(), "unresolved targets");
        return Err(UnknownTargetErrors(errors));
    }
    let deferred = references.iter().flatten().filter(|r| matches!(r, Reference::Deferred { .. })).count();
    tracing::debug!(application = %definition.name, deferred, "references resolved");
    Ok(ResolvedDefinition {
        definition,
        references,
    })
}
