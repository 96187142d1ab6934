//! Emission: ordered models → source artifacts.
//!
//! Per model (in emission order): model declaration, admin registration and serializer
//! (unless `skip_admin`), viewset (unless `skip_urls`), smoke test (unless `skip_tests`).
//! Then one join declaration per many-to-many relationship, then the package modules that
//! aggregate everything. Output is a pure function of the definition: same input, same bytes.

pub mod bundle;
pub mod types;

mod admin;
mod model;
mod routes;
mod smoke;

use crate::case::to_snake_case;
use crate::definition::model::{ModelDefinition, RelationKind, RelationshipDefinition};
use crate::error::UnsupportedTypeError;
use crate::graph::EmissionOrder;
use crate::resolve::{Reference, ResolvedDefinition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use types::{TargetType, TypeMap};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Model,
    Admin,
    Serializer,
    Route,
    Test,
    /// Join declaration for the named many-to-many relationship.
    Join(String),
    /// Aggregating module, e.g. `models` or `urls`.
    Package(String),
}

/// Stable identity of an artifact across runs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId {
    pub application: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub kind: ArtifactKind,
}

impl ArtifactId {
    pub fn model(application: &str, model: &str, kind: ArtifactKind) -> Self {
        ArtifactId {
            application: application.to_string(),
            model: Some(model.to_string()),
            kind,
        }
    }

    pub fn package(application: &str, module: &str) -> Self {
        ArtifactId {
            application: application.to_string(),
            model: None,
            kind: ArtifactKind::Package(module.to_string()),
        }
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            ArtifactKind::Model => "model".to_string(),
            ArtifactKind::Admin => "admin".to_string(),
            ArtifactKind::Serializer => "serializer".to_string(),
            ArtifactKind::Route => "route".to_string(),
            ArtifactKind::Test => "test".to_string(),
            ArtifactKind::Join(rel) => format!("join:{}", rel),
            ArtifactKind::Package(module) => format!("package:{}", module),
        };
        match &self.model {
            Some(m) => write!(f, "{}.{}/{}", self.application, m, kind),
            None => write!(f, "{}/{}", self.application, kind),
        }
    }
}

/// One emitted source unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub id: ArtifactId,
    /// Relative to the output root; always starts with the application directory.
    pub path: String,
    #[serde(skip)]
    pub content: String,
    /// Lowercase hex SHA-256 of `content`.
    pub fingerprint: String,
}

impl Artifact {
    pub fn new(id: ArtifactId, path: String, content: String) -> Self {
        let fingerprint = fingerprint(content.as_bytes());
        Artifact {
            id,
            path,
            content,
            fingerprint,
        }
    }
}

pub fn fingerprint(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Module file name for a model class.
pub(crate) fn module_name(model: &str) -> String {
    to_snake_case(model)
}

/// Shared inputs of the per-kind emitters.
pub(crate) struct EmitContext<'a> {
    pub resolved: &'a ResolvedDefinition,
    pub order: &'a EmissionOrder,
    pub type_map: &'a TypeMap,
}

impl<'a> EmitContext<'a> {
    pub fn app(&self) -> &'a str {
        self.resolved.application()
    }

    /// Models in emission order, each with its references.
    pub fn ordered_models(&self) -> Vec<(&'a ModelDefinition, &'a [Reference])> {
        let resolved: &'a ResolvedDefinition = self.resolved;
        self.order
            .models
            .iter()
            .filter_map(|name| {
                let i = resolved.model_index(name)?;
                Some((&resolved.definition.models[i], resolved.references_of(i)))
            })
            .collect()
    }

    /// Many-to-many relationships, owners in emission order.
    pub fn many_to_many(&self) -> Vec<(&'a ModelDefinition, &'a RelationshipDefinition, &'a Reference)> {
        self.ordered_models()
            .into_iter()
            .flat_map(|(m, refs)| {
                m.relationships
                    .iter()
                    .zip(refs.iter())
                    .filter(|(r, _)| r.kind == RelationKind::ManyToMany)
                    .map(move |(r, reference)| (m, r, reference))
            })
            .collect()
    }
}

/// Produce every artifact for a resolved, ordered definition. Fails on the first field whose
/// type tag has no entry in `type_map`; nothing is produced in that case.
pub fn emit(
    resolved: &ResolvedDefinition,
    order: &EmissionOrder,
    type_map: &TypeMap,
) -> Result<Vec<Artifact>, UnsupportedTypeError> {
    let ctx = EmitContext {
        resolved,
        order,
        type_map,
    };
    let flags = resolved.definition.flags;
    let app = ctx.app();
    let mut artifacts = Vec::new();

    for (m, refs) in ctx.ordered_models() {
        artifacts.push(model::model_artifact(&ctx, m, refs)?);
        if !flags.skip_admin {
            artifacts.push(admin::admin_artifact(&ctx, m)?);
            artifacts.push(admin::serializer_artifact(app, m));
        }
        if !flags.skip_urls {
            artifacts.push(routes::viewset_artifact(app, m, flags.skip_admin));
        }
        if !flags.skip_tests {
            artifacts.push(smoke::test_artifact(app, m));
        }
    }

    for (m, r, reference) in ctx.many_to_many() {
        artifacts.push(model::join_artifact(app, m, r, reference));
    }

    artifacts.push(model::models_package(&ctx));
    artifacts.push(model::app_config(&resolved.definition));
    if !flags.skip_admin {
        artifacts.push(admin::admin_package(&ctx));
        artifacts.push(admin::serializers_package(&ctx));
    }
    if !flags.skip_urls {
        artifacts.push(routes::views_package(&ctx));
        artifacts.push(routes::urls_module(&ctx));
    }
    if !flags.skip_tests {
        artifacts.push(smoke::tests_package(app));
    }

    tracing::debug!(application = %app, artifacts = artifacts.len(), "artifacts emitted");
    Ok(artifacts)
}

/// Lines grouped into import blocks separated by a blank line; empty groups are dropped.
pub(crate) fn import_block(groups: &[Vec<String>]) -> String {
    let blocks: Vec<String> = groups
        .iter()
        .filter(|g| !g.is_empty())
        .map(|g| {
            let mut lines = g.clone();
            lines.sort();
            lines.dedup();
            lines.join("\n")
        })
        .collect();
    blocks.join("\n\n")
}
