//! Pure pipeline: validate → resolve → order → emit. Nothing is written.

use crate::definition::model::ApplicationDefinition;
use crate::definition::types::ApplicationDraft;
use crate::definition::validate;
use crate::emit::{emit, Artifact, TypeMap};
use crate::error::GenerateError;
use crate::graph::{self, EmissionOrder};
use crate::resolve::{resolve, KnownApplications, Reference, ResolvedDefinition};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
pub struct Plan {
    pub resolved: ResolvedDefinition,
    pub order: EmissionOrder,
    pub artifacts: Vec<Artifact>,
}

/// What a run would produce, without artifact contents.
#[derive(Clone, Debug, Serialize)]
pub struct PlanSummary {
    pub application: String,
    /// Normalized definition in interchange form.
    pub definition: ApplicationDraft,
    pub order: EmissionOrder,
    pub references: Vec<ReferenceSummary>,
    pub artifacts: Vec<Artifact>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferenceSummary {
    pub model: String,
    pub relation: String,
    pub target: Reference,
}

impl Plan {
    pub fn definition(&self) -> &ApplicationDefinition {
        &self.resolved.definition
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            application: self.resolved.application().to_string(),
            definition: self.definition().to_draft(),
            order: self.order.clone(),
            references: self
                .resolved
                .relationships()
                .map(|(m, r, reference)| ReferenceSummary {
                    model: m.name.clone(),
                    relation: r.name.clone(),
                    target: reference.clone(),
                })
                .collect(),
            artifacts: self.artifacts.clone(),
        }
    }
}

/// Run every stage; the first failing stage decides the error.
pub fn plan(
    draft: &ApplicationDraft,
    taken_names: &BTreeSet<String>,
    known: &KnownApplications,
    type_map: &TypeMap,
) -> Result<Plan, GenerateError> {
    let definition = validate(draft, taken_names)?;
    tracing::debug!(application = %definition.name, models = definition.models.len(), "definition validated");
    let resolved = resolve(definition, known)?;
    let order = graph::order(&resolved)?;
    let artifacts = emit(&resolved, &order, type_map)?;
    tracing::info!(
        application = %resolved.application(),
        models = order.models.len(),
        deferred_soft_edges = order.deferred_soft_edges.len(),
        artifacts = artifacts.len(),
        "generation planned"
    );
    Ok(Plan {
        resolved,
        order,
        artifacts,
    })
}
