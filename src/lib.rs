//! appgen SDK: application definitions in, dependency-ordered source artifacts out.
//!
//! Pipeline: [`definition::validate`] → [`resolve::resolve`] → [`graph::order`] →
//! [`emit::emit`] → [`regen::apply`]. [`service::GenerationService`] runs it against a
//! catalog persisted through [`store::Persistence`]; [`routes::router`] exposes it over HTTP.

pub mod case;
pub mod catalog;
pub mod definition;
pub mod emit;
pub mod error;
pub mod graph;
pub mod handlers;
pub mod literal;
pub mod regen;
pub mod resolve;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sink;
pub mod state;
pub mod store;

pub use catalog::{Catalog, CatalogState, StoredApplication};
pub use definition::{validate, ApplicationDefinition, ApplicationDraft, ApplicationEditor, GenerationFlags, ModelSchema};
pub use emit::{emit, Artifact, ArtifactId, ArtifactKind, TypeMap};
pub use error::{AppError, CycleError, GenerateError, UnknownTargetErrors, UnsupportedTypeError, ValidationErrors, WriteFailure};
pub use graph::{order, EmissionOrder};
pub use regen::{apply, ArtifactIndex, WriteOutcome, WriteReport};
pub use resolve::{resolve, KnownApplications, Reference, ResolvedDefinition};
pub use routes::{application_routes, common_routes, router};
pub use service::{plan, GenerationService, Plan, PlanSummary};
pub use settings::Settings;
pub use sink::{ArtifactSink, FsSink, MemorySink};
pub use state::AppState;
pub use store::{ensure_database_exists, FileStore, Persistence, PgStore, StoreError};
