//! Definition store: interchange types, typed definitions, validation and the nested editor.

pub mod editor;
pub mod model;
pub mod options;
pub mod types;
pub mod validator;

pub use editor::{ApplicationEditor, EditError, ModelEditor, Row, RowList};
pub use model::{
    ApplicationDefinition, FieldDefinition, FieldType, FieldTypeTag, ModelDefinition, OnDelete, RelationKind,
    RelationshipDefinition, TargetRef,
};
pub use options::OptionsSchema;
pub use types::{ApplicationDraft, FieldSchema, GenerationFlags, MetaSchema, ModelSchema, RelationshipSchema};
pub use validator::validate;
