//! Raw definition types matching the interchange JSON (one object per model with
//! `fields`, `relationships` and `meta`). These are what editors and fixtures exchange;
//! the validator turns them into the typed definitions in `definition::model`.

use crate::definition::options::OptionsSchema;
use serde::{Deserialize, Serialize};

fn is_false(b: &bool) -> bool {
    !*b
}

/// Generation flags carried by an application definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFlags {
    /// Overwrite artifacts that were emitted by a previous run.
    #[serde(default)]
    pub overwrite: bool,
    /// Skip admin registrations and serializers.
    #[serde(default)]
    pub skip_admin: bool,
    #[serde(default)]
    pub skip_tests: bool,
    #[serde(default)]
    pub skip_urls: bool,
}

/// A candidate application definition as submitted by an editor (tombstones already applied
/// or carried as `deleted` markers on models).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub flags: GenerationFlags,
    #[serde(default)]
    pub models: Vec<ModelSchema>,
}

impl ApplicationDraft {
    /// Build a draft from a bare model list (the `--models-file` fixture shape).
    pub fn from_models(name: impl Into<String>, models: Vec<ModelSchema>) -> Self {
        ApplicationDraft {
            name: name.into(),
            label: None,
            flags: GenerationFlags::default(),
            models,
        }
    }

    /// Models without a delete marker, in declaration order.
    pub fn live_models(&self) -> impl Iterator<Item = &ModelSchema> {
        self.models.iter().filter(|m| !m.deleted)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSchema>,
    #[serde(default, skip_serializing_if = "MetaSchema::is_empty")]
    pub meta: MetaSchema,
    /// Delete marker: the model is dropped from emission; emitted files are left alone.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "OptionsSchema::is_empty")]
    pub options: OptionsSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ChoiceSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_choices: Option<bool>,
    /// Present when a relation type (ForeignKey etc.) is declared among the fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_model: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for ChoiceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChoiceValue::Int(n) => write!(f, "{}", n),
            ChoiceValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// A `(value, label)` choice pair; `[value, label]` arrays and `{value, label}` objects are both read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceSchema {
    Pair(ChoiceValue, String),
    Object { value: ChoiceValue, label: String },
}

impl ChoiceSchema {
    pub fn into_parts(self) -> (ChoiceValue, String) {
        match self {
            ChoiceSchema::Pair(v, l) => (v, l),
            ChoiceSchema::Object { value, label } => (value, label),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub related_model: String,
    #[serde(default, skip_serializing_if = "OptionsSchema::is_empty")]
    pub options: OptionsSchema,
}

/// Ordering is a list of field references; older fixtures store it comma-separated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderingSchema {
    List(Vec<String>),
    Csv(String),
}

impl OrderingSchema {
    pub fn terms(&self) -> Vec<String> {
        match self {
            OrderingSchema::List(v) => v.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            OrderingSchema::Csv(s) => s.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexSchema {
    Fields(Vec<String>),
    Named {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        fields: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name_plural: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering: Option<OrderingSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_together: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<IndexSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<ConstraintSchema>>,
}

impl MetaSchema {
    pub fn is_empty(&self) -> bool {
        *self == MetaSchema::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fixture_shaped_model() {
        let json = r#"[{
            "name": "Order",
            "fields": [
                {"name": "status", "type": "CharField", "options": "max_length=20",
                 "choices": [["draft", "Draft"], ["sent", "Sent"]]},
                {"name": "customer", "type": "ForeignKey", "related_model": "sales.Customer",
                 "options": "on_delete=models.CASCADE"}
            ],
            "relationships": [
                {"name": "tags", "type": "ManyToManyField", "related_model": "sales.Tag", "options": "blank=True"}
            ],
            "meta": {"ordering": "-id,status", "indexes": [["status"], {"name": "ix", "fields": ["status"]}]}
        }]"#;
        let models: Vec<ModelSchema> = serde_json::from_str(json).unwrap();
        assert_eq!(models.len(), 1);
        let order = &models[0];
        assert_eq!(order.fields.len(), 2);
        assert_eq!(order.fields[1].related_model.as_deref(), Some("sales.Customer"));
        let ordering = order.meta.ordering.as_ref().unwrap().terms();
        assert_eq!(ordering, vec!["-id".to_string(), "status".to_string()]);
        let indexes = order.meta.indexes.as_ref().unwrap();
        assert!(matches!(indexes[0], IndexSchema::Fields(_)));
        assert!(matches!(indexes[1], IndexSchema::Named { .. }));
        assert!(!order.deleted);
    }

    #[test]
    fn choices_accept_integers_and_objects() {
        let json = r#"[[1, "Low"], {"value": "hi", "label": "High"}]"#;
        let choices: Vec<ChoiceSchema> = serde_json::from_str(json).unwrap();
        let parts: Vec<_> = choices.into_iter().map(ChoiceSchema::into_parts).collect();
        assert_eq!(parts[0].0, ChoiceValue::Int(1));
        assert_eq!(parts[1].0, ChoiceValue::Text("hi".into()));
    }

    #[test]
    fn empty_meta_and_false_markers_are_not_serialized() {
        let m = ModelSchema {
            name: "Tag".into(),
            fields: vec![],
            relationships: vec![],
            meta: MetaSchema::default(),
            deleted: false,
        };
        let v = serde_json::to_value(&m).unwrap();
        assert!(v.get("meta").is_none());
        assert!(v.get("deleted").is_none());
    }
}
