//! Typed, normalized application definitions produced by validation.
//! Every value here has already been checked; emitters and the resolver rely on that.

use crate::definition::options::OptionsSchema;
use crate::definition::types::*;
use crate::literal::{py_bool, py_str};
use serde::Serialize;

/// Name of the implicit identity field every model receives.
pub const IDENTITY_FIELD: &str = "id";

/// Closed set of scalar field type tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FieldTypeTag {
    Char,
    Text,
    Email,
    Url,
    Slug,
    Integer,
    BigInteger,
    SmallInteger,
    PositiveInteger,
    PositiveSmallInteger,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Duration,
    Json,
    Uuid,
    Binary,
    IpAddress,
}

/// What kind of value a field holds; drives default coercion and choice checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer { unsigned: bool },
    Number,
    Bool,
    Date,
    DateTime,
    Time,
    Uuid,
    Json,
    Opaque,
}

impl FieldTypeTag {
    pub const ALL: [FieldTypeTag; 21] = [
        FieldTypeTag::Char,
        FieldTypeTag::Text,
        FieldTypeTag::Email,
        FieldTypeTag::Url,
        FieldTypeTag::Slug,
        FieldTypeTag::Integer,
        FieldTypeTag::BigInteger,
        FieldTypeTag::SmallInteger,
        FieldTypeTag::PositiveInteger,
        FieldTypeTag::PositiveSmallInteger,
        FieldTypeTag::Float,
        FieldTypeTag::Decimal,
        FieldTypeTag::Boolean,
        FieldTypeTag::Date,
        FieldTypeTag::DateTime,
        FieldTypeTag::Time,
        FieldTypeTag::Duration,
        FieldTypeTag::Json,
        FieldTypeTag::Uuid,
        FieldTypeTag::Binary,
        FieldTypeTag::IpAddress,
    ];

    /// Canonical interchange name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldTypeTag::Char => "CharField",
            FieldTypeTag::Text => "TextField",
            FieldTypeTag::Email => "EmailField",
            FieldTypeTag::Url => "URLField",
            FieldTypeTag::Slug => "SlugField",
            FieldTypeTag::Integer => "IntegerField",
            FieldTypeTag::BigInteger => "BigIntegerField",
            FieldTypeTag::SmallInteger => "SmallIntegerField",
            FieldTypeTag::PositiveInteger => "PositiveIntegerField",
            FieldTypeTag::PositiveSmallInteger => "PositiveSmallIntegerField",
            FieldTypeTag::Float => "FloatField",
            FieldTypeTag::Decimal => "DecimalField",
            FieldTypeTag::Boolean => "BooleanField",
            FieldTypeTag::Date => "DateField",
            FieldTypeTag::DateTime => "DateTimeField",
            FieldTypeTag::Time => "TimeField",
            FieldTypeTag::Duration => "DurationField",
            FieldTypeTag::Json => "JSONField",
            FieldTypeTag::Uuid => "UUIDField",
            FieldTypeTag::Binary => "BinaryField",
            FieldTypeTag::IpAddress => "GenericIPAddressField",
        }
    }

    /// Parse a canonical name, a short tag (`short-text`, `decimal`) or an ERD column type (`varchar`, `jsonb`).
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if let Some(tag) = FieldTypeTag::ALL.iter().find(|t| t.as_str() == trimmed) {
            return Some(*tag);
        }
        let lower = trimmed.to_lowercase().replace([' ', '-'], "_");
        let tag = match lower.as_str() {
            "short_text" | "char" | "varchar" | "character_varying" | "string" | "enum" => FieldTypeTag::Char,
            "long_text" | "text" | "xml" | "tsvector" => FieldTypeTag::Text,
            "email" => FieldTypeTag::Email,
            "url" => FieldTypeTag::Url,
            "slug" => FieldTypeTag::Slug,
            "integer" | "int" | "int4" => FieldTypeTag::Integer,
            "bigint" | "int8" => FieldTypeTag::BigInteger,
            "smallint" | "int2" => FieldTypeTag::SmallInteger,
            "positive_integer" => FieldTypeTag::PositiveInteger,
            "positive_small_integer" => FieldTypeTag::PositiveSmallInteger,
            "float" | "real" | "double_precision" => FieldTypeTag::Float,
            "decimal" | "numeric" | "money" => FieldTypeTag::Decimal,
            "boolean" | "bool" => FieldTypeTag::Boolean,
            "date" => FieldTypeTag::Date,
            "datetime" | "timestamp" | "timestamptz" | "timestamp_with_time_zone"
            | "timestamp_without_time_zone" => FieldTypeTag::DateTime,
            "time" | "time_with_time_zone" | "time_without_time_zone" => FieldTypeTag::Time,
            "duration" | "interval" => FieldTypeTag::Duration,
            "json" | "jsonb" | "array" => FieldTypeTag::Json,
            "uuid" => FieldTypeTag::Uuid,
            "binary" | "bytea" => FieldTypeTag::Binary,
            "ip" | "inet" | "cidr" | "ip_address" => FieldTypeTag::IpAddress,
            _ => return None,
        };
        Some(tag)
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldTypeTag::Char
            | FieldTypeTag::Text
            | FieldTypeTag::Email
            | FieldTypeTag::Url
            | FieldTypeTag::Slug
            | FieldTypeTag::IpAddress => ValueKind::Text,
            FieldTypeTag::Integer | FieldTypeTag::BigInteger | FieldTypeTag::SmallInteger => {
                ValueKind::Integer { unsigned: false }
            }
            FieldTypeTag::PositiveInteger | FieldTypeTag::PositiveSmallInteger => ValueKind::Integer { unsigned: true },
            FieldTypeTag::Float | FieldTypeTag::Decimal => ValueKind::Number,
            FieldTypeTag::Boolean => ValueKind::Bool,
            FieldTypeTag::Date => ValueKind::Date,
            FieldTypeTag::DateTime => ValueKind::DateTime,
            FieldTypeTag::Time => ValueKind::Time,
            FieldTypeTag::Uuid => ValueKind::Uuid,
            FieldTypeTag::Json => ValueKind::Json,
            FieldTypeTag::Duration | FieldTypeTag::Binary => ValueKind::Opaque,
        }
    }

    /// Type-specific option keys, on top of [`COMMON_FIELD_OPTIONS`].
    pub fn specific_options(&self) -> &'static [&'static str] {
        match self {
            FieldTypeTag::Char => &["max_length"],
            FieldTypeTag::Email | FieldTypeTag::Url => &["max_length"],
            FieldTypeTag::Slug => &["max_length", "allow_unicode"],
            FieldTypeTag::Decimal => &["max_digits", "decimal_places"],
            FieldTypeTag::Date | FieldTypeTag::DateTime | FieldTypeTag::Time => &["auto_now", "auto_now_add"],
            _ => &[],
        }
    }

    pub fn mandatory_options(&self) -> &'static [&'static str] {
        match self {
            FieldTypeTag::Char => &["max_length"],
            FieldTypeTag::Decimal => &["max_digits", "decimal_places"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for FieldTypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Option keys accepted by every field type.
pub const COMMON_FIELD_OPTIONS: &[&str] = &[
    "null",
    "blank",
    "unique",
    "editable",
    "db_index",
    "default",
    "help_text",
    "verbose_name",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AutoTimestamp {
    /// Set on every save.
    pub auto_now: bool,
    /// Set on creation only.
    pub auto_now_add: bool,
}

/// A field's type tag together with the parameters that only make sense for that tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "tag")]
pub enum FieldType {
    Char { max_length: u32 },
    Text,
    Email { max_length: Option<u32> },
    Url { max_length: Option<u32> },
    Slug { max_length: Option<u32>, allow_unicode: bool },
    Integer,
    BigInteger,
    SmallInteger,
    PositiveInteger,
    PositiveSmallInteger,
    Float,
    Decimal { max_digits: u32, decimal_places: u32 },
    Boolean,
    Date(AutoTimestamp),
    DateTime(AutoTimestamp),
    Time(AutoTimestamp),
    Duration,
    Json,
    Uuid,
    Binary,
    IpAddress,
}

impl FieldType {
    pub fn tag(&self) -> FieldTypeTag {
        match self {
            FieldType::Char { .. } => FieldTypeTag::Char,
            FieldType::Text => FieldTypeTag::Text,
            FieldType::Email { .. } => FieldTypeTag::Email,
            FieldType::Url { .. } => FieldTypeTag::Url,
            FieldType::Slug { .. } => FieldTypeTag::Slug,
            FieldType::Integer => FieldTypeTag::Integer,
            FieldType::BigInteger => FieldTypeTag::BigInteger,
            FieldType::SmallInteger => FieldTypeTag::SmallInteger,
            FieldType::PositiveInteger => FieldTypeTag::PositiveInteger,
            FieldType::PositiveSmallInteger => FieldTypeTag::PositiveSmallInteger,
            FieldType::Float => FieldTypeTag::Float,
            FieldType::Decimal { .. } => FieldTypeTag::Decimal,
            FieldType::Boolean => FieldTypeTag::Boolean,
            FieldType::Date(_) => FieldTypeTag::Date,
            FieldType::DateTime(_) => FieldTypeTag::DateTime,
            FieldType::Time(_) => FieldTypeTag::Time,
            FieldType::Duration => FieldTypeTag::Duration,
            FieldType::Json => FieldTypeTag::Json,
            FieldType::Uuid => FieldTypeTag::Uuid,
            FieldType::Binary => FieldTypeTag::Binary,
            FieldType::IpAddress => FieldTypeTag::IpAddress,
        }
    }

    pub fn max_length(&self) -> Option<u32> {
        match self {
            FieldType::Char { max_length } => Some(*max_length),
            FieldType::Email { max_length } | FieldType::Url { max_length } | FieldType::Slug { max_length, .. } => {
                *max_length
            }
            _ => None,
        }
    }

    pub fn auto_timestamp(&self) -> Option<AutoTimestamp> {
        match self {
            FieldType::Date(a) | FieldType::DateTime(a) | FieldType::Time(a) => Some(*a),
            _ => None,
        }
    }

    /// Type parameters as (key, literal) pairs, in no particular order.
    pub fn option_pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(n) = self.max_length() {
            out.push(("max_length".to_string(), n.to_string()));
        }
        match self {
            FieldType::Slug { allow_unicode: true, .. } => {
                out.push(("allow_unicode".into(), py_bool(true).into()));
            }
            FieldType::Decimal { max_digits, decimal_places } => {
                out.push(("max_digits".into(), max_digits.to_string()));
                out.push(("decimal_places".into(), decimal_places.to_string()));
            }
            _ => {}
        }
        if let Some(a) = self.auto_timestamp() {
            if a.auto_now {
                out.push(("auto_now".into(), py_bool(true).into()));
            }
            if a.auto_now_add {
                out.push(("auto_now_add".into(), py_bool(true).into()));
            }
        }
        out
    }
}

/// Default-value factories the generator knows how to import.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DefaultFactory {
    Dict,
    List,
    Now,
    Today,
    Uuid4,
}

impl DefaultFactory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "dict" => Some(DefaultFactory::Dict),
            "list" => Some(DefaultFactory::List),
            "timezone.now" => Some(DefaultFactory::Now),
            "date.today" => Some(DefaultFactory::Today),
            "uuid.uuid4" => Some(DefaultFactory::Uuid4),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultFactory::Dict => "dict",
            DefaultFactory::List => "list",
            DefaultFactory::Now => "timezone.now",
            DefaultFactory::Today => "date.today",
            DefaultFactory::Uuid4 => "uuid.uuid4",
        }
    }

    /// Import line the factory needs in generated code, if any.
    pub fn import(&self) -> Option<&'static str> {
        match self {
            DefaultFactory::Dict | DefaultFactory::List => None,
            DefaultFactory::Now => Some("from django.utils import timezone"),
            DefaultFactory::Today => Some("from datetime import date"),
            DefaultFactory::Uuid4 => Some("import uuid"),
        }
    }

    pub fn fits(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (DefaultFactory::Dict | DefaultFactory::List, ValueKind::Json)
                | (DefaultFactory::Now, ValueKind::DateTime | ValueKind::Date)
                | (DefaultFactory::Today, ValueKind::Date)
                | (DefaultFactory::Uuid4, ValueKind::Uuid)
        )
    }
}

/// A default value coerced to the field's value kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum DefaultValue {
    Bool(bool),
    Integer(i64),
    /// Decimal or float, kept exactly as written.
    Number(String),
    Text(String),
    /// ISO-8601 date, datetime or time.
    Temporal(String),
    Uuid(String),
    Json(serde_json::Value),
    Factory(DefaultFactory),
}

impl DefaultValue {
    /// Literal form used in option strings and generated declarations.
    pub fn literal(&self) -> String {
        match self {
            DefaultValue::Bool(b) => py_bool(*b).to_string(),
            DefaultValue::Integer(n) => n.to_string(),
            DefaultValue::Number(s) => s.clone(),
            DefaultValue::Text(s) | DefaultValue::Temporal(s) | DefaultValue::Uuid(s) => py_str(s),
            DefaultValue::Json(v) => v.to_string(),
            DefaultValue::Factory(f) => f.as_str().to_string(),
        }
    }

    /// Expression form in generated source; JSON values become native literals.
    pub fn python(&self) -> String {
        match self {
            DefaultValue::Json(v) => crate::literal::py_json(v),
            other => other.literal(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldOptions {
    pub null: bool,
    pub blank: bool,
    pub unique: bool,
    pub editable: bool,
    pub db_index: bool,
    pub default: Option<DefaultValue>,
    pub help_text: Option<String>,
    pub verbose_name: Option<String>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            null: false,
            blank: false,
            unique: false,
            editable: true,
            db_index: false,
            default: None,
            help_text: None,
            verbose_name: None,
        }
    }
}

impl FieldOptions {
    pub fn option_pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, on) in [
            ("null", self.null),
            ("blank", self.blank),
            ("unique", self.unique),
            ("db_index", self.db_index),
        ] {
            if on {
                out.push((key.to_string(), py_bool(true).to_string()));
            }
        }
        if !self.editable {
            out.push(("editable".into(), py_bool(false).into()));
        }
        if let Some(d) = &self.default {
            out.push(("default".into(), d.literal()));
        }
        if let Some(h) = &self.help_text {
            out.push(("help_text".into(), py_str(h)));
        }
        if let Some(v) = &self.verbose_name {
            out.push(("verbose_name".into(), py_str(v)));
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: ChoiceValue,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub options: FieldOptions,
    /// Ordered; order is meaningful for generated select lists.
    pub choices: Vec<Choice>,
}

impl FieldDefinition {
    pub fn tag(&self) -> FieldTypeTag {
        self.field_type.tag()
    }

    /// All (key, literal) option pairs, sorted by key.
    pub fn canonical_options(&self) -> Vec<(String, String)> {
        let mut pairs = self.field_type.option_pairs();
        pairs.extend(self.options.option_pairs());
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    pub fn to_schema(&self) -> FieldSchema {
        FieldSchema {
            name: self.name.clone(),
            type_: self.tag().as_str().to_string(),
            options: OptionsSchema::canonical(self.canonical_options()),
            choices: if self.choices.is_empty() {
                None
            } else {
                Some(
                    self.choices
                        .iter()
                        .map(|c| ChoiceSchema::Pair(c.value.clone(), c.label.clone()))
                        .collect(),
                )
            },
            has_choices: None,
            related_model: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RelationKind {
    ForeignKey,
    OneToOne,
    ManyToMany,
}

impl RelationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "ForeignKey" | "many-to-one" | "many_to_one" => Some(RelationKind::ForeignKey),
            "OneToOneField" | "one-to-one" | "one_to_one" => Some(RelationKind::OneToOne),
            "ManyToManyField" | "many-to-many" | "many_to_many" => Some(RelationKind::ManyToMany),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::ForeignKey => "ForeignKey",
            RelationKind::OneToOne => "OneToOneField",
            RelationKind::ManyToMany => "ManyToManyField",
        }
    }

    pub fn option_keys(&self) -> &'static [&'static str] {
        match self {
            RelationKind::ForeignKey | RelationKind::OneToOne => &[
                "on_delete",
                "null",
                "blank",
                "related_name",
                "related_query_name",
                "db_constraint",
            ],
            RelationKind::ManyToMany => &[
                "on_delete",
                "null",
                "blank",
                "related_name",
                "related_query_name",
                "db_constraint",
            ],
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OnDelete {
    Cascade,
    SetNull,
    Protect,
    DoNothing,
}

impl OnDelete {
    /// Accepts `models.CASCADE`, `CASCADE`, `cascade`, `set-null` and similar spellings.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix("models.").unwrap_or(s);
        match s.to_uppercase().replace('-', "_").as_str() {
            "CASCADE" => Some(OnDelete::Cascade),
            "SET_NULL" => Some(OnDelete::SetNull),
            "PROTECT" => Some(OnDelete::Protect),
            "DO_NOTHING" => Some(OnDelete::DoNothing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET_NULL",
            OnDelete::Protect => "PROTECT",
            OnDelete::DoNothing => "DO_NOTHING",
        }
    }
}

/// Target of a relationship: `application.Model`. Held by identity, never owned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetRef {
    pub application: String,
    pub model: String,
}

impl TargetRef {
    pub fn raw(&self) -> String {
        format!("{}.{}", self.application, self.model)
    }
}

impl std::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.application, self.model)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelationshipDefinition {
    pub name: String,
    pub kind: RelationKind,
    pub target: TargetRef,
    /// Always set for ForeignKey / OneToOne, always `None` for ManyToMany.
    pub on_delete: Option<OnDelete>,
    pub null: bool,
    pub blank: bool,
    pub related_name: Option<String>,
    pub related_query_name: Option<String>,
    pub db_constraint: Option<bool>,
}

impl RelationshipDefinition {
    /// Required single-valued reference: constrains emission order.
    pub fn is_hard(&self) -> bool {
        self.kind != RelationKind::ManyToMany && !self.null
    }

    pub fn canonical_options(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(od) = self.on_delete {
            out.push(("on_delete".to_string(), format!("models.{}", od.as_str())));
        }
        if self.null {
            out.push(("null".into(), py_bool(true).into()));
        }
        if self.blank {
            out.push(("blank".into(), py_bool(true).into()));
        }
        if let Some(r) = &self.related_name {
            out.push(("related_name".into(), py_str(r)));
        }
        if let Some(r) = &self.related_query_name {
            out.push(("related_query_name".into(), py_str(r)));
        }
        if let Some(c) = self.db_constraint {
            out.push(("db_constraint".into(), py_bool(c).into()));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn to_schema(&self) -> RelationshipSchema {
        RelationshipSchema {
            name: self.name.clone(),
            type_: self.kind.as_str().to_string(),
            related_model: self.target.raw(),
            options: OptionsSchema::canonical(self.canonical_options()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderingTerm {
    pub field: String,
    pub descending: bool,
}

impl OrderingTerm {
    pub fn render(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<String>,
}

/// One `lookup=value` term of a check constraint, e.g. `price__gte=0`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckTerm {
    pub lookup: String,
    pub value: CheckValue,
}

/// Right-hand side of a check term. Always a single literal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CheckValue {
    /// Integer or decimal, kept as written.
    Number(String),
    Bool(bool),
    None,
    Text(String),
}

impl std::fmt::Display for CheckValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckValue::Number(n) => f.write_str(n),
            CheckValue::Bool(b) => f.write_str(py_bool(*b)),
            CheckValue::None => f.write_str("None"),
            CheckValue::Text(s) => f.write_str(&py_str(s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    Check(Vec<CheckTerm>),
    Unique(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConstraintDefinition {
    pub name: String,
    pub kind: ConstraintKind,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModelMeta {
    pub db_table: Option<String>,
    pub verbose_name: Option<String>,
    pub verbose_name_plural: Option<String>,
    pub ordering: Vec<OrderingTerm>,
    pub unique_together: Vec<Vec<String>>,
    pub indexes: Vec<IndexDefinition>,
    pub constraints: Vec<ConstraintDefinition>,
}

impl ModelMeta {
    pub fn to_schema(&self) -> MetaSchema {
        MetaSchema {
            db_table: self.db_table.clone(),
            verbose_name: self.verbose_name.clone(),
            verbose_name_plural: self.verbose_name_plural.clone(),
            ordering: if self.ordering.is_empty() {
                None
            } else {
                Some(OrderingSchema::List(self.ordering.iter().map(OrderingTerm::render).collect()))
            },
            unique_together: if self.unique_together.is_empty() {
                None
            } else {
                Some(self.unique_together.clone())
            },
            indexes: if self.indexes.is_empty() {
                None
            } else {
                Some(
                    self.indexes
                        .iter()
                        .map(|i| IndexSchema::Named {
                            name: Some(i.name.clone()),
                            fields: i.fields.clone(),
                        })
                        .collect(),
                )
            },
            constraints: if self.constraints.is_empty() {
                None
            } else {
                Some(
                    self.constraints
                        .iter()
                        .map(|c| match &c.kind {
                            ConstraintKind::Check(terms) => ConstraintSchema {
                                name: c.name.clone(),
                                check: Some(
                                    terms
                                        .iter()
                                        .map(|t| format!("{}={}", t.lookup, t.value))
                                        .collect::<Vec<_>>()
                                        .join(","),
                                ),
                                unique: None,
                            },
                            ConstraintKind::Unique(fields) => ConstraintSchema {
                                name: c.name.clone(),
                                check: None,
                                unique: Some(fields.clone()),
                            },
                        })
                        .collect(),
                )
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub relationships: Vec<RelationshipDefinition>,
    pub meta: ModelMeta,
}

impl ModelDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDefinition> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// True when `name` is the identity field, a field, or a relationship of this model.
    pub fn has_member(&self, name: &str) -> bool {
        name == IDENTITY_FIELD || self.field(name).is_some() || self.relationship(name).is_some()
    }

    /// Table name: explicit `db_table` or `<application>_<modelname>`.
    pub fn table_name(&self, application: &str) -> String {
        self.meta
            .db_table
            .clone()
            .unwrap_or_else(|| format!("{}_{}", application, self.name.to_lowercase()))
    }

    pub fn to_schema(&self) -> ModelSchema {
        ModelSchema {
            name: self.name.clone(),
            fields: self.fields.iter().map(FieldDefinition::to_schema).collect(),
            relationships: self.relationships.iter().map(RelationshipDefinition::to_schema).collect(),
            meta: self.meta.to_schema(),
            deleted: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApplicationDefinition {
    /// lower_snake_case identity.
    pub name: String,
    pub label: String,
    pub flags: GenerationFlags,
    pub models: Vec<ModelDefinition>,
}

impl ApplicationDefinition {
    pub fn model(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }

    /// Canonical interchange form; validating it again yields an equal definition.
    pub fn to_draft(&self) -> ApplicationDraft {
        ApplicationDraft {
            name: self.name.clone(),
            label: Some(self.label.clone()),
            flags: self.flags,
            models: self.models.iter().map(ModelDefinition::to_schema).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_round_trips_through_its_name() {
        for tag in FieldTypeTag::ALL {
            assert_eq!(FieldTypeTag::parse(tag.as_str()), Some(tag));
        }
    }

    #[test]
    fn erd_aliases_map_to_tags() {
        assert_eq!(FieldTypeTag::parse("varchar"), Some(FieldTypeTag::Char));
        assert_eq!(FieldTypeTag::parse("short-text"), Some(FieldTypeTag::Char));
        assert_eq!(FieldTypeTag::parse("jsonb"), Some(FieldTypeTag::Json));
        assert_eq!(FieldTypeTag::parse("timestamp with time zone"), Some(FieldTypeTag::DateTime));
        assert_eq!(FieldTypeTag::parse("geometry"), None);
    }

    #[test]
    fn on_delete_spellings() {
        assert_eq!(OnDelete::parse("models.CASCADE"), Some(OnDelete::Cascade));
        assert_eq!(OnDelete::parse("set-null"), Some(OnDelete::SetNull));
        assert_eq!(OnDelete::parse("do_nothing"), Some(OnDelete::DoNothing));
        assert_eq!(OnDelete::parse("RESTRICT"), None);
    }

    #[test]
    fn canonical_field_options_are_sorted() {
        let f = FieldDefinition {
            name: "title".into(),
            field_type: FieldType::Char { max_length: 80 },
            options: FieldOptions {
                unique: true,
                default: Some(DefaultValue::Text("untitled".into())),
                ..FieldOptions::default()
            },
            choices: vec![],
        };
        let schema = f.to_schema();
        assert_eq!(
            schema.options,
            OptionsSchema::Text("default='untitled',max_length=80,unique=True".into())
        );
    }

    #[test]
    fn hard_edges_are_required_single_valued() {
        let mut r = RelationshipDefinition {
            name: "customer".into(),
            kind: RelationKind::ForeignKey,
            target: TargetRef { application: "sales".into(), model: "Customer".into() },
            on_delete: Some(OnDelete::Cascade),
            null: false,
            blank: false,
            related_name: None,
            related_query_name: None,
            db_constraint: None,
        };
        assert!(r.is_hard());
        r.null = true;
        assert!(!r.is_hard());
        r.null = false;
        r.kind = RelationKind::ManyToMany;
        assert!(!r.is_hard());
    }
}
