//! Definition validation and normalization.
//!
//! Every check runs; problems are collected rather than returned at the first one, so an
//! editor can show all of them at once. On success the draft is turned into a typed
//! [`ApplicationDefinition`] with options canonicalized, defaults coerced to the field's
//! value kind, unnamed indexes named and bare relationship targets qualified.

use crate::case::{is_identifier, is_reserved_word, normalize_app_name, to_pascal_case};
use crate::definition::model::*;
use crate::definition::options::{unquote, OptionValue, RawOptions};
use crate::definition::types::*;
use crate::error::{ValidationError, ValidationErrors};
use crate::resolve::BUILTIN_APPLICATIONS;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

/// Table names owned by the target framework itself.
pub const RESERVED_TABLES: &[&str] = &["auth_user", "django_migrations", "django_admin_log"];

/// Member names that would shadow the implicit identity.
const IDENTITY_MEMBERS: &[&str] = &[IDENTITY_FIELD, "pk"];

/// Member names that would shadow the generated model's class API.
pub const RESERVED_MEMBERS: &[&str] = &[
    "Meta",
    "objects",
    "DoesNotExist",
    "MultipleObjectsReturned",
    "_meta",
    "_state",
    "save",
    "delete",
    "clean",
    "full_clean",
    "clean_fields",
    "check",
    "validate_unique",
    "validate_constraints",
    "unique_error_message",
    "date_error_message",
    "prepare_database_save",
    "natural_key",
    "get_absolute_url",
    "get_deferred_fields",
    "get_constraints",
    "get_indexes",
    "refresh_from_db",
    "serializable_value",
];

/// Maximum length of an index name accepted by the target framework.
pub const MAX_INDEX_NAME: usize = 30;

fn lookup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(__[A-Za-z0-9_]+)*$").expect("static lookup pattern"))
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static number pattern"))
}

struct Collector {
    errors: Vec<ValidationError>,
}

impl Collector {
    fn push(&mut self, entity: &str, field: &str, reason: impl Into<String>) {
        self.errors.push(ValidationError::new(entity, field, reason));
    }
}

/// Validate a draft against the names of all other stored applications.
pub fn validate(
    draft: &ApplicationDraft,
    taken_names: &BTreeSet<String>,
) -> Result<ApplicationDefinition, ValidationErrors> {
    let mut c = Collector { errors: Vec::new() };
    let app = normalize_app_name(&draft.name);
    let app_entity = if app.is_empty() { draft.name.trim().to_string() } else { app.clone() };

    if app.is_empty() {
        c.push(&app_entity, "name", "application name is required");
    } else if !is_identifier(&app) || is_reserved_word(&app) {
        c.push(&app_entity, "name", format!("'{}' is not a valid application name", app));
    } else if BUILTIN_APPLICATIONS.contains(&app.as_str()) {
        c.push(&app_entity, "name", format!("'{}' is reserved by the framework", app));
    } else if taken_names.contains(&app) {
        c.push(&app_entity, "name", format!("application '{}' already exists", app));
    }

    let label = draft
        .label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| draft.name.trim())
        .to_string();

    let mut model_names: HashSet<&str> = HashSet::new();
    for m in draft.live_models() {
        let entity = format!("{}.{}", app_entity, m.name);
        if !is_identifier(&m.name) || is_reserved_word(&m.name) {
            c.push(&entity, "name", format!("'{}' is not a valid model name", m.name));
        } else if !model_names.insert(m.name.as_str()) {
            c.push(&entity, "name", format!("duplicate model '{}'", m.name));
        }
    }

    let mut models = Vec::new();
    for m in draft.live_models() {
        models.push(validate_model(&mut c, &app_entity, &app, m));
    }

    check_application_wide(&mut c, &app_entity, &app, &models);

    if c.errors.is_empty() {
        tracing::debug!(application = %app, models = models.len(), "definition validated");
        Ok(ApplicationDefinition {
            name: app,
            label,
            flags: draft.flags,
            models,
        })
    } else {
        Err(ValidationErrors(c.errors))
    }
}

/// Table names unique in the application, join tables included; join class names must not
/// shadow a model.
fn check_application_wide(c: &mut Collector, app_entity: &str, app: &str, models: &[ModelDefinition]) {
    let mut tables: HashMap<String, String> = HashMap::new();
    let names: HashSet<&str> = models.iter().map(|m| m.name.as_str()).collect();
    for m in models {
        let entity = format!("{}.{}", app_entity, m.name);
        let table = m.table_name(app);
        match tables.get(&table) {
            Some(other) if *other != m.name => {
                c.push(&entity, "db_table", format!("table '{}' is already used by {}", table, other))
            }
            Some(_) => {}
            None => {
                tables.insert(table, m.name.clone());
            }
        }
    }
    for m in models {
        let entity = format!("{}.{}", app_entity, m.name);
        for r in m.relationships.iter().filter(|r| r.kind == RelationKind::ManyToMany) {
            let member = format!("{}.{}", entity, r.name);
            let join = join_class_name(&m.name, &r.name);
            if names.contains(join.as_str()) {
                c.push(&member, "name", format!("join model '{}' would shadow an existing model", join));
            }
            let table = join_table_name(&m.table_name(app), &r.name);
            match tables.get(&table) {
                Some(other) => c.push(
                    &member,
                    "name",
                    format!("join table '{}' is already used by {}", table, other),
                ),
                None => {
                    tables.insert(table, format!("{}.{}", m.name, r.name));
                }
            }
        }
    }
}

/// Table of the join declaration emitted for a many-to-many relationship.
pub fn join_table_name(owner_table: &str, relation: &str) -> String {
    format!("{}_{}", owner_table, relation)
}

/// Class attribute holding a field's choices in the generated model.
pub fn choices_constant(field: &str) -> String {
    format!("{}_CHOICES", field.to_uppercase())
}

/// Class name of the join declaration emitted for a many-to-many relationship.
pub fn join_class_name(model: &str, relation: &str) -> String {
    format!("{}{}", model, to_pascal_case(relation))
}

fn validate_model(c: &mut Collector, app_entity: &str, app: &str, m: &ModelSchema) -> ModelDefinition {
    let entity = format!("{}.{}", app_entity, m.name);
    let mut seen: HashSet<String> = HashSet::new();
    let mut fields = Vec::new();
    let mut relation_schemas: Vec<RelationshipSchema> = Vec::new();

    for f in &m.fields {
        let is_relation = RelationKind::parse(&f.type_).is_some();
        if is_relation || f.related_model.is_some() {
            if !is_relation {
                c.push(
                    &format!("{}.{}", entity, f.name),
                    "related_model",
                    format!("related_model given for non-relation type '{}'", f.type_),
                );
                continue;
            }
            relation_schemas.push(RelationshipSchema {
                name: f.name.clone(),
                type_: f.type_.clone(),
                related_model: f.related_model.clone().unwrap_or_default(),
                options: f.options.clone(),
            });
            continue;
        }
        check_member_name(c, &entity, &f.name, &mut seen);
        if let Some(field) = validate_field(c, &entity, f) {
            fields.push(field);
        }
    }
    relation_schemas.extend(m.relationships.iter().cloned());

    let mut relationships = Vec::new();
    for r in &relation_schemas {
        check_member_name(c, &entity, &r.name, &mut seen);
        if let Some(rel) = validate_relationship(c, &entity, app, r) {
            relationships.push(rel);
        }
    }

    let mut constants: HashSet<String> = HashSet::new();
    for f in fields.iter().filter(|f| !f.choices.is_empty()) {
        let constant = choices_constant(&f.name);
        if seen.contains(&constant) || !constants.insert(constant.clone()) {
            c.push(
                &format!("{}.{}", entity, f.name),
                "choices",
                format!("choices constant '{}' collides with another member", constant),
            );
        }
    }

    let meta = validate_meta(c, &entity, &m.name, &m.meta, &seen);

    ModelDefinition {
        name: m.name.clone(),
        fields,
        relationships,
        meta,
    }
}

fn check_member_name(c: &mut Collector, entity: &str, name: &str, seen: &mut HashSet<String>) {
    let member = format!("{}.{}", entity, name);
    if !is_identifier(name) || is_reserved_word(name) {
        c.push(&member, "name", format!("'{}' is not a valid identifier", name));
    } else if name.contains("__") {
        c.push(&member, "name", "names must not contain '__'");
    } else if name.ends_with('_') {
        c.push(&member, "name", "names must not end with an underscore");
    } else if IDENTITY_MEMBERS.contains(&name) {
        c.push(&member, "name", format!("'{}' is reserved for the identity field", name));
    } else if RESERVED_MEMBERS.contains(&name) {
        c.push(&member, "name", format!("'{}' would shadow the model API", name));
    }
    if !seen.insert(name.to_string()) {
        c.push(&member, "name", format!("'{}' is declared more than once (fields and relationships share names)", name));
    }
}

fn parse_options(c: &mut Collector, entity: &str, options: &crate::definition::options::OptionsSchema, allowed: &[&str], owner: &str) -> Option<RawOptions> {
    let raw = match options.parse() {
        Ok(raw) => raw,
        Err(e) => {
            c.push(entity, "options", e);
            return None;
        }
    };
    let mut keys: HashSet<&str> = HashSet::new();
    for key in raw.keys() {
        if !allowed.contains(&key) {
            c.push(entity, key, format!("option '{}' is not supported for {}", key, owner));
        }
        if !keys.insert(key) {
            c.push(entity, key, format!("option '{}' given more than once", key));
        }
    }
    Some(raw)
}

fn bool_option(c: &mut Collector, entity: &str, raw: &RawOptions, key: &str, default: bool) -> bool {
    match raw.get(key) {
        None => default,
        Some(v) => v.as_bool().unwrap_or_else(|| {
            c.push(entity, key, "expected True or False");
            default
        }),
    }
}

fn u32_option(c: &mut Collector, entity: &str, raw: &RawOptions, key: &str) -> Option<u32> {
    let v = raw.get(key)?;
    match v.as_u32() {
        Some(n) if n > 0 => Some(n),
        _ => {
            c.push(entity, key, "expected a positive integer");
            None
        }
    }
}

fn text_option(c: &mut Collector, entity: &str, raw: &RawOptions, key: &str) -> Option<String> {
    let v = raw.get(key)?;
    match v.as_text() {
        Some(s) => Some(s),
        None => {
            c.push(entity, key, "expected text");
            None
        }
    }
}

fn validate_field(c: &mut Collector, model_entity: &str, f: &FieldSchema) -> Option<FieldDefinition> {
    let entity = format!("{}.{}", model_entity, f.name);
    let Some(tag) = FieldTypeTag::parse(&f.type_) else {
        c.push(&entity, "type", format!("unknown field type '{}'", f.type_));
        return None;
    };
    let mut allowed: Vec<&str> = COMMON_FIELD_OPTIONS.to_vec();
    allowed.extend_from_slice(tag.specific_options());
    let raw = parse_options(c, &entity, &f.options, &allowed, tag.as_str())?;

    for key in tag.mandatory_options() {
        if raw.get(key).is_none() {
            c.push(&entity, key, format!("{} requires '{}'", tag, key));
        }
    }

    let max_length = u32_option(c, &entity, &raw, "max_length");
    let auto = AutoTimestamp {
        auto_now: bool_option(c, &entity, &raw, "auto_now", false),
        auto_now_add: bool_option(c, &entity, &raw, "auto_now_add", false),
    };
    if auto.auto_now && auto.auto_now_add {
        c.push(&entity, "auto_now", "auto_now and auto_now_add are mutually exclusive");
    }
    let field_type = match tag {
        FieldTypeTag::Char => FieldType::Char {
            max_length: max_length.unwrap_or(0),
        },
        FieldTypeTag::Text => FieldType::Text,
        FieldTypeTag::Email => FieldType::Email { max_length },
        FieldTypeTag::Url => FieldType::Url { max_length },
        FieldTypeTag::Slug => FieldType::Slug {
            max_length,
            allow_unicode: bool_option(c, &entity, &raw, "allow_unicode", false),
        },
        FieldTypeTag::Integer => FieldType::Integer,
        FieldTypeTag::BigInteger => FieldType::BigInteger,
        FieldTypeTag::SmallInteger => FieldType::SmallInteger,
        FieldTypeTag::PositiveInteger => FieldType::PositiveInteger,
        FieldTypeTag::PositiveSmallInteger => FieldType::PositiveSmallInteger,
        FieldTypeTag::Float => FieldType::Float,
        FieldTypeTag::Decimal => {
            let max_digits = u32_option(c, &entity, &raw, "max_digits").unwrap_or(0);
            let decimal_places = match raw.get("decimal_places") {
                None => 0,
                Some(v) => v.as_u32().unwrap_or_else(|| {
                    c.push(&entity, "decimal_places", "expected a non-negative integer");
                    0
                }),
            };
            if max_digits > 0 && decimal_places > max_digits {
                c.push(&entity, "decimal_places", "decimal_places must not exceed max_digits");
            }
            FieldType::Decimal {
                max_digits,
                decimal_places,
            }
        }
        FieldTypeTag::Boolean => FieldType::Boolean,
        FieldTypeTag::Date => FieldType::Date(auto),
        FieldTypeTag::DateTime => FieldType::DateTime(auto),
        FieldTypeTag::Time => FieldType::Time(auto),
        FieldTypeTag::Duration => FieldType::Duration,
        FieldTypeTag::Json => FieldType::Json,
        FieldTypeTag::Uuid => FieldType::Uuid,
        FieldTypeTag::Binary => FieldType::Binary,
        FieldTypeTag::IpAddress => FieldType::IpAddress,
    };

    let mut options = FieldOptions {
        null: bool_option(c, &entity, &raw, "null", false),
        blank: bool_option(c, &entity, &raw, "blank", false),
        unique: bool_option(c, &entity, &raw, "unique", false),
        editable: bool_option(c, &entity, &raw, "editable", true),
        db_index: bool_option(c, &entity, &raw, "db_index", false),
        default: None,
        help_text: text_option(c, &entity, &raw, "help_text"),
        verbose_name: text_option(c, &entity, &raw, "verbose_name"),
    };
    if let Some(v) = raw.get("default") {
        match coerce_default(v, &field_type) {
            Ok(d) => options.default = Some(d),
            Err(reason) => c.push(&entity, "default", reason),
        }
    }

    let choices = validate_choices(c, &entity, f, &field_type, options.default.as_ref());

    Some(FieldDefinition {
        name: f.name.clone(),
        field_type,
        options,
        choices,
    })
}

fn validate_choices(
    c: &mut Collector,
    entity: &str,
    f: &FieldSchema,
    field_type: &FieldType,
    default: Option<&DefaultValue>,
) -> Vec<Choice> {
    let given: Vec<(ChoiceValue, String)> = f
        .choices
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(ChoiceSchema::into_parts)
        .collect();
    let flagged = f.has_choices.unwrap_or(!given.is_empty());
    if !flagged {
        if !given.is_empty() {
            c.push(entity, "choices", "choices given but has_choices is false");
        }
        return Vec::new();
    }
    if given.is_empty() {
        c.push(entity, "choices", "has_choices is set but no choices are given");
        return Vec::new();
    }

    let integer = matches!(field_type.tag().value_kind(), ValueKind::Integer { .. });
    let mut seen: HashSet<&ChoiceValue> = HashSet::new();
    for (value, label) in &given {
        match value {
            ChoiceValue::Int(_) if !integer => {
                c.push(entity, "choices", format!("choice {} must be text for {}", value, field_type.tag()))
            }
            ChoiceValue::Text(t) if integer => {
                c.push(entity, "choices", format!("choice '{}' must be an integer for {}", t, field_type.tag()))
            }
            ChoiceValue::Text(t) => {
                if let Some(max) = field_type.max_length() {
                    if t.chars().count() > max as usize {
                        c.push(entity, "choices", format!("choice '{}' is longer than max_length {}", t, max));
                    }
                }
            }
            ChoiceValue::Int(_) => {}
        }
        if label.trim().is_empty() {
            c.push(entity, "choices", format!("choice {} has an empty label", value));
        }
        if !seen.insert(value) {
            c.push(entity, "choices", format!("duplicate choice value {}", value));
        }
    }

    if let Some(d) = default {
        let in_choices = match d {
            DefaultValue::Integer(n) => seen.contains(&ChoiceValue::Int(*n)),
            DefaultValue::Text(s) => seen.contains(&ChoiceValue::Text(s.clone())),
            _ => true,
        };
        if !in_choices {
            c.push(entity, "default", "default is not one of the declared choices");
        }
    }

    given
        .into_iter()
        .map(|(value, label)| Choice { value, label })
        .collect()
}

/// Coerce a raw default to the field's value kind.
pub fn coerce_default(v: &OptionValue, field_type: &FieldType) -> Result<DefaultValue, String> {
    let kind = field_type.tag().value_kind();
    let symbol = v.as_symbol().ok_or_else(|| "default must be a scalar literal".to_string());

    if !v.is_quoted() || kind != ValueKind::Text {
        if let Some(factory) = symbol.as_deref().ok().and_then(DefaultFactory::parse) {
            if factory.fits(kind) {
                return Ok(DefaultValue::Factory(factory));
            }
            return Err(format!("{} cannot produce a {} value", factory.as_str(), field_type.tag()));
        }
    }
    if !v.is_quoted() && symbol.as_deref() == Ok("None") {
        return Err("a None default is implied by null=True".into());
    }

    match kind {
        ValueKind::Bool => v
            .as_bool()
            .map(DefaultValue::Bool)
            .ok_or_else(|| "expected True or False".into()),
        ValueKind::Integer { unsigned } => {
            let n: i64 = match v {
                OptionValue::Json(serde_json::Value::Number(n)) => n.as_i64(),
                _ => symbol.as_deref().ok().and_then(|s| s.trim().parse().ok()),
            }
            .ok_or_else(|| "expected an integer".to_string())?;
            if unsigned && n < 0 {
                return Err("expected a non-negative integer".into());
            }
            Ok(DefaultValue::Integer(n))
        }
        ValueKind::Number => {
            let s = symbol?.trim().to_string();
            if !number_re().is_match(&s) {
                return Err(format!("'{}' is not a number", s));
            }
            if let FieldType::Decimal { max_digits, decimal_places } = field_type {
                let unsigned = s.trim_start_matches('-');
                let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
                let whole_digits = whole.trim_start_matches('0').len() as u32;
                if frac.len() as u32 > *decimal_places {
                    return Err(format!("'{}' has more than {} decimal places", s, decimal_places));
                }
                if whole_digits > max_digits.saturating_sub(*decimal_places) {
                    return Err(format!("'{}' does not fit max_digits {}", s, max_digits));
                }
            }
            Ok(DefaultValue::Number(s))
        }
        ValueKind::Text => {
            let s = v.as_text().ok_or_else(|| "expected text".to_string())?;
            if let Some(max) = field_type.max_length() {
                if s.chars().count() > max as usize {
                    return Err(format!("default is longer than max_length {}", max));
                }
            }
            Ok(DefaultValue::Text(s))
        }
        ValueKind::Date => {
            let s = symbol?.trim().to_string();
            chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| format!("'{}' is not an ISO date", s))?;
            Ok(DefaultValue::Temporal(s))
        }
        ValueKind::DateTime => {
            let s = symbol?.trim().to_string();
            let ok = chrono::DateTime::parse_from_rfc3339(&s).is_ok()
                || chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                || chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f").is_ok();
            if !ok {
                return Err(format!("'{}' is not an ISO datetime", s));
            }
            Ok(DefaultValue::Temporal(s))
        }
        ValueKind::Time => {
            let s = symbol?.trim().to_string();
            let ok = chrono::NaiveTime::parse_from_str(&s, "%H:%M:%S%.f").is_ok()
                || chrono::NaiveTime::parse_from_str(&s, "%H:%M").is_ok();
            if !ok {
                return Err(format!("'{}' is not an ISO time", s));
            }
            Ok(DefaultValue::Temporal(s))
        }
        ValueKind::Uuid => {
            let s = symbol?;
            let u = uuid::Uuid::parse_str(s.trim()).map_err(|_| format!("'{}' is not a UUID", s))?;
            Ok(DefaultValue::Uuid(u.to_string()))
        }
        ValueKind::Json => match v {
            OptionValue::Json(value) => Ok(DefaultValue::Json(value.clone())),
            OptionValue::Literal(_) if v.is_quoted() => {
                Ok(DefaultValue::Json(serde_json::Value::String(v.as_text().unwrap_or_default())))
            }
            OptionValue::Literal(s) => serde_json::from_str(s)
                .map(DefaultValue::Json)
                .map_err(|_| format!("'{}' is not a JSON literal", s)),
        },
        ValueKind::Opaque => Err(format!("defaults are not supported for {}", field_type.tag())),
    }
}

/// Qualify a relationship target: `Model` becomes `app.Model`.
pub fn parse_target(raw: &str, app: &str) -> Result<TargetRef, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("related_model is required".into());
    }
    let parts: Vec<&str> = raw.split('.').collect();
    let (application, model) = match parts.as_slice() {
        [model] => (app, *model),
        [application, model] => (*application, *model),
        _ => return Err(format!("target '{}' must be 'app.Model' or 'Model'", raw)),
    };
    if !is_identifier(application) || !is_identifier(model) {
        return Err(format!("target '{}' must be 'app.Model' or 'Model'", raw));
    }
    Ok(TargetRef {
        application: application.to_string(),
        model: model.to_string(),
    })
}

fn validate_relationship(
    c: &mut Collector,
    model_entity: &str,
    app: &str,
    r: &RelationshipSchema,
) -> Option<RelationshipDefinition> {
    let entity = format!("{}.{}", model_entity, r.name);
    let Some(kind) = RelationKind::parse(&r.type_) else {
        c.push(&entity, "type", format!("unknown relationship type '{}'", r.type_));
        return None;
    };
    let target = match parse_target(&r.related_model, app) {
        Ok(t) => Some(t),
        Err(reason) => {
            c.push(&entity, "related_model", reason);
            None
        }
    };
    let raw = parse_options(c, &entity, &r.options, kind.option_keys(), kind.as_str())?;

    let mut on_delete = match raw.get("on_delete") {
        None => None,
        Some(v) => match v.as_symbol().as_deref().and_then(OnDelete::parse) {
            Some(od) => Some(od),
            None => {
                c.push(&entity, "on_delete", "expected one of CASCADE, SET_NULL, PROTECT, DO_NOTHING");
                None
            }
        },
    };
    let mut null = bool_option(c, &entity, &raw, "null", false);
    let blank = bool_option(c, &entity, &raw, "blank", false);

    match kind {
        RelationKind::ManyToMany => {
            if on_delete.take().is_some() {
                tracing::warn!(relation = %entity, "on_delete has no effect on a many-to-many relationship; dropped");
            }
            if null {
                tracing::warn!(relation = %entity, "null has no effect on a many-to-many relationship; dropped");
                null = false;
            }
        }
        RelationKind::ForeignKey | RelationKind::OneToOne => {
            if raw.get("on_delete").is_none() {
                c.push(&entity, "on_delete", format!("{} requires on_delete", kind));
            }
            if on_delete == Some(OnDelete::SetNull) && !null {
                c.push(&entity, "on_delete", "SET_NULL requires null=True");
            }
        }
    }

    let mut reverse_name = |key: &str| -> Option<String> {
        let name = text_option(c, &entity, &raw, key)?;
        let base = name.strip_suffix('+').unwrap_or(&name);
        if !(base.is_empty() || is_identifier(base)) || base.contains("__") {
            c.push(&entity, key, format!("'{}' is not a valid reverse name", name));
        }
        Some(name)
    };
    let related_name = reverse_name("related_name");
    let related_query_name = reverse_name("related_query_name");
    let db_constraint = match raw.get("db_constraint") {
        None => None,
        Some(v) => match v.as_bool() {
            Some(b) => Some(b),
            None => {
                c.push(&entity, "db_constraint", "expected True or False");
                None
            }
        },
    };

    Some(RelationshipDefinition {
        name: r.name.clone(),
        kind,
        target: target?,
        on_delete,
        null,
        blank,
        related_name,
        related_query_name,
        db_constraint,
    })
}

/// Name given to an index declared without one: `<model>_<fields>_idx`, capped at [`MAX_INDEX_NAME`].
pub fn default_index_name(model: &str, fields: &[String]) -> String {
    let cols: Vec<&str> = fields.iter().map(|f| f.trim_start_matches('-')).collect();
    let base = format!("{}_{}", model.to_lowercase(), cols.join("_"));
    let keep = MAX_INDEX_NAME - "_idx".len();
    let base: String = base.chars().take(keep).collect();
    format!("{}_idx", base.trim_end_matches('_'))
}

fn check_members(c: &mut Collector, entity: &str, key: &str, names: &[String], members: &HashSet<String>) {
    if names.is_empty() {
        c.push(entity, key, "at least one field is required");
    }
    for n in names {
        let bare = n.trim_start_matches('-');
        let head = bare.split("__").next().unwrap_or(bare);
        if !(head == IDENTITY_FIELD || head == "pk" || members.contains(head)) {
            c.push(entity, key, format!("'{}' does not name a field", n));
        }
    }
}

fn validate_meta(
    c: &mut Collector,
    entity: &str,
    model: &str,
    meta: &MetaSchema,
    members: &HashSet<String>,
) -> ModelMeta {
    let mut out = ModelMeta {
        verbose_name: meta.verbose_name.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from),
        verbose_name_plural: meta
            .verbose_name_plural
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        ..ModelMeta::default()
    };

    if let Some(table) = meta.db_table.as_deref().map(str::trim) {
        if table.is_empty() || !is_identifier(table) {
            c.push(entity, "db_table", format!("'{}' is not a valid table name", table));
        } else if RESERVED_TABLES.contains(&table) {
            c.push(entity, "db_table", format!("'{}' is reserved by the framework", table));
        } else {
            out.db_table = Some(table.to_string());
        }
    }

    if let Some(ordering) = &meta.ordering {
        let terms = ordering.terms();
        check_members(c, entity, "ordering", &terms, members);
        out.ordering = terms
            .iter()
            .map(|t| OrderingTerm {
                field: t.trim_start_matches('-').to_string(),
                descending: t.starts_with('-'),
            })
            .collect();
    }

    for group in meta.unique_together.iter().flatten() {
        let group: Vec<String> = group.iter().map(|s| s.trim().to_string()).collect();
        check_members(c, entity, "unique_together", &group, members);
        out.unique_together.push(group);
    }

    let mut names: HashSet<String> = HashSet::new();
    for idx in meta.indexes.iter().flatten() {
        let (name, fields) = match idx {
            IndexSchema::Fields(fields) => (None, fields.clone()),
            IndexSchema::Named { name, fields } => (name.clone(), fields.clone()),
        };
        check_members(c, entity, "indexes", &fields, members);
        let name = match name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(n) => {
                if !is_identifier(&n) || n.starts_with('_') || n.len() > MAX_INDEX_NAME {
                    c.push(
                        entity,
                        "indexes",
                        format!("index name '{}' must be an identifier of at most {} characters", n, MAX_INDEX_NAME),
                    );
                }
                n
            }
            None => default_index_name(model, &fields),
        };
        if !names.insert(name.clone()) {
            c.push(entity, "indexes", format!("duplicate index or constraint name '{}'", name));
        }
        out.indexes.push(IndexDefinition { name, fields });
    }

    for con in meta.constraints.iter().flatten() {
        let name = con.name.trim().to_string();
        if !is_identifier(&name) {
            c.push(entity, "constraints", format!("'{}' is not a valid constraint name", con.name));
        }
        if !names.insert(name.clone()) {
            c.push(entity, "constraints", format!("duplicate index or constraint name '{}'", name));
        }
        let kind = match (&con.check, &con.unique) {
            (Some(expr), None) => match parse_check(expr, members) {
                Ok(terms) => ConstraintKind::Check(terms),
                Err(reason) => {
                    c.push(entity, "constraints", format!("{}: {}", name, reason));
                    continue;
                }
            },
            (None, Some(fields)) => {
                check_members(c, entity, "constraints", fields, members);
                ConstraintKind::Unique(fields.clone())
            }
            _ => {
                c.push(entity, "constraints", format!("{}: exactly one of check or unique is required", name));
                continue;
            }
        };
        out.constraints.push(ConstraintDefinition { name, kind });
    }

    out
}

/// Exactly one literal: a number, `True`, `False`, `None` or one quoted string.
fn check_value(raw: &str) -> Option<CheckValue> {
    let raw = raw.trim();
    if number_re().is_match(raw) {
        return Some(CheckValue::Number(raw.to_string()));
    }
    match raw {
        "True" => Some(CheckValue::Bool(true)),
        "False" => Some(CheckValue::Bool(false)),
        "None" => Some(CheckValue::None),
        _ => unquote(raw).map(CheckValue::Text),
    }
}

/// Parse `lookup=value[,lookup=value]` into check terms.
pub fn parse_check(expr: &str, members: &HashSet<String>) -> Result<Vec<CheckTerm>, String> {
    let raw = crate::definition::options::parse_options_str(expr)?;
    if raw.0.is_empty() {
        return Err("check expression is empty".into());
    }
    let mut terms = Vec::new();
    for (lookup, value) in raw.0 {
        if !lookup_re().is_match(&lookup) {
            return Err(format!("'{}' is not a field lookup", lookup));
        }
        let head = lookup.split("__").next().unwrap_or(&lookup);
        if !(head == IDENTITY_FIELD || members.contains(head)) {
            return Err(format!("'{}' does not name a field", head));
        }
        let OptionValue::Literal(value) = value else {
            return Err(format!("'{}' has no literal value", lookup));
        };
        let value = check_value(&value).ok_or_else(|| format!("'{}' is not a literal value", value))?;
        terms.push(CheckTerm { lookup, value });
    }
    Ok(terms)
}
