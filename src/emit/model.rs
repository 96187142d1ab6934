//! Model declarations, many-to-many join declarations, the `models` package and `apps.py`.

use super::{import_block, module_name, Artifact, ArtifactId, ArtifactKind, EmitContext};
use crate::case::to_pascal_case;
use crate::definition::model::*;
use crate::definition::types::ChoiceValue;
use crate::definition::validator::{choices_constant, join_class_name, join_table_name};
use crate::error::UnsupportedTypeError;
use crate::literal::{py_bool, py_str, py_str_list, py_str_tuple};
use crate::resolve::Reference;

const MODELS_IMPORT: &str = "from django.db import models";

pub(super) fn choice_literal(value: &ChoiceValue) -> String {
    match value {
        ChoiceValue::Int(n) => n.to_string(),
        ChoiceValue::Text(s) => py_str(s),
    }
}

/// Field names of a join declaration: `(source, target)`.
pub(super) fn join_fields(model: &str, target: &str) -> (String, String) {
    let source = module_name(model);
    let target = module_name(target);
    if source == target {
        (format!("from_{}", source), format!("to_{}", target))
    } else {
        (source, target)
    }
}

fn field_args(f: &FieldDefinition) -> Vec<String> {
    let mut args: Vec<String> = f
        .field_type
        .option_pairs()
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    if !f.choices.is_empty() {
        args.push(format!("choices={}", choices_constant(&f.name)));
    }
    let o = &f.options;
    for (key, on) in [("null", o.null), ("blank", o.blank), ("unique", o.unique), ("db_index", o.db_index)] {
        if on {
            args.push(format!("{}={}", key, py_bool(true)));
        }
    }
    if !o.editable {
        args.push(format!("editable={}", py_bool(false)));
    }
    if let Some(d) = &o.default {
        args.push(format!("default={}", d.python()));
    }
    if let Some(h) = &o.help_text {
        args.push(format!("help_text={}", py_str(h)));
    }
    if let Some(v) = &o.verbose_name {
        args.push(format!("verbose_name={}", py_str(v)));
    }
    args
}

/// Target expression for a relationship: a class for hard same-batch references, `'self'`
/// for self references, a lazy `'app.Model'` string otherwise.
fn relation_target(app: &str, owner: &str, rel: &RelationshipDefinition, reference: &Reference, local: &mut Vec<String>) -> String {
    match reference {
        Reference::Resolved { application, model } if application == app => {
            if model == owner {
                py_str("self")
            } else if rel.is_hard() {
                local.push(format!("from .{} import {}", module_name(model), model));
                model.clone()
            } else {
                py_str(&format!("{}.{}", application, model))
            }
        }
        Reference::Resolved { application, model } => py_str(&format!("{}.{}", application, model)),
        Reference::Deferred { raw } => py_str(raw),
    }
}

fn relation_args(app: &str, owner: &str, r: &RelationshipDefinition, reference: &Reference, local: &mut Vec<String>) -> Vec<String> {
    let mut args = vec![relation_target(app, owner, r, reference, local)];
    if r.kind == RelationKind::ManyToMany {
        args.push(format!("through={}", py_str(&format!("{}.{}", app, join_class_name(owner, &r.name)))));
        let (source, target) = join_fields(owner, &r.target.model);
        if source.starts_with("from_") {
            args.push(format!("through_fields={}", py_str_tuple(&[source, target])));
        }
    }
    if let Some(od) = r.on_delete {
        args.push(format!("on_delete=models.{}", od.as_str()));
    }
    if r.null {
        args.push(format!("null={}", py_bool(true)));
    }
    if r.blank {
        args.push(format!("blank={}", py_bool(true)));
    }
    if let Some(n) = &r.related_name {
        args.push(format!("related_name={}", py_str(n)));
    }
    if let Some(n) = &r.related_query_name {
        args.push(format!("related_query_name={}", py_str(n)));
    }
    if let (Some(c), false) = (r.db_constraint, r.kind == RelationKind::ManyToMany) {
        args.push(format!("db_constraint={}", py_bool(c)));
    }
    args
}

fn meta_lines(app: &str, m: &ModelDefinition) -> Vec<String> {
    let meta = &m.meta;
    let mut lines = vec![format!("        db_table = {}", py_str(&m.table_name(app)))];
    if let Some(v) = &meta.verbose_name {
        lines.push(format!("        verbose_name = {}", py_str(v)));
    }
    if let Some(v) = &meta.verbose_name_plural {
        lines.push(format!("        verbose_name_plural = {}", py_str(v)));
    }
    if !meta.ordering.is_empty() {
        let terms: Vec<String> = meta.ordering.iter().map(OrderingTerm::render).collect();
        lines.push(format!("        ordering = {}", py_str_list(&terms)));
    }
    if !meta.unique_together.is_empty() {
        let groups: Vec<String> = meta.unique_together.iter().map(|g| py_str_list(g)).collect();
        lines.push(format!("        unique_together = [{}]", groups.join(", ")));
    }
    if !meta.indexes.is_empty() {
        lines.push("        indexes = [".to_string());
        for idx in &meta.indexes {
            lines.push(format!(
                "            models.Index(fields={}, name={}),",
                py_str_list(&idx.fields),
                py_str(&idx.name)
            ));
        }
        lines.push("        ]".to_string());
    }
    if !meta.constraints.is_empty() {
        lines.push("        constraints = [".to_string());
        for c in &meta.constraints {
            let line = match &c.kind {
                ConstraintKind::Check(terms) => {
                    let q: Vec<String> = terms.iter().map(|t| format!("{}={}", t.lookup, t.value)).collect();
                    format!(
                        "            models.CheckConstraint(check=models.Q({}), name={}),",
                        q.join(", "),
                        py_str(&c.name)
                    )
                }
                ConstraintKind::Unique(fields) => format!(
                    "            models.UniqueConstraint(fields={}, name={}),",
                    py_str_list(fields),
                    py_str(&c.name)
                ),
            };
            lines.push(line);
        }
        lines.push("        ]".to_string());
    }
    lines
}

pub(super) fn model_artifact(
    ctx: &EmitContext<'_>,
    m: &ModelDefinition,
    refs: &[Reference],
) -> Result<Artifact, UnsupportedTypeError> {
    let app = ctx.app();
    let mut stdlib: Vec<String> = Vec::new();
    let mut framework: Vec<String> = vec![MODELS_IMPORT.to_string()];
    let mut local: Vec<String> = Vec::new();
    let mut body: Vec<String> = Vec::new();

    for f in m.fields.iter().filter(|f| !f.choices.is_empty()) {
        body.push(format!("    {} = [", choices_constant(&f.name)));
        for c in &f.choices {
            body.push(format!("        ({}, {}),", choice_literal(&c.value), py_str(&c.label)));
        }
        body.push("    ]".to_string());
        body.push(String::new());
    }

    body.push(format!("    {} = models.BigAutoField(primary_key=True)", IDENTITY_FIELD));
    for f in &m.fields {
        let target = ctx.type_map.get(f.tag()).ok_or_else(|| UnsupportedTypeError {
            application: app.to_string(),
            model: m.name.clone(),
            field: f.name.clone(),
            type_tag: f.tag(),
        })?;
        if let Some(DefaultValue::Factory(factory)) = &f.options.default {
            if let Some(import) = factory.import() {
                if import.starts_with("from django") {
                    framework.push(import.to_string());
                } else {
                    stdlib.push(import.to_string());
                }
            }
        }
        body.push(format!("    {} = models.{}({})", f.name, target.class, field_args(f).join(", ")));
    }
    for (r, reference) in m.relationships.iter().zip(refs) {
        let args = relation_args(app, &m.name, r, reference, &mut local);
        body.push(format!("    {} = models.{}({})", r.name, r.kind.as_str(), args.join(", ")));
    }

    let display = m
        .fields
        .iter()
        .find(|f| matches!(f.tag(), FieldTypeTag::Char | FieldTypeTag::Slug | FieldTypeTag::Email))
        .map(|f| f.name.as_str())
        .unwrap_or("pk");

    let content = format!(
        "{}\n\n\nclass {}(models.Model):\n{}\n\n    class Meta:\n{}\n\n    def __str__(self):\n        return str(self.{})\n",
        import_block(&[stdlib, framework, local]),
        m.name,
        body.join("\n"),
        meta_lines(app, m).join("\n"),
        display
    );
    Ok(Artifact::new(
        ArtifactId::model(app, &m.name, ArtifactKind::Model),
        format!("{}/models/{}.py", app, module_name(&m.name)),
        content,
    ))
}

pub(super) fn join_module(owner: &str, relation: &str) -> String {
    format!("{}_{}", module_name(owner), relation)
}

pub(super) fn join_artifact(app: &str, owner: &ModelDefinition, r: &RelationshipDefinition, reference: &Reference) -> Artifact {
    let class = join_class_name(&owner.name, &r.name);
    let (source, target) = join_fields(&owner.name, &r.target.model);
    let target_ref = match reference {
        Reference::Resolved { application, model } => format!("{}.{}", application, model),
        Reference::Deferred { raw } => raw.clone(),
    };
    let constraint = match r.db_constraint {
        Some(false) => format!(", db_constraint={}", py_bool(false)),
        _ => String::new(),
    };
    let content = format!(
        "{}\n\n\nclass {}(models.Model):\n    {} = models.ForeignKey({}, on_delete=models.CASCADE, related_name='+'{})\n    {} = models.ForeignKey({}, on_delete=models.CASCADE, related_name='+'{})\n\n    class Meta:\n        db_table = {}\n        unique_together = [{}]\n",
        MODELS_IMPORT,
        class,
        source,
        py_str(&format!("{}.{}", app, owner.name)),
        constraint,
        target,
        py_str(&target_ref),
        constraint,
        py_str(&join_table_name(&owner.table_name(app), &r.name)),
        py_str_list(&[source.as_str(), target.as_str()])
    );
    Artifact::new(
        ArtifactId::model(app, &owner.name, ArtifactKind::Join(r.name.clone())),
        format!("{}/models/{}.py", app, join_module(&owner.name, &r.name)),
        content,
    )
}

/// `models/__init__.py`: imports in emission order, joins last.
pub(super) fn models_package(ctx: &EmitContext<'_>) -> Artifact {
    let app = ctx.app();
    let mut imports = Vec::new();
    let mut names = Vec::new();
    for (m, _) in ctx.ordered_models() {
        imports.push(format!("from .{} import {}", module_name(&m.name), m.name));
        names.push(m.name.clone());
    }
    for (m, r, _) in ctx.many_to_many() {
        let class = join_class_name(&m.name, &r.name);
        imports.push(format!("from .{} import {}", join_module(&m.name, &r.name), class));
        names.push(class);
    }
    let all = if names.is_empty() {
        "__all__ = []\n".to_string()
    } else {
        let items: Vec<String> = names.iter().map(|n| format!("    {},", py_str(n))).collect();
        format!("__all__ = [\n{}\n]\n", items.join("\n"))
    };
    let content = if imports.is_empty() {
        all
    } else {
        format!("{}\n\n{}", imports.join("\n"), all)
    };
    Artifact::new(ArtifactId::package(app, "models"), format!("{}/models/__init__.py", app), content)
}

pub(super) fn app_config(def: &ApplicationDefinition) -> Artifact {
    let content = format!(
        "from django.apps import AppConfig\n\n\nclass {}Config(AppConfig):\n    default_auto_field = 'django.db.models.BigAutoField'\n    name = {}\n    verbose_name = {}\n",
        to_pascal_case(&def.name),
        py_str(&def.name),
        py_str(&def.label)
    );
    Artifact::new(ArtifactId::package(&def.name, "apps"), format!("{}/apps.py", def.name), content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_joins_get_directional_field_names() {
        assert_eq!(join_fields("Person", "Person"), ("from_person".to_string(), "to_person".to_string()));
        assert_eq!(join_fields("Order", "Tag"), ("order".to_string(), "tag".to_string()));
    }

    #[test]
    fn field_arguments_follow_a_fixed_order() {
        let f = FieldDefinition {
            name: "price".into(),
            field_type: FieldType::Decimal { max_digits: 8, decimal_places: 2 },
            options: FieldOptions {
                null: true,
                default: Some(DefaultValue::Number("0.00".into())),
                help_text: Some("Unit price".into()),
                ..FieldOptions::default()
            },
            choices: vec![],
        };
        assert_eq!(
            field_args(&f).join(", "),
            "max_digits=8, decimal_places=2, null=True, default=0.00, help_text='Unit price'"
        );
    }

    #[test]
    fn json_defaults_render_as_native_literals() {
        let f = FieldDefinition {
            name: "settings".into(),
            field_type: FieldType::Json,
            options: FieldOptions {
                default: Some(DefaultValue::Json(serde_json::json!({"dark": true}))),
                ..FieldOptions::default()
            },
            choices: vec![],
        };
        assert_eq!(field_args(&f), vec!["default={'dark': True}".to_string()]);
    }
}
