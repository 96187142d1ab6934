//! Admin registrations and serializers, with their aggregating packages.

use super::{module_name, Artifact, ArtifactId, ArtifactKind, EmitContext};
use crate::definition::model::{ModelDefinition, RelationKind, IDENTITY_FIELD};
use crate::error::UnsupportedTypeError;
use crate::literal::py_str_list;

/// Concrete columns shown in list views: identity, fields, single-valued relations.
pub(super) fn display_columns(m: &ModelDefinition) -> Vec<String> {
    let mut cols = vec![IDENTITY_FIELD.to_string()];
    cols.extend(m.fields.iter().map(|f| f.name.clone()));
    cols.extend(
        m.relationships
            .iter()
            .filter(|r| r.kind != RelationKind::ManyToMany)
            .map(|r| r.name.clone()),
    );
    cols
}

/// Every member a serializer exposes.
pub(super) fn serializer_fields(m: &ModelDefinition) -> Vec<String> {
    let mut cols = vec![IDENTITY_FIELD.to_string()];
    cols.extend(m.fields.iter().map(|f| f.name.clone()));
    cols.extend(m.relationships.iter().map(|r| r.name.clone()));
    cols
}

pub(super) fn admin_artifact(ctx: &EmitContext<'_>, m: &ModelDefinition) -> Result<Artifact, UnsupportedTypeError> {
    let app = ctx.app();
    let mut search = Vec::new();
    let mut filter = Vec::new();
    for f in &m.fields {
        let target = ctx.type_map.get(f.tag()).ok_or_else(|| UnsupportedTypeError {
            application: app.to_string(),
            model: m.name.clone(),
            field: f.name.clone(),
            type_tag: f.tag(),
        })?;
        if target.searchable {
            search.push(f.name.clone());
        }
        if target.filterable || !f.choices.is_empty() {
            filter.push(f.name.clone());
        }
    }
    let mut lines = vec![format!("    list_display = {}", py_str_list(&display_columns(m)))];
    if !search.is_empty() {
        lines.push(format!("    search_fields = {}", py_str_list(&search)));
    }
    if !filter.is_empty() {
        lines.push(format!("    list_filter = {}", py_str_list(&filter)));
    }
    let content = format!(
        "from django.contrib import admin\n\nfrom ..models import {name}\n\n\n@admin.register({name})\nclass {name}Admin(admin.ModelAdmin):\n{body}\n",
        name = m.name,
        body = lines.join("\n")
    );
    Ok(Artifact::new(
        ArtifactId::model(app, &m.name, ArtifactKind::Admin),
        format!("{}/admin/{}.py", app, module_name(&m.name)),
        content,
    ))
}

/// Serializer class source, shared with viewsets emitted without the serializers package.
pub(super) fn serializer_class(m: &ModelDefinition) -> String {
    format!(
        "class {name}Serializer(serializers.ModelSerializer):\n    class Meta:\n        model = {name}\n        fields = {fields}\n",
        name = m.name,
        fields = py_str_list(&serializer_fields(m))
    )
}

pub(super) fn serializer_artifact(app: &str, m: &ModelDefinition) -> Artifact {
    let content = format!(
        "from rest_framework import serializers\n\nfrom ..models import {}\n\n\n{}",
        m.name,
        serializer_class(m)
    );
    Artifact::new(
        ArtifactId::model(app, &m.name, ArtifactKind::Serializer),
        format!("{}/serializers/{}.py", app, module_name(&m.name)),
        content,
    )
}

fn package(ctx: &EmitContext<'_>, module: &str, suffix: &str) -> Artifact {
    let app = ctx.app();
    let lines: Vec<String> = ctx
        .ordered_models()
        .iter()
        .map(|(m, _)| format!("from .{} import {}{}", module_name(&m.name), m.name, suffix))
        .collect();
    let content = if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    };
    Artifact::new(ArtifactId::package(app, module), format!("{}/{}/__init__.py", app, module), content)
}

/// Importing each admin module registers its model.
pub(super) fn admin_package(ctx: &EmitContext<'_>) -> Artifact {
    package(ctx, "admin", "Admin")
}

pub(super) fn serializers_package(ctx: &EmitContext<'_>) -> Artifact {
    package(ctx, "serializers", "Serializer")
}
