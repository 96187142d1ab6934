//! Viewsets and the router module.

use super::admin::serializer_class;
use super::{module_name, Artifact, ArtifactId, ArtifactKind, EmitContext};
use crate::definition::model::ModelDefinition;

/// Route prefix registered for a model.
pub(super) fn route_prefix(model: &str) -> String {
    model.to_lowercase()
}

/// With `inline_serializer` the serializer class is declared in the view module itself,
/// since the serializers package is not generated.
pub(super) fn viewset_artifact(app: &str, m: &ModelDefinition, inline_serializer: bool) -> Artifact {
    let (imports, serializer) = if inline_serializer {
        (
            format!(
                "from rest_framework import serializers, viewsets\n\nfrom ..models import {}",
                m.name
            ),
            format!("{}\n\n", serializer_class(m)),
        )
    } else {
        (
            format!(
                "from rest_framework import viewsets\n\nfrom ..models import {name}\nfrom ..serializers import {name}Serializer",
                name = m.name
            ),
            String::new(),
        )
    };
    let content = format!(
        "{imports}\n\n\n{serializer}class {name}ViewSet(viewsets.ModelViewSet):\n    queryset = {name}.objects.all()\n    serializer_class = {name}Serializer\n",
        imports = imports,
        serializer = serializer,
        name = m.name
    );
    Artifact::new(
        ArtifactId::model(app, &m.name, ArtifactKind::Route),
        format!("{}/views/{}.py", app, module_name(&m.name)),
        content,
    )
}

pub(super) fn views_package(ctx: &EmitContext<'_>) -> Artifact {
    let app = ctx.app();
    let lines: Vec<String> = ctx
        .ordered_models()
        .iter()
        .map(|(m, _)| format!("from .{} import {}ViewSet", module_name(&m.name), m.name))
        .collect();
    let content = if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    };
    Artifact::new(ArtifactId::package(app, "views"), format!("{}/views/__init__.py", app), content)
}

pub(super) fn urls_module(ctx: &EmitContext<'_>) -> Artifact {
    let app = ctx.app();
    let models = ctx.ordered_models();
    let mut content = String::from("from django.urls import include, path\nfrom rest_framework.routers import DefaultRouter\n");
    if !models.is_empty() {
        let viewsets: Vec<String> = models.iter().map(|(m, _)| format!("{}ViewSet", m.name)).collect();
        content.push_str(&format!("\nfrom .views import {}\n", viewsets.join(", ")));
    }
    content.push_str("\nrouter = DefaultRouter()\n");
    for (m, _) in &models {
        content.push_str(&format!("router.register(r'{}', {}ViewSet)\n", route_prefix(&m.name), m.name));
    }
    content.push_str("\nurlpatterns = [\n    path('', include(router.urls)),\n]\n");
    Artifact::new(ArtifactId::package(app, "urls"), format!("{}/urls.py", app), content)
}
