//! Smoke tests: each model instantiates and its options match the definition.

use super::model::choice_literal;
use crate::definition::validator::choices_constant;
use super::{module_name, Artifact, ArtifactId, ArtifactKind};
use crate::definition::model::{ModelDefinition, OrderingTerm};
use crate::literal::{py_str, py_str_list};

pub(super) fn test_artifact(app: &str, m: &ModelDefinition) -> Artifact {
    let meta = &m.meta;
    let mut checks = vec![
        format!("        meta = {}._meta", m.name),
        format!("        self.assertEqual(meta.db_table, {})", py_str(&m.table_name(app))),
    ];
    if let Some(v) = &meta.verbose_name {
        checks.push(format!("        self.assertEqual(meta.verbose_name, {})", py_str(v)));
    }
    if let Some(v) = &meta.verbose_name_plural {
        checks.push(format!("        self.assertEqual(meta.verbose_name_plural, {})", py_str(v)));
    }
    let ordering: Vec<String> = meta.ordering.iter().map(OrderingTerm::render).collect();
    checks.push(format!("        self.assertEqual(list(meta.ordering), {})", py_str_list(&ordering)));
    let mut indexes: Vec<&str> = meta.indexes.iter().map(|i| i.name.as_str()).collect();
    indexes.sort_unstable();
    checks.push(format!(
        "        self.assertEqual(sorted(index.name for index in meta.indexes), {})",
        py_str_list(&indexes)
    ));
    let mut constraints: Vec<&str> = meta.constraints.iter().map(|c| c.name.as_str()).collect();
    constraints.sort_unstable();
    checks.push(format!(
        "        self.assertEqual(sorted(constraint.name for constraint in meta.constraints), {})",
        py_str_list(&constraints)
    ));
    for f in m.fields.iter().filter(|f| !f.choices.is_empty()) {
        let pairs: Vec<String> = f
            .choices
            .iter()
            .map(|c| format!("({}, {})", choice_literal(&c.value), py_str(&c.label)))
            .collect();
        checks.push(format!(
            "        self.assertEqual(list({}.{}), [{}])",
            m.name,
            choices_constant(&f.name),
            pairs.join(", ")
        ));
    }

    let content = format!(
        "from django.test import SimpleTestCase\n\nfrom ..models import {name}\n\n\nclass {name}SmokeTest(SimpleTestCase):\n    def test_instantiates(self):\n        instance = {name}()\n        self.assertIsInstance(instance, {name})\n\n    def test_meta_matches_definition(self):\n{checks}\n",
        name = m.name,
        checks = checks.join("\n")
    );
    Artifact::new(
        ArtifactId::model(app, &m.name, ArtifactKind::Test),
        format!("{}/tests/test_{}.py", app, module_name(&m.name)),
        content,
    )
}

pub(super) fn tests_package(app: &str) -> Artifact {
    Artifact::new(ArtifactId::package(app, "tests"), format!("{}/tests/__init__.py", app), String::new())
}
