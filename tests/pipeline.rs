//! End-to-end pipeline: draft → plan → apply, against memory and filesystem sinks.

use appgen_sdk::{
    apply, plan, ApplicationDraft, ApplicationEditor, ArtifactIndex, FsSink, GenerateError, KnownApplications,
    MemorySink, ModelSchema, TypeMap, WriteOutcome,
};
use std::collections::BTreeSet;

fn draft(name: &str, models: &str) -> ApplicationDraft {
    let models: Vec<ModelSchema> = serde_json::from_str(models).expect("fixture parses");
    ApplicationDraft::from_models(name, models)
}

fn plan_of(d: &ApplicationDraft) -> Result<appgen_sdk::Plan, GenerateError> {
    plan(d, &BTreeSet::new(), &KnownApplications::with_builtins(), &TypeMap::django())
}

const HR: &str = r#"[
    {"name": "Employee", "fields": [
        {"name": "full_name", "type": "CharField", "options": "max_length=120"},
        {"name": "hired", "type": "DateField", "options": "null=True,blank=True"},
        {"name": "level", "type": "IntegerField", "options": "default=1", "choices": [[1, "Junior"], [2, "Senior"]]}
    ], "relationships": [
        {"name": "department", "type": "ForeignKey", "related_model": "Department", "options": "on_delete=models.CASCADE"},
        {"name": "mentor", "type": "ForeignKey", "related_model": "Employee", "options": "on_delete=models.SET_NULL,null=True,blank=True"},
        {"name": "skills", "type": "ManyToManyField", "related_model": "Skill", "options": "blank=True"},
        {"name": "account", "type": "OneToOneField", "related_model": "auth.User", "options": "on_delete=models.PROTECT"}
    ], "meta": {"ordering": ["full_name"], "unique_together": [["full_name", "department"]]}},
    {"name": "Department", "fields": [
        {"name": "name", "type": "CharField", "options": "max_length=80,unique=True"}
    ], "relationships": [
        {"name": "parent", "type": "ForeignKey", "related_model": "Department", "options": "on_delete=models.SET_NULL,null=True,blank=True"}
    ]},
    {"name": "Skill", "fields": [{"name": "label", "type": "SlugField"}]}
]"#;

#[test]
fn scenario_a_required_target_comes_first() {
    let d = draft(
        "shop",
        r#"[
            {"name": "Order", "relationships": [
                {"name": "customer", "type": "ForeignKey", "related_model": "Customer", "options": "on_delete=models.CASCADE"}]},
            {"name": "Customer"}
        ]"#,
    );
    let p = plan_of(&d).unwrap();
    assert_eq!(p.order.models, vec!["Customer", "Order"]);
}

#[test]
fn scenario_b_self_reference_is_ignored_for_ordering() {
    let d = draft(
        "org",
        r#"[{"name": "Department", "relationships": [
            {"name": "parent", "type": "ForeignKey", "related_model": "Department", "options": "on_delete=models.SET_NULL,null=True"}]}]"#,
    );
    let p = plan_of(&d).unwrap();
    assert_eq!(p.order.models, vec!["Department"]);
    let model = p.artifacts.iter().find(|a| a.path == "org/models/department.py").unwrap();
    assert!(model.content.contains("models.ForeignKey('self'"));
}

#[test]
fn scenario_c_cycle_names_both_models_and_emits_nothing() {
    let d = draft(
        "loop",
        r#"[
            {"name": "A", "relationships": [{"name": "b", "type": "ForeignKey", "related_model": "B", "options": "on_delete=models.CASCADE"}]},
            {"name": "B", "relationships": [{"name": "a", "type": "ForeignKey", "related_model": "A", "options": "on_delete=models.CASCADE"}]}
        ]"#,
    );
    match plan_of(&d) {
        Err(GenerateError::Cycle(c)) => assert_eq!(c.models_in_cycle, vec!["A".to_string(), "B".to_string()]),
        Err(other) => panic!("expected a cycle, got {}", other),
        Ok(p) => panic!("expected a cycle, got order {:?}", p.order.models),
    }
}

#[test]
fn scenario_d_unknown_application_is_reported() {
    let d = draft(
        "sales",
        r#"[{"name": "Line", "relationships": [
            {"name": "thing", "type": "ForeignKey", "related_model": "other_app.Thing", "options": "on_delete=models.CASCADE"}]}]"#,
    );
    let Err(GenerateError::UnknownTargets(errors)) = plan_of(&d) else {
        panic!("expected unknown targets");
    };
    assert_eq!(errors.0.len(), 1);
    assert_eq!(errors.0[0].relation, "thing");
    assert_eq!(errors.0[0].target, "other_app.Thing");
}

#[tokio::test]
async fn scenario_e_resubmission_without_overwrite_skips_everything() {
    let p = plan_of(&draft("hr", HR)).unwrap();
    let existing = ArtifactIndex::from_artifacts(&p.artifacts);
    let sink = MemorySink::new();
    let report = apply(&p.artifacts, &existing, false, &sink).await;
    assert_eq!(report.entries.len(), p.artifacts.len());
    assert!(report
        .entries
        .iter()
        .all(|e| matches!(e.outcome, WriteOutcome::Skipped { .. })));
    assert!(sink.paths().is_empty());
}

#[test]
fn soft_only_cycles_still_order() {
    let d = draft(
        "soft",
        r#"[
            {"name": "A", "relationships": [{"name": "b", "type": "ForeignKey", "related_model": "B", "options": "on_delete=models.SET_NULL,null=True"}]},
            {"name": "B", "relationships": [{"name": "c", "type": "ForeignKey", "related_model": "C", "options": "on_delete=models.SET_NULL,null=True"}]},
            {"name": "C", "relationships": [{"name": "a", "type": "ForeignKey", "related_model": "A", "options": "on_delete=models.SET_NULL,null=True"}]}
        ]"#,
    );
    let p = plan_of(&d).unwrap();
    let mut sorted = p.order.models.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["A", "B", "C"]);
    assert!(!p.order.deferred_soft_edges.is_empty());
}

#[test]
fn normalized_definition_round_trips_through_json() {
    let first = plan_of(&draft("hr", HR)).unwrap();
    let json = serde_json::to_string(&first.definition().to_draft()).unwrap();
    let again: ApplicationDraft = serde_json::from_str(&json).unwrap();
    let second = plan_of(&again).unwrap();
    assert_eq!(first.definition(), second.definition());
    assert_eq!(first.artifacts, second.artifacts);
}

#[test]
fn editor_tombstones_drop_before_validation() {
    let mut editor = ApplicationEditor::from_draft(draft("hr", HR));
    let skill = editor
        .models
        .rows()
        .iter()
        .find(|r| r.value.name == "Skill")
        .map(|r| r.index)
        .unwrap();
    let employee = editor
        .models
        .rows()
        .iter()
        .find(|r| r.value.name == "Employee")
        .map(|r| r.index)
        .unwrap();
    editor.models.remove(skill).unwrap();
    let emp = editor.model_mut(employee).unwrap();
    let skills = emp
        .relationships
        .rows()
        .iter()
        .find(|r| r.value.name == "skills")
        .map(|r| r.index)
        .unwrap();
    emp.relationships.remove(skills).unwrap();

    let p = plan_of(&editor.submit()).unwrap();
    assert_eq!(p.order.models, vec!["Department", "Employee"]);
    assert!(!p.artifacts.iter().any(|a| a.path.contains("skill")));
}

#[tokio::test]
async fn overwrite_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let sink = FsSink::new(dir.path());
    let p = plan_of(&draft("hr", HR)).unwrap();

    let first = apply(&p.artifacts, &ArtifactIndex::new(), false, &sink).await;
    assert!(first.entries.iter().all(|e| e.outcome == WriteOutcome::Written));
    let index = first.next_index(&ArtifactIndex::new());
    let before = std::fs::read(dir.path().join("hr/models/employee.py")).unwrap();

    let again = plan_of(&draft("hr", HR)).unwrap();
    let second = apply(&again.artifacts, &index, true, &sink).await;
    assert!(second.entries.iter().all(|e| e.outcome == WriteOutcome::Overwritten));
    let after = std::fs::read(dir.path().join("hr/models/employee.py")).unwrap();
    assert_eq!(before, after);
    assert_eq!(second.next_index(&index), index);
}

#[tokio::test]
async fn write_failure_stops_the_remaining_artifacts() {
    let p = plan_of(&draft("hr", HR)).unwrap();
    let failing = p.artifacts[3].path.clone();
    let sink = MemorySink::failing_on(failing);
    let report = apply(&p.artifacts, &ArtifactIndex::new(), false, &sink).await;
    assert!(report.entries[..3].iter().all(|e| e.outcome == WriteOutcome::Written));
    assert!(matches!(report.entries[3].outcome, WriteOutcome::Failed { .. }));
    assert!(report.entries[4..].iter().all(|e| e.outcome == WriteOutcome::NotAttempted));
}

#[test]
fn employee_model_carries_references_and_meta() {
    let p = plan_of(&draft("hr", HR)).unwrap();
    assert_eq!(p.order.models, vec!["Department", "Employee", "Skill"]);
    let employee = &p.artifacts.iter().find(|a| a.path == "hr/models/employee.py").unwrap().content;
    assert!(employee.contains("from .department import Department"));
    assert!(employee.contains("department = models.ForeignKey(Department, on_delete=models.CASCADE)"));
    assert!(employee.contains("account = models.OneToOneField('auth.User', on_delete=models.PROTECT)"));
    assert!(employee.contains("unique_together = [['full_name', 'department']]"));
    assert!(p.artifacts.iter().any(|a| a.path == "hr/models/employee_skills.py"));
}
