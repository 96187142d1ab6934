//! Nested editing model: Application → Models → {Fields, Relationships}.
//!
//! Each level is a [`RowList`]: rows keep the index they were given when added, removal only
//! sets a tombstone, and the per-list counter keeps growing. Tombstoned rows are dropped once,
//! at [`ApplicationEditor::submit`], before the result goes to validation.

use crate::definition::types::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("no row with index {0}")]
    NoSuchRow(usize),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row<T> {
    pub index: usize,
    pub value: T,
    #[serde(default)]
    pub deleted: bool,
}

/// Ordered rows with tombstones and a per-list index counter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowList<T> {
    rows: Vec<Row<T>>,
    next_index: usize,
}

impl<T> Default for RowList<T> {
    fn default() -> Self {
        RowList {
            rows: Vec::new(),
            next_index: 0,
        }
    }
}

impl<T> RowList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; returns its index, which never changes afterwards.
    pub fn add(&mut self, value: T) -> usize {
        let index = self.next_index;
        self.rows.push(Row {
            index,
            value,
            deleted: false,
        });
        self.next_index += 1;
        index
    }

    /// Mark a row for deletion. Idempotent.
    pub fn remove(&mut self, index: usize) -> Result<(), EditError> {
        self.row_mut(index)?.deleted = true;
        Ok(())
    }

    pub fn restore(&mut self, index: usize) -> Result<(), EditError> {
        self.row_mut(index)?.deleted = false;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.iter().find(|r| r.index == index).map(|r| &r.value)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.rows.iter_mut().find(|r| r.index == index).map(|r| &mut r.value)
    }

    pub fn rows(&self) -> &[Row<T>] {
        &self.rows
    }

    /// Index the next `add` will assign.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn live(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().filter(|r| !r.deleted).map(|r| &r.value)
    }

    /// Values of rows not marked for deletion, in row order.
    pub fn submit(self) -> Vec<T> {
        self.rows.into_iter().filter(|r| !r.deleted).map(|r| r.value).collect()
    }

    fn row_mut(&mut self, index: usize) -> Result<&mut Row<T>, EditError> {
        self.rows
            .iter_mut()
            .find(|r| r.index == index)
            .ok_or(EditError::NoSuchRow(index))
    }
}

impl<T> FromIterator<T> for RowList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = RowList::new();
        for value in iter {
            list.add(value);
        }
        list
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelEditor {
    pub name: String,
    #[serde(default)]
    pub meta: MetaSchema,
    #[serde(default)]
    pub fields: RowList<FieldSchema>,
    #[serde(default)]
    pub relationships: RowList<RelationshipSchema>,
}

impl ModelEditor {
    pub fn new(name: impl Into<String>) -> Self {
        ModelEditor {
            name: name.into(),
            meta: MetaSchema::default(),
            fields: RowList::new(),
            relationships: RowList::new(),
        }
    }

    fn into_schema(self) -> ModelSchema {
        ModelSchema {
            name: self.name,
            fields: self.fields.submit(),
            relationships: self.relationships.submit(),
            meta: self.meta,
            deleted: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEditor {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub flags: GenerationFlags,
    #[serde(default)]
    pub models: RowList<ModelEditor>,
}

impl ApplicationEditor {
    pub fn new(name: impl Into<String>) -> Self {
        ApplicationEditor {
            name: name.into(),
            label: None,
            flags: GenerationFlags::default(),
            models: RowList::new(),
        }
    }

    /// Open a stored draft for editing; models carrying a delete marker start tombstoned.
    pub fn from_draft(draft: ApplicationDraft) -> Self {
        let mut models = RowList::new();
        for m in draft.models {
            let deleted = m.deleted;
            let index = models.add(ModelEditor {
                name: m.name,
                meta: m.meta,
                fields: m.fields.into_iter().collect(),
                relationships: m.relationships.into_iter().collect(),
            });
            if deleted {
                // index was just assigned
                let _ = models.remove(index);
            }
        }
        ApplicationEditor {
            name: draft.name,
            label: draft.label,
            flags: draft.flags,
            models,
        }
    }

    pub fn model_mut(&mut self, index: usize) -> Result<&mut ModelEditor, EditError> {
        self.models.get_mut(index).ok_or(EditError::NoSuchRow(index))
    }

    /// Drop tombstoned rows at every level.
    pub fn submit(self) -> ApplicationDraft {
        ApplicationDraft {
            name: self.name,
            label: self.label,
            flags: self.flags,
            models: self.models.submit().into_iter().map(ModelEditor::into_schema).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::options::OptionsSchema;

    fn field(name: &str) -> FieldSchema {
        FieldSchema {
            name: name.into(),
            type_: "TextField".into(),
            options: OptionsSchema::default(),
            choices: None,
            has_choices: None,
            related_model: None,
        }
    }

    #[test]
    fn add_assigns_sequential_indices_without_renumbering() {
        let mut list: RowList<&str> = RowList::new();
        assert_eq!(list.add("a"), 0);
        assert_eq!(list.add("b"), 1);
        assert_eq!(list.add("c"), 2);
        list.remove(0).unwrap();
        list.remove(1).unwrap();
        assert_eq!(list.add("d"), 3);
        let indices: Vec<usize> = list.rows().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(list.get(2), Some(&"c"));
        assert_eq!(list.submit(), vec!["c", "d"]);
    }

    #[test]
    fn restore_clears_tombstone() {
        let mut list: RowList<u8> = [1, 2].into_iter().collect();
        list.remove(1).unwrap();
        assert_eq!(list.live().count(), 1);
        list.restore(1).unwrap();
        assert_eq!(list.submit(), vec![1, 2]);
    }

    #[test]
    fn unknown_index_is_an_error() {
        let mut list: RowList<u8> = RowList::new();
        assert_eq!(list.remove(4), Err(EditError::NoSuchRow(4)));
    }

    #[test]
    fn counters_are_scoped_to_the_parent_list() {
        let mut app = ApplicationEditor::new("library");
        let book = app.models.add(ModelEditor::new("Book"));
        let author = app.models.add(ModelEditor::new("Author"));
        assert_eq!(app.model_mut(book).unwrap().fields.add(field("title")), 0);
        assert_eq!(app.model_mut(book).unwrap().fields.add(field("isbn")), 1);
        assert_eq!(app.model_mut(author).unwrap().fields.add(field("name")), 0);
    }

    #[test]
    fn submit_drops_tombstones_at_every_level() {
        let mut app = ApplicationEditor::new("library");
        let book = app.models.add(ModelEditor::new("Book"));
        let draft_model = app.models.add(ModelEditor::new("Draft"));
        {
            let m = app.model_mut(book).unwrap();
            m.fields.add(field("title"));
            let gone = m.fields.add(field("obsolete"));
            m.fields.add(field("summary"));
            m.fields.remove(gone).unwrap();
        }
        app.models.remove(draft_model).unwrap();
        let draft = app.submit();
        assert_eq!(draft.models.len(), 1);
        let names: Vec<&str> = draft.models[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["title", "summary"]);
    }

    #[test]
    fn delete_markers_from_a_stored_draft_become_tombstones() {
        let mut draft = ApplicationDraft::from_models(
            "library",
            vec![
                ModelSchema {
                    name: "Book".into(),
                    fields: vec![field("title")],
                    relationships: vec![],
                    meta: MetaSchema::default(),
                    deleted: false,
                },
                ModelSchema {
                    name: "Old".into(),
                    fields: vec![],
                    relationships: vec![],
                    meta: MetaSchema::default(),
                    deleted: true,
                },
            ],
        );
        draft.label = Some("Library".into());
        let mut editor = ApplicationEditor::from_draft(draft);
        assert!(editor.models.rows()[1].deleted);
        assert_eq!(editor.models.next_index(), 2);
        editor.models.restore(1).unwrap();
        let out = editor.submit();
        assert_eq!(out.models.len(), 2);
        assert!(out.models.iter().all(|m| !m.deleted));
    }
}
