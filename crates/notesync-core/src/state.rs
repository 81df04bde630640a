//! SyncState: the in-memory index of remote notebooks and notes.
//!
//! Rebuilt by every reconciliation pass and mutated by event handlers. Owned
//! by the engine; never shared between tasks.

use crate::model::{normalize_title, Note, Notebook};
use crate::tree;

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct SyncState {
    notebooks: Vec<Notebook>,
    /// Notes keyed by notebook name. A notebook whose listing failed has no
    /// entry here, which is different from having no notes.
    notes: HashMap<String, Vec<Note>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notebooks(&self) -> &[Notebook] {
        &self.notebooks
    }

    pub fn notebook_by_name(&self, name: &str) -> Option<&Notebook> {
        self.notebooks.iter().find(|nb| nb.name == name)
    }

    /// Notes of a notebook, or `None` if they were never loaded.
    pub fn notes_in(&self, notebook: &str) -> Option<&[Note]> {
        self.notes.get(notebook).map(Vec::as_slice)
    }

    /// Add a notebook. `notes` is `None` when its listing is unavailable.
    pub fn insert_notebook(&mut self, notebook: Notebook, notes: Option<Vec<Note>>) {
        if let Some(notes) = notes {
            self.notes.insert(notebook.name.clone(), notes);
        }
        self.notebooks.push(notebook);
    }

    /// Drop a notebook and its notes.
    pub fn remove_notebook(&mut self, name: &str) -> Option<Notebook> {
        let pos = self.notebooks.iter().position(|nb| nb.name == name)?;
        self.notes.remove(name);
        Some(self.notebooks.remove(pos))
    }

    /// Append a note to a notebook with loaded notes.
    pub fn push_note(&mut self, notebook: &str, note: Note) -> bool {
        match self.notes.get_mut(notebook) {
            Some(notes) => {
                notes.push(note);
                true
            }
            None => false,
        }
    }

    /// Replace the note with the same id.
    pub fn replace_note(&mut self, notebook: &str, note: Note) -> bool {
        let Some(notes) = self.notes.get_mut(notebook) else {
            return false;
        };
        match notes.iter_mut().find(|n| n.id == note.id) {
            Some(slot) => {
                *slot = note;
                true
            }
            None => false,
        }
    }

    pub fn remove_note(&mut self, notebook: &str, note_id: &str) -> Option<Note> {
        let notes = self.notes.get_mut(notebook)?;
        let pos = notes.iter().position(|n| n.id == note_id)?;
        Some(notes.remove(pos))
    }

    /// Resolve a local path to the notebook and note it stands for.
    ///
    /// The notebook is the one named like the path's parent directory. The
    /// file name is truncated like a title, then matched exactly against
    /// normalized titles; failing that, the first title it prefixes wins.
    /// Returns `(None, None)` when no notebook matches.
    pub fn resolve_path(&self, path: &str) -> (Option<&Notebook>, Option<&Note>) {
        let Some((parent, name)) = tree::split(path) else {
            return (None, None);
        };
        let Some(notebook) = self.notebook_by_name(parent) else {
            return (None, None);
        };
        let name = normalize_title(name);
        let note = self.notes_in(&notebook.name).and_then(|notes| {
            notes
                .iter()
                .find(|n| n.filename() == name)
                .or_else(|| notes.iter().find(|n| n.filename().starts_with(&name)))
        });
        (Some(notebook), note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notebook(name: &str) -> Notebook {
        Notebook {
            id: format!("nb-{name}"),
            name: name.to_string(),
        }
    }

    fn note(id: &str, title: &str, notebook_id: &str) -> Note {
        Note {
            id: id.to_string(),
            title: title.to_string(),
            notebook_id: notebook_id.to_string(),
            content: String::new(),
            updated_at: 0,
        }
    }

    fn sample() -> SyncState {
        let mut state = SyncState::new();
        state.insert_notebook(
            notebook("Personal"),
            Some(vec![
                note("n1", "Shopping List", "nb-Personal"),
                note("n2", "Travel", "nb-Personal"),
            ]),
        );
        state.insert_notebook(notebook("Work"), Some(Vec::new()));
        state
    }

    #[test]
    fn test_resolve_exact_match() {
        let state = sample();
        let (nb, n) = state.resolve_path("Personal/Shopping List");
        assert_eq!(nb.unwrap().name, "Personal");
        assert_eq!(n.unwrap().id, "n1");
    }

    #[test]
    fn test_resolve_prefix_match() {
        let state = sample();
        let (_, n) = state.resolve_path("Personal/Shop");
        assert_eq!(n.unwrap().id, "n1");
    }

    #[test]
    fn test_resolve_long_title_by_truncated_name() {
        let mut state = sample();
        let long = "L".repeat(130);
        state.push_note("Work", note("n3", &long, "nb-Work"));

        let filename = "L".repeat(100);
        let (_, n) = state.resolve_path(&format!("Work/{filename}"));
        assert_eq!(n.unwrap().id, "n3");
    }

    #[test]
    fn test_resolve_overlong_name_matches_truncated_title() {
        let mut state = sample();
        let long = "L".repeat(130);
        state.push_note("Work", note("n3", &long, "nb-Work"));

        // A file name longer than the title limit still finds its note
        let (_, n) = state.resolve_path(&format!("Work/{}", "L".repeat(120)));
        assert_eq!(n.unwrap().id, "n3");
    }

    #[test]
    fn test_resolve_prefers_exact_title() {
        let mut state = SyncState::new();
        state.insert_notebook(
            notebook("Personal"),
            Some(vec![
                note("n2", "Shopping List 2", "nb-Personal"),
                note("n1", "Shopping List", "nb-Personal"),
            ]),
        );

        let (_, n) = state.resolve_path("Personal/Shopping List");
        assert_eq!(n.unwrap().id, "n1");

        let (_, n) = state.resolve_path("Personal/Shopping List 2");
        assert_eq!(n.unwrap().id, "n2");

        let (_, n) = state.resolve_path("Personal/Shopping");
        assert_eq!(n.unwrap().id, "n2");
    }

    #[test]
    fn test_resolve_notebook_without_note() {
        let state = sample();
        let (nb, n) = state.resolve_path("Work/Ideas");
        assert_eq!(nb.unwrap().name, "Work");
        assert!(n.is_none());
    }

    #[test]
    fn test_resolve_unknown_notebook() {
        let state = sample();
        assert_eq!(state.resolve_path("Archive/Old"), (None, None));
        assert_eq!(state.resolve_path("loose-file"), (None, None));
    }

    #[test]
    fn test_remove_notebook_drops_notes() {
        let mut state = sample();
        let removed = state.remove_notebook("Personal").unwrap();
        assert_eq!(removed.id, "nb-Personal");
        assert!(state.notebook_by_name("Personal").is_none());
        assert!(state.notes_in("Personal").is_none());
        assert!(state.remove_notebook("Personal").is_none());
    }

    #[test]
    fn test_note_mutations() {
        let mut state = sample();
        assert!(state.push_note("Work", note("n3", "Ideas", "nb-Work")));
        assert!(!state.push_note("Archive", note("n4", "x", "nb-Archive")));

        let mut edited = note("n3", "Ideas", "nb-Work");
        edited.updated_at = 42;
        assert!(state.replace_note("Work", edited));
        assert_eq!(state.notes_in("Work").unwrap()[0].updated_at, 42);

        assert_eq!(state.remove_note("Work", "n3").unwrap().id, "n3");
        assert!(state.notes_in("Work").unwrap().is_empty());
        assert!(state.remove_note("Work", "n3").is_none());
    }

    #[test]
    fn test_unloaded_notes_are_distinct_from_empty() {
        let mut state = SyncState::new();
        state.insert_notebook(notebook("Broken"), None);
        assert!(state.notebook_by_name("Broken").is_some());
        assert!(state.notes_in("Broken").is_none());
    }
}
