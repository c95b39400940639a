//! Incremental view over full snapshots
//!
//! The collection watcher always delivers the whole collection. A presenter
//! that wants to touch only what changed keeps a `PeopleView` and feeds it
//! each snapshot.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::Person;

/// What changed between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewDelta {
    pub added: Vec<Person>,
    pub updated: Vec<Person>,
    /// Names no longer present
    pub removed: Vec<String>,
}

impl ViewDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// The snapshot currently on screen
#[derive(Debug, Default)]
pub struct PeopleView {
    shown: BTreeMap<String, Person>,
}

impl PeopleView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the shown snapshot and report the difference
    pub fn apply(&mut self, snapshot: &[Person]) -> ViewDelta {
        let next: BTreeMap<String, Person> = snapshot
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect();

        let mut delta = ViewDelta::default();
        for (name, person) in &next {
            match self.shown.get(name) {
                None => delta.added.push(person.clone()),
                Some(old) if old != person => delta.updated.push(person.clone()),
                Some(_) => {}
            }
        }
        delta.removed = self
            .shown
            .keys()
            .filter(|name| !next.contains_key(*name))
            .cloned()
            .collect();

        self.shown = next;
        delta
    }

    /// Everyone currently shown, ordered by name
    pub fn people(&self) -> impl Iterator<Item = &Person> {
        self.shown.values()
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_snapshot_is_all_added() {
        let mut view = PeopleView::new();
        let delta = view.apply(&[Person::new("Ana", 41.0), Person::new("Leo", 30.0)]);

        assert_eq!(delta.added.len(), 2);
        assert!(delta.updated.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn test_update_add_remove() {
        let mut view = PeopleView::new();
        view.apply(&[Person::new("Ana", 41.0), Person::new("Leo", 30.0)]);

        let delta = view.apply(&[Person::new("Leo", 31.0), Person::new("Max", 12.0)]);
        assert_eq!(delta.added, vec![Person::new("Max", 12.0)]);
        assert_eq!(delta.updated, vec![Person::new("Leo", 31.0)]);
        assert_eq!(delta.removed, vec!["Ana".to_string()]);

        let names: Vec<&str> = view.people().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Leo", "Max"]);
    }

    #[test]
    fn test_same_snapshot_is_empty_delta() {
        let mut view = PeopleView::new();
        let snapshot = vec![Person::new("Leo", 30.0)];
        view.apply(&snapshot);
        assert!(view.apply(&snapshot).is_empty());
    }

    #[test]
    fn test_empty_snapshot_removes_everyone() {
        let mut view = PeopleView::new();
        view.apply(&[Person::new("Leo", 30.0)]);

        let delta = view.apply(&[]);
        assert_eq!(delta.removed, vec!["Leo".to_string()]);
        assert!(view.is_empty());
    }
}
