//! Per-statement compilation state.
//!
//! Every entry is tagged with the token position at which it was recorded, so
//! that a failed speculative parse can roll the state back together with the
//! token cursor.

use crate::expression::ObjectName;
use crate::range::RangeColumn;

/// A WITH query visible to FROM items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CteScopeEntry {
    /// Query name.
    pub name: String,
    /// Set while the recursive member of the query's own definition is
    /// parsed; references made then are recursive references.
    pub recursive: bool,
    /// Block depth of the owning WITH.
    pub depth: usize,
    /// Columns, known once the seed (or the whole body) is resolved.
    pub columns: Vec<RangeColumn>,
}

#[derive(Debug, Clone)]
struct Tagged<T> {
    position: usize,
    value: T,
}

fn truncate_from<T>(entries: &mut Vec<Tagged<T>>, position: usize) {
    let keep = entries
        .iter()
        .position(|entry| entry.position >= position)
        .unwrap_or(entries.len());
    entries.truncate(keep);
}

/// Mutable state threaded through the parser.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    depth: usize,
    next_range_index: usize,
    in_with: bool,
    parameters: Vec<Tagged<()>>,
    tables: Vec<Tagged<ObjectName>>,
    sequences: Vec<Tagged<ObjectName>>,
    routines: Vec<Tagged<ObjectName>>,
    unresolved: Vec<Tagged<String>>,
    ctes: Vec<Tagged<CteScopeEntry>>,
}

impl CompileContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current query block depth.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Enters a nested query block.
    pub fn enter_block(&mut self) {
        self.depth += 1;
    }

    /// Leaves a nested query block.
    pub fn leave_block(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    /// Allocates a scope slot. Slots are never reused within a statement,
    /// even across rewinds.
    pub fn next_range_index(&mut self) -> usize {
        let index = self.next_range_index;
        self.next_range_index += 1;
        index
    }

    /// Number of slots allocated so far.
    #[must_use]
    pub const fn range_count(&self) -> usize {
        self.next_range_index
    }

    /// Registers a `?` found at `position`; returns its ordinal.
    pub fn add_parameter(&mut self, position: usize) -> usize {
        self.parameters.push(Tagged {
            position,
            value: (),
        });
        self.parameters.len() - 1
    }

    /// Number of parameters registered.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Records a table reference.
    pub fn add_table(&mut self, position: usize, name: ObjectName) {
        self.tables.push(Tagged {
            position,
            value: name,
        });
    }

    /// Records a sequence reference.
    pub fn add_sequence(&mut self, position: usize, name: ObjectName) {
        self.sequences.push(Tagged {
            position,
            value: name,
        });
    }

    /// Records a routine reference.
    pub fn add_routine(&mut self, position: usize, name: ObjectName) {
        self.routines.push(Tagged {
            position,
            value: name,
        });
    }

    /// Records a function or sequence name the catalog does not know.
    pub fn add_unresolved(&mut self, position: usize, name: String) {
        self.unresolved.push(Tagged {
            position,
            value: name,
        });
    }

    /// Unresolved names, in the order they were found.
    pub fn unresolved(&self) -> impl Iterator<Item = &String> {
        self.unresolved.iter().map(|entry| &entry.value)
    }

    /// Referenced tables, sequences and routines, in the order they were found.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectName> {
        self.tables
            .iter()
            .chain(&self.sequences)
            .chain(&self.routines)
            .map(|entry| &entry.value)
    }

    /// Makes a WITH query visible.
    pub fn push_cte(&mut self, position: usize, entry: CteScopeEntry) {
        self.ctes.push(Tagged {
            position,
            value: entry,
        });
    }

    /// Removes the `count` most recently pushed WITH queries.
    pub fn pop_ctes(&mut self, count: usize) {
        let keep = self.ctes.len().saturating_sub(count);
        self.ctes.truncate(keep);
    }

    /// Looks a WITH query up; inner definitions shadow outer ones.
    #[must_use]
    pub fn find_cte(&self, name: &str) -> Option<&CteScopeEntry> {
        self.ctes
            .iter()
            .rev()
            .map(|entry| &entry.value)
            .find(|entry| entry.name == name)
    }

    /// Returns true while a WITH list is being parsed.
    #[must_use]
    pub const fn in_with(&self) -> bool {
        self.in_with
    }

    pub(crate) fn set_in_with(&mut self, in_with: bool) {
        self.in_with = in_with;
    }

    /// Drops everything recorded at or after token `position`.
    pub fn rewind(&mut self, position: usize) {
        truncate_from(&mut self.parameters, position);
        truncate_from(&mut self.tables, position);
        truncate_from(&mut self.sequences, position);
        truncate_from(&mut self.routines, position);
        truncate_from(&mut self.unresolved, position);
        truncate_from(&mut self.ctes, position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewind_drops_later_entries() {
        let mut context = CompileContext::new();
        assert_eq!(context.add_parameter(1), 0);
        assert_eq!(context.add_parameter(5), 1);
        context.add_table(6, ObjectName::new("T"));
        context.rewind(5);
        assert_eq!(context.parameter_count(), 1);
        assert_eq!(context.objects().count(), 0);
        assert_eq!(context.add_parameter(5), 1);
    }

    #[test]
    fn test_range_indexes_survive_rewind() {
        let mut context = CompileContext::new();
        let first = context.next_range_index();
        context.rewind(0);
        assert_ne!(context.next_range_index(), first);
    }

    #[test]
    fn test_cte_shadowing() {
        let mut context = CompileContext::new();
        let entry = |depth| CteScopeEntry {
            name: "Q".into(),
            recursive: false,
            depth,
            columns: Vec::new(),
        };
        context.push_cte(0, entry(0));
        context.push_cte(4, entry(1));
        assert_eq!(context.find_cte("Q").map(|e| e.depth), Some(1));
        context.pop_ctes(1);
        assert_eq!(context.find_cte("Q").map(|e| e.depth), Some(0));
    }

    #[test]
    fn test_block_depth() {
        let mut context = CompileContext::new();
        context.enter_block();
        assert_eq!(context.depth(), 1);
        context.leave_block();
        context.leave_block();
        assert_eq!(context.depth(), 0);
    }
}
