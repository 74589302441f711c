//! Ordered tables with change notifications.
//!
//! Every mutation records an [`Phase::AboutToChange`] signal before touching the rows and a
//! [`Phase::Changed`] signal after it, both with the same kind and index range. Signals are
//! accumulated until [`Table::take_signals`] is called.

use std::ops::RangeInclusive;

/// Row of a [`Table`].
pub trait Row: Clone {
    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// True if two rows describe the same entity (at most one such row in a table).
    fn same_key(&self, other: &Self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AboutToChange,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Remove,
}

/// Change notification.
///
/// `rows` holds:
/// - for inserts: nothing before the change, inserted rows after it
/// - for updates: old rows before the change, new rows after it
/// - for removals: removed rows before the change, nothing after it
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSignal<T> {
    pub phase: Phase,
    pub kind: ChangeKind,
    pub range: RangeInclusive<usize>,
    pub rows: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: Vec<T>,
    signals: Vec<ModelSignal<T>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: vec![],
            signals: vec![],
        }
    }
}

impl<T: Row> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.rows.get(idx)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Return number of enabled and disabled rows.
    pub fn get_counts(&self) -> (usize, usize) {
        let enabled = self.rows.iter().filter(|r| r.is_enabled()).count();
        (enabled, self.rows.len() - enabled)
    }

    pub fn position(&self, pred: impl Fn(&T) -> bool) -> Option<usize> {
        self.rows.iter().position(pred)
    }

    /// Drain accumulated signals.
    pub fn take_signals(&mut self) -> Vec<ModelSignal<T>> {
        std::mem::take(&mut self.signals)
    }

    fn signal(
        &mut self,
        phase: Phase,
        kind: ChangeKind,
        range: RangeInclusive<usize>,
        rows: Vec<T>,
    ) {
        self.signals.push(ModelSignal {
            phase,
            kind,
            range,
            rows,
        });
    }

    /// Append a row. Return `false` (and change nothing) if a row with the same key exists.
    pub fn add(&mut self, row: T) -> bool {
        if self.rows.iter().any(|r| r.same_key(&row)) {
            return false;
        }
        let idx = self.rows.len();
        self.signal(Phase::AboutToChange, ChangeKind::Insert, idx..=idx, vec![]);
        self.rows.push(row.clone());
        self.signal(Phase::Changed, ChangeKind::Insert, idx..=idx, vec![row]);
        true
    }

    /// Replace a row. Return `false` if index is invalid or the new row collides with another row.
    pub fn set_by_index(&mut self, idx: usize, row: T) -> bool {
        if idx >= self.rows.len() {
            return false;
        }
        let collision = self
            .rows
            .iter()
            .enumerate()
            .any(|(i, r)| i != idx && r.same_key(&row));
        if collision {
            return false;
        }

        let old = self.rows[idx].clone();
        self.signal(Phase::AboutToChange, ChangeKind::Update, idx..=idx, vec![old]);
        self.rows[idx] = row.clone();
        self.signal(Phase::Changed, ChangeKind::Update, idx..=idx, vec![row]);
        true
    }

    pub fn set_enabled_by_index(&mut self, idx: usize, enabled: bool) -> bool {
        let Some(row) = self.rows.get(idx) else {
            return false;
        };
        let mut new = row.clone();
        new.set_enabled(enabled);
        self.set_by_index(idx, new)
    }

    pub fn delete_by_index(&mut self, idx: usize) -> bool {
        if idx >= self.rows.len() {
            return false;
        }
        let old = self.rows[idx].clone();
        self.signal(Phase::AboutToChange, ChangeKind::Remove, idx..=idx, vec![old]);
        self.rows.remove(idx);
        self.signal(Phase::Changed, ChangeKind::Remove, idx..=idx, vec![]);
        true
    }

    /// Delete rows by indexes, invalid and repeated indexes are ignored.
    pub fn delete_list(&mut self, indexes: &[usize]) {
        let mut indexes = indexes.to_vec();
        indexes.sort_unstable();
        indexes.dedup();
        for idx in indexes.into_iter().rev() {
            self.delete_by_index(idx);
        }
    }

    pub fn delete_all(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() - 1;
        let old = self.rows.clone();
        self.signal(Phase::AboutToChange, ChangeKind::Remove, 0..=last, old);
        self.rows.clear();
        self.signal(Phase::Changed, ChangeKind::Remove, 0..=last, vec![]);
    }
}
