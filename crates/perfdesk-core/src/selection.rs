// ── Selection controller ──
//
// Selected row keys against a data array. The selected rows are never
// stored; they are recomputed from whatever data is current, so a row that
// left the data can never be reported as selected.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, warn};

use crate::key::KeyPart;

type KeyFn<R> = Arc<dyn Fn(&R) -> KeyPart + Send + Sync>;
type ChangeFn<R> = Arc<dyn Fn(&[KeyPart], &[&R]) + Send + Sync>;

/// How a row's identity is derived.
pub enum RowKey<R> {
    /// Read this field from the row's serialized form. A missing or null
    /// field falls back to the row's index.
    Field(String),
    /// Derive the key from the row alone.
    Func(KeyFn<R>),
}

impl<R> RowKey<R> {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn func(f: impl Fn(&R) -> KeyPart + Send + Sync + 'static) -> Self {
        Self::Func(Arc::new(f))
    }
}

impl<R> Clone for RowKey<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Field(name) => Self::Field(name.clone()),
            Self::Func(f) => Self::Func(Arc::clone(f)),
        }
    }
}

impl<R> fmt::Debug for RowKey<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.debug_tuple("Field").field(name).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// What happens to selected keys whose rows are gone from new data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleKeys {
    /// Keep them; the rows count as selected again if they come back
    /// (selection survives paging).
    #[default]
    Retain,
    /// Drop them as soon as the data no longer contains them.
    Prune,
}

pub struct SelectionOptions<R> {
    pub default_selected_keys: Vec<KeyPart>,
    pub on_selection_change: Option<ChangeFn<R>>,
    pub stale_keys: StaleKeys,
}

impl<R> Default for SelectionOptions<R> {
    fn default() -> Self {
        Self {
            default_selected_keys: Vec::new(),
            on_selection_change: None,
            stale_keys: StaleKeys::Retain,
        }
    }
}

impl<R> SelectionOptions<R> {
    pub fn selected(mut self, keys: impl IntoIterator<Item = impl Into<KeyPart>>) -> Self {
        self.default_selected_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_selection_change(
        mut self,
        f: impl Fn(&[KeyPart], &[&R]) + Send + Sync + 'static,
    ) -> Self {
        self.on_selection_change = Some(Arc::new(f));
        self
    }

    pub fn stale_keys(mut self, policy: StaleKeys) -> Self {
        self.stale_keys = policy;
        self
    }
}

pub struct SelectionController<R> {
    data: Arc<Vec<R>>,
    row_key: RowKey<R>,
    selected_keys: IndexSet<KeyPart>,
    /// Indices into `data`, derived by `reconcile_rows`.
    selected_rows: Vec<usize>,
    on_selection_change: Option<ChangeFn<R>>,
    stale_keys: StaleKeys,
}

impl<R: Serialize> SelectionController<R> {
    pub fn new(data: Arc<Vec<R>>, row_key: RowKey<R>, options: SelectionOptions<R>) -> Self {
        let selected_keys: IndexSet<KeyPart> = options.default_selected_keys.into_iter().collect();
        let selected_rows = reconcile_rows(&data, &row_key, &selected_keys);
        Self {
            data,
            row_key,
            selected_keys,
            selected_rows,
            on_selection_change: options.on_selection_change,
            stale_keys: options.stale_keys,
        }
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn data(&self) -> &Arc<Vec<R>> {
        &self.data
    }

    /// Selected keys in selection order. May include keys of rows not in
    /// the current data under [`StaleKeys::Retain`].
    pub fn selected_row_keys(&self) -> Vec<KeyPart> {
        self.selected_keys.iter().cloned().collect()
    }

    /// Rows of the current data whose key is selected, in data order.
    pub fn selected_rows(&self) -> Vec<&R> {
        self.selected_rows
            .iter()
            .filter_map(|&i| self.data.get(i))
            .collect()
    }

    pub fn is_selected(&self, key: &KeyPart) -> bool {
        self.selected_keys.contains(key)
    }

    pub fn get_row_key(&self, row: &R, index: usize) -> KeyPart {
        row_key_of(&self.row_key, row, index)
    }

    // ── Handlers ─────────────────────────────────────────────────────

    /// Select or deselect `row`. The row need not be the same instance as
    /// the one in the current data; it is identified by its key. Only a
    /// field key that falls back to the index needs the row to be an
    /// element of the current data.
    pub fn handle_select(&mut self, row: &R, selected: bool) {
        let key = match &self.row_key {
            RowKey::Func(f) => f(row),
            RowKey::Field(_) => match field_key(&self.row_key, row) {
                Some(key) => key,
                None => match self.data.iter().position(|r| std::ptr::eq(r, row)) {
                    Some(index) => KeyPart::from(index),
                    None => {
                        warn!("row has no key field and is not in the current data, ignoring");
                        return;
                    }
                },
            },
        };
        self.toggle(key, selected);
    }

    /// Select or deselect the row at `index` in the current data.
    pub fn handle_select_at(&mut self, index: usize, selected: bool) {
        let Some(row) = self.data.get(index) else {
            warn!(index, len = self.data.len(), "selection index out of range, ignoring");
            return;
        };
        let key = self.get_row_key(row, index);
        self.toggle(key, selected);
    }

    /// `true` selects exactly the rows of the current data; `false` clears.
    pub fn handle_select_all(&mut self, selected: bool) {
        self.selected_keys = if selected {
            self.data
                .iter()
                .enumerate()
                .map(|(i, row)| self.get_row_key(row, i))
                .collect()
        } else {
            IndexSet::new()
        };
        self.commit();
    }

    pub fn clear_selection(&mut self) {
        self.selected_keys.clear();
        self.commit();
    }

    /// Swap in new data and re-derive the selected rows against the
    /// existing keys.
    pub fn set_data(&mut self, data: Arc<Vec<R>>) {
        if Arc::ptr_eq(&self.data, &data) {
            return;
        }
        self.data = data;

        if self.stale_keys == StaleKeys::Prune {
            let present: IndexSet<KeyPart> = self
                .data
                .iter()
                .enumerate()
                .map(|(i, row)| self.get_row_key(row, i))
                .collect();
            let before = self.selected_keys.len();
            self.selected_keys.retain(|k| present.contains(k));
            debug!(pruned = before - self.selected_keys.len(), "pruned stale selection keys");
        }

        self.selected_rows = reconcile_rows(&self.data, &self.row_key, &self.selected_keys);
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn toggle(&mut self, key: KeyPart, selected: bool) {
        if selected {
            self.selected_keys.insert(key);
        } else {
            self.selected_keys.shift_remove(&key);
        }
        self.commit();
    }

    fn commit(&mut self) {
        self.selected_rows = reconcile_rows(&self.data, &self.row_key, &self.selected_keys);
        if let Some(cb) = &self.on_selection_change {
            let keys = self.selected_row_keys();
            let rows = self.selected_rows();
            cb(&keys, &rows);
        }
    }
}

/// Indices of rows in `data` whose key is in `selected`.
fn reconcile_rows<R: Serialize>(
    data: &[R],
    row_key: &RowKey<R>,
    selected: &IndexSet<KeyPart>,
) -> Vec<usize> {
    data.iter()
        .enumerate()
        .filter(|(i, row)| selected.contains(&row_key_of(row_key, row, *i)))
        .map(|(i, _)| i)
        .collect()
}

fn row_key_of<R: Serialize>(row_key: &RowKey<R>, row: &R, index: usize) -> KeyPart {
    match row_key {
        RowKey::Func(f) => f(row),
        RowKey::Field(_) => field_key(row_key, row).unwrap_or_else(|| KeyPart::from(index)),
    }
}

fn field_key<R: Serialize>(row_key: &RowKey<R>, row: &R) -> Option<KeyPart> {
    let RowKey::Field(name) = row_key else {
        return None;
    };
    let value = serde_json::to_value(row).ok()?;
    value
        .get(name)
        .filter(|v| !v.is_null())
        .map(KeyPart::from_json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Row {
        id: i64,
        name: &'static str,
    }

    fn rows(ids: &[i64]) -> Arc<Vec<Row>> {
        Arc::new(ids.iter().map(|&id| Row { id, name: "r" }).collect())
    }

    fn ids(rows: &[&Row]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    fn keys(ids: &[i64]) -> Vec<KeyPart> {
        ids.iter().map(|&i| KeyPart::Int(i)).collect()
    }

    #[test]
    fn reconciliation_drops_rows_absent_from_new_data() {
        let mut sel = SelectionController::new(
            rows(&[1, 2, 3]),
            RowKey::field("id"),
            SelectionOptions::default(),
        );
        sel.handle_select_all(true);
        assert_eq!(ids(&sel.selected_rows()), vec![1, 2, 3]);

        sel.set_data(rows(&[1]));
        assert_eq!(ids(&sel.selected_rows()), vec![1]);
        assert_eq!(sel.selected_row_keys(), keys(&[1, 2, 3]));
    }

    #[test]
    fn retained_keys_reselect_returning_rows() {
        let mut sel = SelectionController::new(
            rows(&[1, 2]),
            RowKey::field("id"),
            SelectionOptions::default(),
        );
        sel.handle_select_at(1, true);

        // Page 2 has other rows; page 1 comes back later.
        sel.set_data(rows(&[3, 4]));
        assert!(sel.selected_rows().is_empty());
        sel.set_data(rows(&[1, 2]));
        assert_eq!(ids(&sel.selected_rows()), vec![2]);
    }

    #[test]
    fn prune_policy_forgets_stale_keys() {
        let mut sel = SelectionController::new(
            rows(&[1, 2]),
            RowKey::field("id"),
            SelectionOptions::default().stale_keys(StaleKeys::Prune),
        );
        sel.handle_select_all(true);

        sel.set_data(rows(&[2, 3]));
        assert_eq!(sel.selected_row_keys(), keys(&[2]));
        sel.set_data(rows(&[1, 2]));
        assert_eq!(ids(&sel.selected_rows()), vec![2]);
    }

    #[test]
    fn select_is_idempotent_and_deselect_removes() {
        let data = rows(&[1, 2, 3]);
        let mut sel = SelectionController::new(
            Arc::clone(&data),
            RowKey::field("id"),
            SelectionOptions::default(),
        );

        sel.handle_select(&data[0], true);
        sel.handle_select(&data[0], true);
        sel.handle_select(&data[2], true);
        assert_eq!(sel.selected_row_keys(), keys(&[1, 3]));

        sel.handle_select(&data[0], false);
        assert_eq!(ids(&sel.selected_rows()), vec![3]);
    }

    #[test]
    fn select_all_false_clears() {
        let mut sel = SelectionController::new(
            rows(&[1, 2]),
            RowKey::field("id"),
            SelectionOptions::default().selected([1_i64]),
        );
        assert_eq!(ids(&sel.selected_rows()), vec![1]);
        sel.handle_select_all(false);
        assert!(sel.selected_row_keys().is_empty());
    }

    #[test]
    fn missing_field_falls_back_to_index() {
        let data = rows(&[10, 20]);
        let sel = SelectionController::new(
            Arc::clone(&data),
            RowKey::field("uuid"),
            SelectionOptions::default(),
        );
        assert_eq!(sel.get_row_key(&data[1], 1), KeyPart::Int(1));
    }

    #[test]
    fn function_keys() {
        let data = rows(&[5, 6]);
        let mut sel = SelectionController::new(
            Arc::clone(&data),
            RowKey::func(|row: &Row| KeyPart::from(format!("emp-{}", row.id))),
            SelectionOptions::default(),
        );
        sel.handle_select_at(1, true);
        assert_eq!(sel.selected_row_keys(), vec![KeyPart::from("emp-6")]);
    }

    #[test]
    fn change_callback_fires_once_per_handler() {
        let calls: Arc<Mutex<Vec<(Vec<KeyPart>, Vec<i64>)>>> = Arc::default();
        let sink = Arc::clone(&calls);
        let mut sel = SelectionController::new(
            rows(&[1, 2]),
            RowKey::field("id"),
            SelectionOptions::default().on_selection_change(move |keys, rows: &[&Row]| {
                sink.lock().unwrap().push((keys.to_vec(), ids(rows)));
            }),
        );

        sel.handle_select_at(0, true);
        sel.handle_select_all(true);
        sel.clear_selection();
        sel.set_data(rows(&[3]));

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                (keys(&[1]), vec![1]),
                (keys(&[1, 2]), vec![1, 2]),
                (vec![], vec![]),
            ]
        );
    }

    #[test]
    fn select_by_equal_row_outside_current_data() {
        for row_key in [
            RowKey::field("id"),
            RowKey::func(|row: &Row| KeyPart::from(row.id)),
        ] {
            let calls = Arc::new(Mutex::new(0_u32));
            let sink = Arc::clone(&calls);
            let mut sel = SelectionController::new(
                rows(&[1, 2]),
                row_key,
                SelectionOptions::default().on_selection_change(move |_, _: &[&Row]| {
                    *sink.lock().unwrap() += 1;
                }),
            );

            // A copy held from an earlier page, not the instance in `data`.
            let copy = Row { id: 2, name: "r" };
            sel.handle_select(&copy, true);
            assert_eq!(sel.selected_row_keys(), keys(&[2]));
            assert_eq!(ids(&sel.selected_rows()), vec![2]);

            sel.handle_select(&Row { id: 2, name: "r" }, false);
            assert!(sel.selected_row_keys().is_empty());
            assert_eq!(*calls.lock().unwrap(), 2);
        }
    }

    #[test]
    fn indexed_fallback_needs_a_row_from_current_data() {
        let data = rows(&[10, 20]);
        let mut sel = SelectionController::new(
            Arc::clone(&data),
            RowKey::field("uuid"),
            SelectionOptions::default(),
        );
        sel.handle_select(&Row { id: 20, name: "r" }, true);
        assert!(sel.selected_row_keys().is_empty());

        sel.handle_select(&data[1], true);
        assert_eq!(sel.selected_row_keys(), vec![KeyPart::Int(1)]);
    }
}
