//! Container - ドメインごとの状態コンテナ（汎用）
//!
//! # 保持する状態
//! - items: サーバーが返した順（楽観的 pending item は先頭）
//! - selection: items に存在する ID のみ
//! - filters / loading / mutating / mutationProgress / error
//!
//! # 不変条件
//! - items 内で ID は一意
//! - fetch 系の pending は loading を立て、終端で下ろす
//! - mutation 系の pending は mutating を立て、終端で下ろす
//! - Session 系の rejected は error に入れない（ナビゲーション層が扱う）
//!
//! reducer はすべて同期で、`Container::update` を通してのみ呼ばれる。

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::app::progress::ProgressTarget;
use crate::domain::{ErrorPayload, FilterDescriptor, FilterPatch, Id, Item, SortKey};
use crate::store::projection::{project, project_sorted};

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerState<T: Item> {
    items: Vec<T>,
    selection: BTreeSet<Id<T::Marker>>,
    filters: FilterDescriptor,
    default_filters: FilterDescriptor,
    /// in-flight fetches / mutations
    loading: usize,
    mutating: usize,
    mutation_progress: u8,
    error: Option<ErrorPayload>,
}

impl<T: Item> ContainerState<T> {
    pub fn new(default_filters: FilterDescriptor) -> Self {
        Self {
            items: Vec::new(),
            selection: BTreeSet::new(),
            filters: default_filters.clone(),
            default_filters,
            loading: 0,
            mutating: 0,
            mutation_progress: 0,
            error: None,
        }
    }

    // --- selectors ---

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: &Id<T::Marker>) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn selection(&self) -> &BTreeSet<Id<T::Marker>> {
        &self.selection
    }

    pub fn is_selected(&self, id: &Id<T::Marker>) -> bool {
        self.selection.contains(id)
    }

    /// Selected items in list order.
    pub fn selected_items(&self) -> Vec<T> {
        self.items
            .iter()
            .filter(|item| self.selection.contains(item.id()))
            .cloned()
            .collect()
    }

    pub fn filters(&self) -> &FilterDescriptor {
        &self.filters
    }

    pub fn loading(&self) -> bool {
        self.loading > 0
    }

    pub fn mutating(&self) -> bool {
        self.mutating > 0
    }

    pub fn mutation_progress(&self) -> u8 {
        self.mutation_progress
    }

    pub fn error(&self) -> Option<&ErrorPayload> {
        self.error.as_ref()
    }

    pub fn visible(&self) -> Vec<T> {
        project(&self.items, &self.filters)
    }

    pub fn visible_sorted(&self, sort: Option<&SortKey>) -> Vec<T> {
        project_sorted(&self.items, &self.filters, sort)
    }

    // --- fetch lifecycle ---

    pub fn fetch_pending(&mut self) {
        self.loading += 1;
        self.error = None;
    }

    /// Replaces the collection. Duplicate ids keep their first occurrence;
    /// selection is pruned to ids that still exist.
    pub fn fetch_fulfilled(&mut self, items: Vec<T>) {
        self.loading = self.loading.saturating_sub(1);
        let mut seen = BTreeSet::new();
        self.items = items
            .into_iter()
            .filter(|item| seen.insert(item.id().clone()))
            .collect();
        self.prune_selection();
    }

    pub fn fetch_rejected(&mut self, error: ErrorPayload) {
        self.loading = self.loading.saturating_sub(1);
        self.record_error(error);
    }

    /// Releases the loading flag without replacing items (superseded fetch,
    /// or a fetch of container extras).
    pub fn fetch_settled(&mut self) {
        self.loading = self.loading.saturating_sub(1);
    }

    // --- mutation lifecycle ---

    pub fn mutation_pending(&mut self) {
        self.mutating += 1;
        self.mutation_progress = 0;
        self.error = None;
    }

    /// New item goes first; an item with the same id is replaced in place.
    pub fn create_fulfilled(&mut self, item: T) {
        self.end_mutation();
        match self.position(item.id()) {
            Some(index) => self.items[index] = item,
            None => self.items.insert(0, item),
        }
    }

    /// Replaces the item with the same id; a no-op when it is absent.
    pub fn update_fulfilled(&mut self, item: T) {
        self.end_mutation();
        self.replace(item);
    }

    pub fn update_many_fulfilled(&mut self, items: Vec<T>) {
        self.end_mutation();
        for item in items {
            self.replace(item);
        }
    }

    pub fn delete_fulfilled(&mut self, id: &Id<T::Marker>) {
        self.end_mutation();
        self.items.retain(|item| item.id() != id);
        self.selection.remove(id);
    }

    pub fn delete_many_fulfilled(&mut self, ids: &[Id<T::Marker>]) {
        self.end_mutation();
        self.items.retain(|item| !ids.contains(item.id()));
        for id in ids {
            self.selection.remove(id);
        }
    }

    pub fn mutation_rejected(&mut self, error: ErrorPayload) {
        self.end_mutation();
        self.record_error(error);
    }

    /// Releases the mutating flag without touching items.
    pub fn mutation_settled(&mut self) {
        self.end_mutation();
    }

    /// Failure outside the fetch/mutation lifecycle (e.g. a status poll).
    pub fn record_failure(&mut self, error: ErrorPayload) {
        self.record_error(error);
    }

    /// Apply `f` to the item with `id`, if present.
    pub fn patch_item(&mut self, id: &Id<T::Marker>, f: impl FnOnce(&mut T)) -> bool {
        match self.position(id) {
            Some(index) => {
                f(&mut self.items[index]);
                true
            }
            None => false,
        }
    }

    /// Clamped to 0..=100.
    pub fn set_mutation_progress(&mut self, percent: u8) {
        self.mutation_progress = percent.min(100);
    }

    // --- optimistic pending items ---

    pub fn insert_pending(&mut self, item: T) {
        self.items.retain(|existing| existing.id() != item.id());
        self.items.insert(0, item);
    }

    /// Swap the local placeholder for the confirmed server item, keeping its
    /// position. A selected placeholder stays selected under the new id.
    pub fn confirm_pending(&mut self, local_id: &Id<T::Marker>, item: T) {
        let server_id = item.id().clone();
        // サーバー ID が既に一覧にあれば重複させない
        if &server_id != local_id {
            self.items.retain(|existing| existing.id() != &server_id);
        }
        match self.position(local_id) {
            Some(index) => self.items[index] = item,
            None => self.items.insert(0, item),
        }
        if self.selection.remove(local_id) {
            self.selection.insert(server_id);
        }
    }

    pub fn discard_pending(&mut self, local_id: &Id<T::Marker>) {
        self.items.retain(|item| item.id() != local_id);
        self.selection.remove(local_id);
    }

    pub fn set_item_progress(&mut self, id: &Id<T::Marker>, percent: u8) {
        if let Some(index) = self.position(id) {
            self.items[index].apply_progress(percent.min(100));
        }
    }

    // --- selection ---

    /// Ids that are not in the collection are ignored.
    pub fn toggle_selection(&mut self, id: &Id<T::Marker>) {
        if self.selection.remove(id) {
            return;
        }
        if self.position(id).is_some() {
            self.selection.insert(id.clone());
        }
    }

    /// Replaces the selection; ids not in the collection are dropped.
    pub fn set_selection<'a>(&mut self, ids: impl IntoIterator<Item = &'a Id<T::Marker>>) {
        let selection: BTreeSet<Id<T::Marker>> = ids
            .into_iter()
            .filter(|id| self.position(id).is_some())
            .cloned()
            .collect();
        self.selection = selection;
    }

    pub fn select_all(&mut self) {
        self.selection = self.items.iter().map(|item| item.id().clone()).collect();
    }

    /// Selects exactly the currently visible items.
    pub fn select_visible(&mut self) {
        self.selection = self.visible().iter().map(|item| item.id().clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // --- filters ---

    pub fn set_filters(&mut self, patch: &FilterPatch) {
        self.filters = self.filters.merged(patch);
    }

    pub fn clear_filters(&mut self) {
        self.filters = self.default_filters.clone();
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn end_mutation(&mut self) {
        self.mutating = self.mutating.saturating_sub(1);
    }

    fn record_error(&mut self, error: ErrorPayload) {
        // session の失敗はナビゲーション層が扱う
        if !error.is_session() {
            self.error = Some(error);
        }
    }

    fn replace(&mut self, item: T) {
        if let Some(index) = self.position(item.id()) {
            self.items[index] = item;
        }
    }

    fn position(&self, id: &Id<T::Marker>) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn prune_selection(&mut self) {
        let ids: BTreeSet<&Id<T::Marker>> = self.items.iter().map(Item::id).collect();
        self.selection.retain(|id| ids.contains(id));
    }
}

/// Shared handle to a container's state.
pub struct Container<T: Item> {
    state: Arc<Mutex<ContainerState<T>>>,
}

impl<T: Item> Clone for Container<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Item> Container<T> {
    pub fn new(default_filters: FilterDescriptor) -> Self {
        Self {
            state: Arc::new(Mutex::new(ContainerState::new(default_filters))),
        }
    }

    /// Apply a reducer.
    pub fn update<R>(&self, f: impl FnOnce(&mut ContainerState<T>) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    pub fn read<R>(&self, f: impl FnOnce(&ContainerState<T>) -> R) -> R {
        let state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&state)
    }

    pub fn snapshot(&self) -> ContainerState<T> {
        self.read(ContainerState::clone)
    }
}

impl<T: Item> ProgressTarget for Container<T> {
    fn report_progress(&self, item: Option<&str>, percent: u8) {
        self.update(|state| {
            state.set_mutation_progress(percent);
            if let Some(item) = item {
                state.set_item_progress(&Id::new(item), percent);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Asset, AssetId, AssetStatus, FileFormat, ItemMeta};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn asset(id: &str, name: &str) -> Asset {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Asset {
            id: AssetId::new(id),
            name: name.to_string(),
            file_format: FileFormat::Image,
            status: AssetStatus::Ready,
            property: None,
            property_type: None,
            folder: None,
            size_bytes: 0,
            url: None,
            thumbnail_url: None,
            progress: 0,
            created_at: at,
            updated_at: at,
            meta: ItemMeta::default(),
        }
    }

    fn state_with(ids: &[&str]) -> ContainerState<Asset> {
        let mut state = ContainerState::new(FilterDescriptor::all_of(&["fileFormat"]));
        state.fetch_pending();
        state.fetch_fulfilled(ids.iter().map(|id| asset(id, id)).collect());
        state
    }

    fn ids(state: &ContainerState<Asset>) -> Vec<&str> {
        state.items().iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn fetch_sets_and_clears_loading() {
        let mut state: ContainerState<Asset> = ContainerState::new(FilterDescriptor::default());
        state.fetch_pending();
        assert!(state.loading());
        state.fetch_fulfilled(vec![asset("a1", "one"), asset("a1", "dup"), asset("a2", "two")]);
        assert!(!state.loading());
        assert_eq!(ids(&state), vec!["a1", "a2"]);
        assert_eq!(state.items()[0].name, "one");
    }

    #[test]
    fn overlapping_fetches_keep_loading_until_both_settle() {
        let mut state: ContainerState<Asset> = ContainerState::new(FilterDescriptor::default());
        state.fetch_pending();
        state.fetch_pending();
        state.fetch_fulfilled(vec![]);
        assert!(state.loading());
        state.fetch_settled();
        assert!(!state.loading());
    }

    #[test]
    fn operation_errors_are_recorded_but_session_errors_are_not() {
        let mut state = state_with(&["a1"]);
        state.fetch_pending();
        state.fetch_rejected(ErrorPayload::session("expired"));
        assert_eq!(state.error(), None);

        state.mutation_pending();
        state.mutation_rejected(ErrorPayload::operation("failed to update asset"));
        assert_eq!(state.error().map(|e| e.message.as_str()), Some("failed to update asset"));
        assert!(!state.mutating());

        // the next pending clears it
        state.fetch_pending();
        assert_eq!(state.error(), None);
    }

    #[test]
    fn create_prepends_and_update_replaces_in_place() {
        let mut state = state_with(&["a1", "a2"]);
        state.mutation_pending();
        state.create_fulfilled(asset("a3", "new"));
        assert_eq!(ids(&state), vec!["a3", "a1", "a2"]);

        state.mutation_pending();
        state.update_fulfilled(asset("a2", "renamed"));
        assert_eq!(ids(&state), vec!["a3", "a1", "a2"]);
        assert_eq!(state.get(&AssetId::new("a2")).unwrap().name, "renamed");
    }

    #[test]
    fn update_of_missing_item_changes_nothing() {
        let mut state = state_with(&["a1"]);
        let before = state.items().to_vec();
        state.mutation_pending();
        state.update_fulfilled(asset("zz", "ghost"));
        assert_eq!(state.items(), before.as_slice());
        assert!(!state.mutating());
    }

    #[test]
    fn delete_removes_item_and_selection() {
        let mut state = state_with(&["a1", "a2", "a3"]);
        state.toggle_selection(&AssetId::new("a1"));
        state.toggle_selection(&AssetId::new("a3"));

        state.mutation_pending();
        state.delete_many_fulfilled(&[AssetId::new("a1"), AssetId::new("a3")]);
        assert_eq!(ids(&state), vec!["a2"]);
        assert!(state.selection().is_empty());
    }

    #[test]
    fn selection_only_holds_existing_ids() {
        let mut state = state_with(&["a1", "a2"]);
        state.toggle_selection(&AssetId::new("ghost"));
        assert!(state.selection().is_empty());

        state.set_selection(&[AssetId::new("a1"), AssetId::new("ghost")]);
        assert_eq!(state.selection().len(), 1);

        state.select_all();
        assert_eq!(state.selection().len(), 2);

        // refetch drops vanished ids
        state.fetch_pending();
        state.fetch_fulfilled(vec![asset("a2", "a2")]);
        assert_eq!(state.selection().iter().map(|id| id.as_str()).collect::<Vec<_>>(), vec!["a2"]);
    }

    #[test]
    fn pending_item_confirmed_in_place() {
        let mut state = state_with(&["a1"]);
        let local = AssetId::new("local-asset-1");
        state.insert_pending(asset(local.as_str(), "upload.jpg"));
        state.toggle_selection(&local);
        assert_eq!(ids(&state), vec!["local-asset-1", "a1"]);

        state.confirm_pending(&local, asset("a9", "upload.jpg"));
        assert_eq!(ids(&state), vec!["a9", "a1"]);
        assert!(state.is_selected(&AssetId::new("a9")));
        assert!(!state.is_selected(&local));
    }

    #[test]
    fn pending_item_discarded_on_failure() {
        let mut state = state_with(&["a1"]);
        let local = AssetId::new("local-asset-1");
        state.insert_pending(asset(local.as_str(), "upload.jpg"));
        state.discard_pending(&local);
        assert_eq!(ids(&state), vec!["a1"]);
    }

    #[test]
    fn filters_merge_and_reset() {
        let mut state = state_with(&["a1"]);
        state.set_filters(&FilterPatch::new().set("fileFormat", "video").query("oak"));
        assert_eq!(state.filters().query(), "oak");
        assert!(state.visible().is_empty());

        state.clear_filters();
        assert_eq!(state.filters(), &FilterDescriptor::all_of(&["fileFormat"]));
        assert_eq!(state.visible().len(), 1);
    }

    #[test]
    fn progress_target_updates_container_and_item() {
        let container: Container<Asset> = Container::new(FilterDescriptor::default());
        let local = AssetId::new("local-asset-1");
        container.update(|s| s.insert_pending(asset(local.as_str(), "x.jpg")));

        container.report_progress(Some("local-asset-1"), 55);
        container.read(|s| {
            assert_eq!(s.mutation_progress(), 55);
            assert_eq!(s.get(&local).unwrap().progress, 55);
        });
    }

    #[test]
    fn snapshot_is_detached_from_the_container() {
        let container: Container<Asset> = Container::new(FilterDescriptor::default());
        container.update(|s| {
            s.fetch_pending();
            s.fetch_fulfilled(vec![asset("a1", "one"), asset("a2", "two")]);
            s.toggle_selection(&AssetId::new("a1"));
        });

        let before = container.snapshot();
        container.update(|s| {
            s.mutation_pending();
            s.delete_fulfilled(&AssetId::new("a1"));
        });

        assert_eq!(before.items().len(), 2);
        assert!(before.is_selected(&AssetId::new("a1")));
        assert_ne!(before, container.snapshot());
        assert_eq!(format!("{:?}", before.selection()), r#"{"a1"}"#);
    }

    proptest! {
        #[test]
        fn ids_stay_unique_through_any_reducer_sequence(ops in prop::collection::vec((0u8..5, 0u8..6), 0..40)) {
            let mut state: ContainerState<Asset> = ContainerState::new(FilterDescriptor::default());
            for (op, n) in ops {
                let id = format!("a{n}");
                match op {
                    0 => { state.mutation_pending(); state.create_fulfilled(asset(&id, "c")); }
                    1 => state.insert_pending(asset(&id, "p")),
                    2 => state.confirm_pending(&AssetId::new(format!("a{}", (n + 1) % 6)), asset(&id, "s")),
                    3 => { state.mutation_pending(); state.delete_fulfilled(&AssetId::new(id)); }
                    _ => state.toggle_selection(&AssetId::new(id)),
                }
                let unique: BTreeSet<&str> = state.items().iter().map(|a| a.id.as_str()).collect();
                prop_assert_eq!(unique.len(), state.items().len());
                for selected in state.selection() {
                    prop_assert!(state.get(selected).is_some());
                }
            }
        }
    }
}
