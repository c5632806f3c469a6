use anyhow::bail;
use tracing::{debug, error, info, instrument};

use crate::api::TaskApi;
use crate::bridge::PersistenceBridge;
use crate::datastore::KeyValueStore;
use crate::filter::{Category, CategoryCounts, category_counts, project};
use crate::reorder::{DragState, ReorderEngine, ReorderError};
use crate::store::{EmptyTrashReport, TaskStore};
use crate::task::{DisplayTask, Task};

/// The task list page: store, filter state, drag state and the current
/// projection, recomputed after every change.
#[derive(Debug)]
pub struct Session<K, A> {
    api: A,
    store: TaskStore<K>,
    category: Category,
    search: String,
    reorder: ReorderEngine,
    view: Vec<DisplayTask>,
}

impl<K: KeyValueStore, A: TaskApi> Session<K, A> {
    /// Fetches the task list. A failed fetch is logged and yields an empty
    /// list rather than an error.
    #[instrument(skip_all)]
    pub async fn open(api: A, bridge: PersistenceBridge<K>) -> Self {
        let tasks = match api.fetch_all().await {
            Ok(tasks) => tasks,
            Err(err) if err.is_network() => {
                error!(error = %err, "task API unreachable; showing an empty list");
                Vec::new()
            }
            Err(err) => {
                error!(error = %err, "task list payload rejected; showing an empty list");
                Vec::new()
            }
        };

        let mut session = Self {
            api,
            store: TaskStore::load(tasks, bridge),
            category: Category::All,
            search: String::new(),
            reorder: ReorderEngine::new(),
            view: Vec::new(),
        };
        session.refresh();
        session
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &TaskStore<K> {
        &self.store
    }

    pub fn bridge_mut(&mut self) -> &mut PersistenceBridge<K> {
        self.store.bridge_mut()
    }

    pub fn view(&self) -> &[DisplayTask] {
        &self.view
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn is_searching(&self) -> bool {
        !self.search.trim().is_empty()
    }

    pub fn counts(&self) -> CategoryCounts {
        category_counts(self.store.tasks())
    }

    pub fn drag_state(&self) -> DragState {
        self.reorder.state()
    }

    fn refresh(&mut self) {
        if self.reorder.state() != DragState::Idle {
            self.reorder.cancel();
        }
        self.view = project(self.store.tasks(), self.category, &self.search);
        debug!(
            category = %self.category,
            search = %self.search,
            shown = self.view.len(),
            "view refreshed"
        );
    }

    pub fn search(&mut self, term: &str) {
        self.search = term.to_string();
        self.refresh();
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
        self.refresh();
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = category;
        self.refresh();
    }

    /// Trashed tasks cannot be starred; restore them first.
    pub fn toggle_favorite(&mut self, id: u64) -> anyhow::Result<bool> {
        if self.store.get(id).is_some_and(|record| record.trashed) {
            bail!("task {id} is in the trash; restore it before starring it");
        }
        let changed = self.store.toggle_favorite(id)?;
        self.refresh();
        Ok(changed)
    }

    pub fn trash(&mut self, id: u64) -> anyhow::Result<bool> {
        let changed = self.store.move_to_trash(id)?;
        self.refresh();
        Ok(changed)
    }

    pub fn restore(&mut self, id: u64) -> anyhow::Result<bool> {
        let changed = self.store.restore(id)?;
        self.refresh();
        Ok(changed)
    }

    pub async fn empty_trash(&mut self) -> anyhow::Result<EmptyTrashReport> {
        let report = self.store.empty_trash(&self.api).await;
        self.refresh();
        report
    }

    pub async fn delete(&mut self, id: u64) -> anyhow::Result<()> {
        let result = self.store.delete_permanently(id, &self.api).await;
        self.refresh();
        result
    }

    /// Folds the server's answer to a create or update into the store.
    pub fn apply_saved(&mut self, task: Task) {
        info!(id = task.id, "applying saved task");
        self.store.insert(task);
        self.refresh();
    }

    pub fn drag_start(&mut self, index: usize) -> Result<(), ReorderError> {
        self.reorder.start(index, self.category, self.view.len())
    }

    pub fn drag_enter(&mut self, index: usize) -> Result<(), ReorderError> {
        self.reorder.enter(index, self.view.len())
    }

    pub fn cancel_drag(&mut self) {
        self.reorder.cancel();
    }

    pub fn drop_dragged(&mut self) -> Result<bool, ReorderError> {
        let moved = self
            .reorder
            .drop_on(&mut self.view, self.store.records_mut())?;
        if moved {
            self.refresh();
        }
        Ok(moved)
    }

    /// A whole gesture: pick up `from`, hover `to`, drop.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<bool, ReorderError> {
        self.drag_start(from)?;
        if let Err(err) = self.drag_enter(to) {
            self.cancel_drag();
            return Err(err);
        }
        self.drop_dragged()
    }
}
