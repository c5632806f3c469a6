use std::collections::BTreeSet;

use anyhow::anyhow;
use tracing::{debug, error, info, instrument, warn};

use crate::api::TaskApi;
use crate::bridge::{FAVORITES_KEY, PersistenceBridge, TRASH_KEY};
use crate::datastore::KeyValueStore;
use crate::task::{DisplayTask, Task};

/// Outcome of emptying the trash. Ids are listed in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmptyTrashReport {
    pub deleted: Vec<u64>,
    pub failed: Vec<u64>,
}

/// In-memory task list for the session, merged with the locally persisted
/// favorite and trash flags.
#[derive(Debug)]
pub struct TaskStore<K> {
    records: Vec<DisplayTask>,
    bridge: PersistenceBridge<K>,
}

impl<K: KeyValueStore> TaskStore<K> {
    #[instrument(skip_all, fields(count = initial.len()))]
    pub fn load(initial: Vec<Task>, bridge: PersistenceBridge<K>) -> Self {
        let favorites: BTreeSet<u64> = bridge.read_ids(FAVORITES_KEY).into_iter().collect();
        let trashed: BTreeSet<u64> = bridge.read_ids(TRASH_KEY).into_iter().collect();

        let mut seen = BTreeSet::new();
        let mut records = Vec::with_capacity(initial.len());
        for task in initial {
            if !seen.insert(task.id) {
                warn!(id = task.id, "duplicate task id from API; keeping first");
                continue;
            }
            let mut record = DisplayTask::new(task);
            record.favorite = favorites.contains(&record.id());
            record.trashed = trashed.contains(&record.id());
            records.push(record);
        }

        info!(
            tasks = records.len(),
            favorites = favorites.len(),
            trashed = trashed.len(),
            "loaded task store"
        );
        Self { records, bridge }
    }

    pub fn tasks(&self) -> &[DisplayTask] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&DisplayTask> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn bridge(&self) -> &PersistenceBridge<K> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut PersistenceBridge<K> {
        &mut self.bridge
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<DisplayTask> {
        &mut self.records
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }

    /// Returns `false` when the id is unknown; nothing is written then.
    #[instrument(skip(self))]
    pub fn toggle_favorite(&mut self, id: u64) -> anyhow::Result<bool> {
        let Some(idx) = self.position(id) else {
            debug!("toggle favorite on unknown id ignored");
            return Ok(false);
        };
        self.records[idx].favorite = !self.records[idx].favorite;
        self.persist_favorites()?;
        Ok(true)
    }

    #[instrument(skip(self))]
    pub fn move_to_trash(&mut self, id: u64) -> anyhow::Result<bool> {
        self.set_trashed(id, true)
    }

    #[instrument(skip(self))]
    pub fn restore(&mut self, id: u64) -> anyhow::Result<bool> {
        self.set_trashed(id, false)
    }

    fn set_trashed(&mut self, id: u64, trashed: bool) -> anyhow::Result<bool> {
        let Some(idx) = self.position(id) else {
            debug!(trashed, "trash flag change on unknown id ignored");
            return Ok(false);
        };
        self.records[idx].trashed = trashed;
        self.persist_trash()?;
        Ok(true)
    }

    /// Deletes every trashed record remotely, one request at a time.
    ///
    /// Records whose delete fails stay in the store and in the persisted
    /// trash set; the set is rewritten once, after every delete was tried.
    #[instrument(skip(self, api))]
    pub async fn empty_trash<A: TaskApi>(&mut self, api: &A) -> anyhow::Result<EmptyTrashReport> {
        let trashed: Vec<u64> = self
            .records
            .iter()
            .filter(|record| record.trashed)
            .map(DisplayTask::id)
            .collect();

        let mut report = EmptyTrashReport::default();
        for id in trashed {
            match api.delete(id).await {
                Ok(()) => {
                    self.records.retain(|record| record.id() != id);
                    report.deleted.push(id);
                }
                Err(err) => {
                    error!(id, error = %err, "failed deleting task from trash");
                    report.failed.push(id);
                }
            }
        }

        self.persist_trash()?;
        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "emptied trash"
        );
        Ok(report)
    }

    /// Remote delete plus removal for a single record.
    #[instrument(skip(self, api))]
    pub async fn delete_permanently<A: TaskApi>(&mut self, id: u64, api: &A) -> anyhow::Result<()> {
        if self.position(id).is_none() {
            return Err(anyhow!("task not found: {id}"));
        }

        if let Err(err) = api.delete(id).await {
            error!(id, error = %err, "failed deleting task");
            return Err(anyhow::Error::new(err).context(format!("failed deleting task {id}")));
        }

        self.records.retain(|record| record.id() != id);
        self.persist_trash()?;
        info!(id, "deleted task permanently");
        Ok(())
    }

    /// Adds a task returned by a create call. An existing id is replaced.
    pub fn insert(&mut self, task: Task) {
        if !self.replace(task.clone()) {
            self.records.push(DisplayTask::new(task));
        }
    }

    /// Swaps in server data for an existing record, keeping its flags and
    /// position.
    pub fn replace(&mut self, task: Task) -> bool {
        match self.position(task.id) {
            Some(idx) => {
                self.records[idx].task = task;
                true
            }
            None => false,
        }
    }

    fn persist_favorites(&mut self) -> anyhow::Result<()> {
        let ids: Vec<u64> = self
            .records
            .iter()
            .filter(|record| record.favorite)
            .map(DisplayTask::id)
            .collect();
        self.bridge.write_ids(FAVORITES_KEY, &ids)
    }

    fn persist_trash(&mut self) -> anyhow::Result<()> {
        let ids: Vec<u64> = self
            .records
            .iter()
            .filter(|record| record.trashed)
            .map(DisplayTask::id)
            .collect();
        self.bridge.write_ids(TRASH_KEY, &ids)
    }
}
