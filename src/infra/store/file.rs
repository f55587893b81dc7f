//! File-backed task store using JSON lines for durability.
//!
//! The whole table is loaded at open and the file is rewritten after every
//! mutation, through a temporary file renamed over the live one. Claims are
//! atomic within one process. Two processes sharing the same file can both
//! claim a record; run a single scheduler per file.

use std::fs::{create_dir_all, rename, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::table::TaskTable;
use crate::core::{ClaimOutcome, SchedulerError, TaskId, TaskKind, TaskRecord, TaskStatus, TaskStore};
use crate::util::clock::now_ms;

/// Task store persisting records to `<dir>/<stream>.jsonl`.
#[derive(Debug)]
pub struct JsonlTaskStore {
    file_path: PathBuf,
    table: Mutex<TaskTable>,
}

fn backend<E: std::fmt::Display>(err: E) -> SchedulerError {
    SchedulerError::Backend(err.to_string())
}

impl JsonlTaskStore {
    /// Open (or create) the store for `stream` under `dir`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Backend`] on I/O failure and
    /// [`SchedulerError::Serialization`] on a corrupt line.
    pub fn open(dir: impl AsRef<Path>, stream: impl AsRef<str>) -> Result<Self, SchedulerError> {
        let dir = dir.as_ref();
        create_dir_all(dir).map_err(backend)?;
        let file_path = dir.join(format!("{}.jsonl", stream.as_ref()));
        let table = TaskTable::from_records(Self::load_from_disk(&file_path)?);
        tracing::debug!(path = %file_path.display(), records = table.len(), "opened task file");
        Ok(Self {
            file_path,
            table: Mutex::new(table),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn load_from_disk(file_path: &Path) -> Result<Vec<TaskRecord>, SchedulerError> {
        if !file_path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(file_path).map_err(backend)?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(backend)?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    fn temp_path(&self) -> PathBuf {
        self.file_path.with_extension("jsonl.tmp")
    }

    /// Write the table beside the live file, then rename it into place so a
    /// crash mid-write never truncates the live file.
    fn rewrite_disk(&self, table: &TaskTable) -> Result<(), SchedulerError> {
        let temp_path = self.temp_path();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(backend)?;
        let mut writer = BufWriter::new(file);
        for record in table.records() {
            let line = serde_json::to_string(record)?;
            writeln!(writer, "{line}").map_err(backend)?;
        }
        let file = writer.into_inner().map_err(|e| backend(e.error()))?;
        file.sync_all().map_err(backend)?;
        drop(file);
        rename(&temp_path, &self.file_path).map_err(backend)
    }

    /// Apply `op` to the table and flush it to disk while still locked.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut TaskTable) -> Result<T, SchedulerError>,
    ) -> Result<T, SchedulerError> {
        let mut table = self.table.lock();
        let mut staged = table.clone();
        let out = op(&mut staged)?;
        self.rewrite_disk(&staged)?;
        *table = staged;
        Ok(out)
    }
}

#[async_trait]
impl TaskStore for JsonlTaskStore {
    async fn insert(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
    ) -> Result<TaskRecord, SchedulerError> {
        self.mutate(|t| Ok(t.insert(kind, payload, now_ms())))
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, SchedulerError> {
        Ok(self.table.lock().get(id).cloned())
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, SchedulerError> {
        Ok(self.table.lock().list_by_status(status))
    }

    async fn count_running(&self) -> Result<usize, SchedulerError> {
        Ok(self.table.lock().count(TaskStatus::Running))
    }

    async fn claim(&self, id: TaskId) -> Result<ClaimOutcome, SchedulerError> {
        self.mutate(|t| Ok(t.claim(id, now_ms())))
    }

    async fn persist(&self, record: &TaskRecord) -> Result<TaskRecord, SchedulerError> {
        self.mutate(|t| t.persist(record, now_ms()))
    }

    async fn reset(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.mutate(|t| t.reset(id, now_ms()))
    }

    async fn requeue(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.mutate(|t| t.requeue(id, now_ms()))
    }
}
