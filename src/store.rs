use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::core::task::{Task, TaskPatch};
use crate::error::{EngineError, StoreError};

/// Ordered task collection, optionally mirrored to a JSON file.
///
/// The whole collection is written after every mutation. Derived fields are
/// the caller's job; the store only keeps what it is given.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    path: Option<PathBuf>,
}

impl TaskStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load `path`, treating a missing file as an empty list.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tasks = load_tasks(&path)?;
        log::debug!("Loaded {} tasks from {}", tasks.len(), path.display());
        Ok(Self {
            tasks,
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn create(&mut self, task: Task) -> Task {
        self.tasks.push(task.clone());
        self.persist();
        task
    }

    /// Apply a patch; `derive` runs on the patched task before it is stored.
    pub fn update(
        &mut self,
        id: &str,
        patch: &TaskPatch,
        derive: impl FnOnce(&mut Task),
    ) -> Result<Task, EngineError> {
        let task = self.find_mut(id)?;
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(deadline) = patch.official_deadline {
            task.official_deadline = deadline;
        }
        if let Some(estimate) = patch.estimate {
            task.estimate = estimate;
        }
        derive(task);
        let updated = task.clone();
        self.persist();
        Ok(updated)
    }

    pub fn remove(&mut self, id: &str) -> Result<Task, EngineError> {
        let pos = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let removed = self.tasks.remove(pos);
        self.persist();
        Ok(removed)
    }

    pub fn toggle_done(&mut self, id: &str, now: DateTime<Utc>) -> Result<Task, EngineError> {
        let task = self.find_mut(id)?;
        task.toggle(now);
        let toggled = task.clone();
        self.persist();
        Ok(toggled)
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Task, EngineError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    fn persist(&self) {
        if let Some(path) = &self.path {
            if let Err(e) = save_tasks(path, &self.tasks) {
                log::error!("Failed to save tasks: {}", e);
            }
        }
    }
}

pub fn load_tasks(path: &Path) -> Result<Vec<Task>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_tasks(path: &Path, tasks: &[Task]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(tasks).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    // Written beside the target, then renamed over it.
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .and_then(|_| std::fs::rename(&tmp, path))
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path().join("tasks.json")).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn mutations_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tasks.json");

        let mut store = TaskStore::open(&path).unwrap();
        let a = store.create(Task::new("First"));
        store.create(Task::new("Second"));
        store.toggle_done(&a.id, now()).unwrap();

        let reopened = TaskStore::open(&path).unwrap();
        assert_eq!(reopened.list().len(), 2);
        assert_eq!(reopened.list()[0].title, "First");
        assert!(reopened.list()[0].done);
        assert_eq!(reopened.list()[0].done_at, Some(now()));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TaskStore::open(&path),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut store = TaskStore::in_memory();
        assert!(matches!(
            store.remove("nope"),
            Err(EngineError::NotFound(id)) if id == "nope"
        ));
        assert!(matches!(
            store.toggle_done("nope", now()),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            store.update("nope", &TaskPatch::default(), |_| {}),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn update_applies_patch_then_derive() {
        let mut store = TaskStore::in_memory();
        let task = store.create(Task::new("Draft"));
        let patch = TaskPatch {
            title: Some("Final".into()),
            estimate: Some(90),
            ..Default::default()
        };
        let updated = store
            .update(&task.id, &patch, |t| t.title.push('!'))
            .unwrap();
        assert_eq!(updated.title, "Final!");
        assert_eq!(updated.estimate, 90);
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut store = TaskStore::in_memory();
        let a = store.create(Task::new("a"));
        let b = store.create(Task::new("b"));
        let c = store.create(Task::new("c"));
        store.remove(&b.id).unwrap();
        let ids: Vec<&str> = store.list().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, [a.id.as_str(), c.id.as_str()]);
    }
}
