//! In-memory instance registry.
//!
//! Maps a project to the container name and host port recorded at its last
//! successful start. Entries are a best-effort cache: the container engine is
//! the only source of truth for what is running, and nothing here survives a
//! restart.
//!
//! Each orchestrator owns its own registry; there is no process-wide instance.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{InstanceRecord, ProjectName};

/// Thread-safe map of [`ProjectName`] → [`InstanceRecord`].
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    records: RwLock<HashMap<ProjectName, InstanceRecord>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `record.project`. Returns the previous record.
    pub fn insert(&self, record: InstanceRecord) -> Option<InstanceRecord> {
        self.write().insert(record.project.clone(), record)
    }

    pub fn get(&self, project: &ProjectName) -> Option<InstanceRecord> {
        self.read().get(project).cloned()
    }

    /// Port recorded for `project`, if any.
    pub fn port(&self, project: &ProjectName) -> Option<u16> {
        self.read().get(project).map(|r| r.port)
    }

    pub fn remove(&self, project: &ProjectName) -> Option<InstanceRecord> {
        self.write().remove(project)
    }

    /// Drop every record. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut guard = self.write();
        let n = guard.len();
        guard.clear();
        n
    }

    /// Keep only the records for which `keep` returns true. Returns the dropped records.
    pub fn retain(&self, mut keep: impl FnMut(&InstanceRecord) -> bool) -> Vec<InstanceRecord> {
        let mut guard = self.write();
        let dropped: Vec<ProjectName> = guard
            .values()
            .filter(|r| !keep(r))
            .map(|r| r.project.clone())
            .collect();
        dropped
            .into_iter()
            .filter_map(|p| guard.remove(&p))
            .collect()
    }

    /// Records sorted by project name.
    pub fn snapshot(&self) -> Vec<InstanceRecord> {
        let mut records: Vec<InstanceRecord> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.project.cmp(&b.project));
        records
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written HashMap entry,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ProjectName, InstanceRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ProjectName, InstanceRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContainerName;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(name: &str, port: u16) -> InstanceRecord {
        let project = ProjectName::new(name).expect("project");
        InstanceRecord {
            container: ContainerName::for_project(&project),
            project,
            port,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn insert_get_remove() {
        let reg = InstanceRegistry::new();
        assert!(reg.insert(record("alpha", 40001)).is_none());
        let alpha = ProjectName::new("alpha").unwrap();
        assert_eq!(reg.port(&alpha), Some(40001));

        let previous = reg.insert(record("alpha", 40002)).expect("replaced");
        assert_eq!(previous.port, 40001);
        assert_eq!(reg.port(&alpha), Some(40002));

        assert!(reg.remove(&alpha).is_some());
        assert!(reg.get(&alpha).is_none());
        assert!(reg.remove(&alpha).is_none());
    }

    #[test]
    fn clear_reports_count() {
        let reg = InstanceRegistry::new();
        reg.insert(record("a", 1));
        reg.insert(record("b", 2));
        assert_eq!(reg.clear(), 2);
        assert!(reg.is_empty());
        assert_eq!(reg.clear(), 0);
    }

    #[test]
    fn retain_returns_dropped_records() {
        let reg = InstanceRegistry::new();
        reg.insert(record("keep", 1));
        reg.insert(record("drop", 2));
        let dropped = reg.retain(|r| r.project.as_str() == "keep");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].project.as_str(), "drop");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn snapshot_is_sorted() {
        let reg = InstanceRegistry::new();
        reg.insert(record("zeta", 1));
        reg.insert(record("alpha", 2));
        let names: Vec<_> = reg
            .snapshot()
            .into_iter()
            .map(|r| r.project.to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn concurrent_inserts_are_all_visible() {
        let reg = Arc::new(InstanceRegistry::new());
        let handles: Vec<_> = (0..8u16)
            .map(|i| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    reg.insert(record(&format!("p{i}"), 40000 + i));
                })
            })
            .collect();
        for h in handles {
            h.join().expect("join");
        }
        assert_eq!(reg.len(), 8);
    }
}
