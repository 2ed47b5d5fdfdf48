// Hierarchical tasks with cascading completion and deletion

use crate::collection::Snapshot;
use crate::error::JournalResult;
use crate::kv::KvStore;
use crate::models::{Task, TaskPatch, next_stamp};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lookup tables over a flat task list, built once per operation.
///
/// Children are kept in `created_at` order.
#[derive(Debug)]
pub struct TaskIndex<'a> {
    by_id: HashMap<&'a str, &'a Task>,
    children: HashMap<&'a str, Vec<&'a Task>>,
    roots: Vec<&'a Task>,
}

impl<'a> TaskIndex<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut children: HashMap<&str, Vec<&Task>> = HashMap::new();
        let mut roots = Vec::new();

        for task in tasks {
            match task.parent_id.as_deref() {
                Some(parent) if by_id.contains_key(parent) => {
                    children.entry(parent).or_default().push(task);
                }
                // A task whose parent is gone still has to be reachable
                _ => roots.push(task),
            }
        }

        for list in children.values_mut() {
            list.sort_by_key(|t| t.created_at);
        }
        roots.sort_by_key(|t| t.created_at);

        Self { by_id, children, roots }
    }

    pub fn get(&self, id: &str) -> Option<&'a Task> {
        self.by_id.get(id).copied()
    }

    pub fn children(&self, id: &str) -> &[&'a Task] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every task whose parent chain reaches `id`, excluding `id` itself
    pub fn descendants(&self, id: &str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = vec![id];
        let mut seen: HashSet<&str> = HashSet::from([id]);

        while let Some(current) = stack.pop() {
            for child in self.children(current) {
                if seen.insert(child.id.as_str()) {
                    out.push(child.id.as_str());
                    stack.push(child.id.as_str());
                }
            }
        }
        out
    }

    /// Parent, grandparent, ... up to the root
    pub fn ancestors(&self, id: &str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut current = self.get(id);

        while let Some(parent) = current
            .and_then(|t| t.parent_id.as_deref())
            .and_then(|p| self.get(p))
        {
            if !seen.insert(parent.id.as_str()) {
                break;
            }
            out.push(parent.id.as_str());
            current = Some(parent);
        }
        out
    }

    /// Depth-first pre-order walk with each task's depth in the walk
    pub fn depth_first(&self) -> Vec<(usize, &'a Task)> {
        let mut out = Vec::with_capacity(self.by_id.len());
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(usize, &Task)> = self.roots.iter().rev().map(|t| (0, *t)).collect();

        while let Some((depth, task)) = stack.pop() {
            if !seen.insert(task.id.as_str()) {
                continue;
            }
            out.push((depth, task));
            for child in self.children(&task.id).iter().rev() {
                stack.push((depth + 1, *child));
            }
        }
        out
    }
}

/// Store of the task forest.
///
/// Each operation reads the whole collection, computes the complete change,
/// and writes it back in a single replace.
#[derive(Debug)]
pub struct TaskStore<K> {
    kv: Arc<K>,
}

impl<K> Clone for TaskStore<K> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
        }
    }
}

impl<K: KvStore> TaskStore<K> {
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv }
    }

    async fn snapshot(&self) -> JournalResult<Snapshot<Task>> {
        Ok(Snapshot::load(&*self.kv).await?)
    }

    async fn commit(&self, snapshot: &mut Snapshot<Task>) -> JournalResult<()> {
        snapshot.commit(&*self.kv).await?;
        Ok(())
    }

    /// Add a root task, or a child of `parent_id`.
    ///
    /// An unknown parent yields a root task rather than a dangling link.
    pub async fn add_task(&self, title: &str, parent_id: Option<&str>) -> JournalResult<Task> {
        let mut snapshot = self.snapshot().await?;

        let (parent_id, level) = match parent_id {
            None => (None, 0),
            Some(pid) => match snapshot.records.iter().find(|t| t.id == pid) {
                Some(parent) => (Some(parent.id.clone()), parent.level + 1),
                None => {
                    warn!(parent_id = pid, "Parent task not found, adding as root");
                    (None, 0)
                }
            },
        };

        let task = Task::new(title, parent_id, level);
        snapshot.records.push(task.clone());
        self.commit(&mut snapshot).await?;

        info!(id = %task.id, level = task.level, "Added task");
        Ok(task)
    }

    /// Merge `patch` into a task. `None` when the id is unknown.
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> JournalResult<Option<Task>> {
        let mut snapshot = self.snapshot().await?;

        let Some(task) = snapshot.records.iter_mut().find(|t| t.id == id) else {
            debug!(id, "Task not found, nothing to update");
            return Ok(None);
        };
        patch.apply(task);
        task.updated_at = next_stamp(task.updated_at);
        let updated = task.clone();

        self.commit(&mut snapshot).await?;
        debug!(id, "Updated task");
        Ok(Some(updated))
    }

    /// Delete a task and its whole subtree in one write.
    /// Returns the removed ids; empty when the id is unknown.
    pub async fn delete_task(&self, id: &str) -> JournalResult<Vec<String>> {
        let mut snapshot = self.snapshot().await?;

        let doomed: HashSet<String> = {
            let index = TaskIndex::new(&snapshot.records);
            if index.get(id).is_none() {
                debug!(id, "Task not found, nothing to delete");
                return Ok(Vec::new());
            }
            std::iter::once(id)
                .chain(index.descendants(id))
                .map(str::to_string)
                .collect()
        };

        let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut snapshot.records)
            .into_iter()
            .partition(|t| doomed.contains(&t.id));
        snapshot.records = kept;
        self.commit(&mut snapshot).await?;

        info!(id, removed = removed.len(), "Deleted task subtree");
        Ok(removed.into_iter().map(|t| t.id).collect())
    }

    /// Flip a task's completion.
    ///
    /// Completing marks every descendant complete. Un-completing marks every
    /// ancestor incomplete. Everything is written in one snapshot.
    pub async fn toggle_completion(&self, id: &str) -> JournalResult<Option<Task>> {
        let mut snapshot = self.snapshot().await?;

        let (completed, cascade): (bool, HashSet<String>) = {
            let index = TaskIndex::new(&snapshot.records);
            let Some(task) = index.get(id) else {
                debug!(id, "Task not found, nothing to toggle");
                return Ok(None);
            };
            let completed = !task.completed;
            let related = if completed {
                index.descendants(id)
            } else {
                index.ancestors(id)
            };
            (completed, related.into_iter().map(str::to_string).collect())
        };

        let mut toggled = None;
        let mut cascaded = 0;
        for task in snapshot.records.iter_mut() {
            if task.id == id {
                task.completed = completed;
                task.updated_at = next_stamp(task.updated_at);
                toggled = Some(task.clone());
            } else if cascade.contains(&task.id) && task.completed != completed {
                task.completed = completed;
                task.updated_at = next_stamp(task.updated_at);
                cascaded += 1;
            }
        }

        self.commit(&mut snapshot).await?;
        info!(id, completed, cascaded, "Toggled task");
        Ok(toggled)
    }

    /// All tasks ordered by level, then creation time
    pub async fn list_hierarchy(&self) -> JournalResult<Vec<Task>> {
        let mut tasks = self.snapshot().await?.records;
        tasks.sort_by(|a, b| a.level.cmp(&b.level).then(a.created_at.cmp(&b.created_at)));
        Ok(tasks)
    }
}
