//! The task store: an in-memory ordered collection mirrored to durable
//! storage on every mutation.
//!
//! Persistence goes through the [`Storage`] port so the store can be unit
//! tested without touching the filesystem. The file backend writes the whole
//! collection wholesale (no partial/delta persistence) using a temp file +
//! rename, and treats unreadable or unparseable content as an empty store
//! rather than refusing to start.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::fields::Priority;
use crate::task::{Subtask, Task};

/// Persistence port for the task store.
pub trait Storage {
    /// Read the persisted JSON document, `None` if nothing was saved yet.
    fn load(&self) -> io::Result<Option<String>>;
    /// Write the full JSON document, replacing any previous content.
    fn store(&self, json: &str) -> io::Result<()>;
}

/// File-backed storage holding the serialized task array in a single file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStorage { path: path.into() }
    }
}

impl Storage for FileStorage {
    fn load(&self) -> io::Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut buf = String::new();
        File::open(&self.path)?.read_to_string(&mut buf)?;
        Ok(Some(buf))
    }

    fn store(&self, json: &str) -> io::Result<()> {
        // Atomic-ish write via temp + rename.
        let tmp = self.path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

/// A partial update applied to a single task.
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<chrono::NaiveDate>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub add_tags: Vec<String>,
    pub rm_tags: Vec<String>,
    pub clear_due: bool,
    pub clear_description: bool,
}

/// The authoritative in-memory task collection.
///
/// Every mutating method persists the full collection synchronously before
/// returning; an `Err` means the in-memory change happened but did not reach
/// storage.
pub struct Store {
    pub tasks: Vec<Task>,
    storage: Box<dyn Storage>,
}

impl Store {
    /// Open a store from the given storage backend.
    ///
    /// Missing content yields an empty store; unparseable content is
    /// reported and discarded. Tasks are sorted by their display-order
    /// index on load.
    pub fn open(storage: Box<dyn Storage>) -> Self {
        let tasks = match storage.load() {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Task>>(&raw) {
                Ok(tasks) => tasks,
                Err(e) => {
                    eprintln!("Error parsing task store, starting fresh: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                eprintln!("Error reading task store, starting fresh: {e}");
                Vec::new()
            }
        };
        let mut store = Store { tasks, storage };
        store.tasks.sort_by_key(|t| t.order);
        store
    }

    /// Serialize and persist the full task sequence.
    pub fn save(&self) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&self.tasks)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.storage.store(&json)
    }

    /// Get a task by exact id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// The next free display-order slot (tasks append at the end).
    pub fn next_order(&self) -> usize {
        self.tasks.len()
    }

    /// Append a task and persist.
    pub fn add(&mut self, task: Task) -> io::Result<()> {
        self.tasks.push(task);
        self.save()
    }

    /// Apply a patch to the task with the given id and persist.
    /// Returns false if no such task exists.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> io::Result<bool> {
        let Some(t) = self.get_mut(id) else {
            return Ok(false);
        };
        if let Some(title) = patch.title {
            t.title = title;
        }
        if patch.clear_description {
            t.description = None;
        } else if let Some(desc) = patch.description {
            t.description = Some(desc);
        }
        if patch.clear_due {
            t.due_date = None;
        } else if let Some(due) = patch.due_date {
            t.due_date = Some(due);
        }
        if let Some(p) = patch.priority {
            t.priority = p;
        }
        if let Some(done) = patch.completed {
            t.completed = done;
        }
        for tag in patch.add_tags {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !t.tags.contains(&tag) {
                t.tags.push(tag);
            }
        }
        if !patch.rm_tags.is_empty() {
            t.tags.retain(|tag| !patch.rm_tags.contains(tag));
        }
        self.save()?;
        Ok(true)
    }

    /// Flip the completion flag and persist. Returns false if missing.
    pub fn toggle(&mut self, id: &str) -> io::Result<bool> {
        let Some(t) = self.get_mut(id) else {
            return Ok(false);
        };
        t.completed = !t.completed;
        self.save()?;
        Ok(true)
    }

    /// Remove a task by id and persist. Returns false if missing.
    pub fn remove(&mut self, id: &str) -> io::Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Rewrite display-order indices to match the given id sequence and
    /// persist.
    ///
    /// Ids not present in the sequence keep their relative order after the
    /// listed ones; unknown ids are ignored. Indices come out dense
    /// (0..n) either way.
    pub fn reorder(&mut self, ids: &[String]) -> io::Result<()> {
        let rank = |id: &str| ids.iter().position(|x| x == id);
        // Stable sort: listed tasks in sequence order, the rest behind them
        // in their current order.
        self.tasks
            .sort_by_key(|t| rank(&t.id).unwrap_or(usize::MAX));
        for (idx, t) in self.tasks.iter_mut().enumerate() {
            t.order = idx;
        }
        self.save()
    }

    /// Replace the entire collection (import) and persist.
    ///
    /// Records are accepted as-is: no dedup, no schema check beyond what
    /// deserialization already did.
    pub fn replace_all(&mut self, tasks: Vec<Task>) -> io::Result<()> {
        self.tasks = tasks;
        self.save()
    }

    /// Append subtasks to a task, preserving insertion order, and persist.
    /// Returns false if the task does not exist.
    pub fn append_subtasks(&mut self, id: &str, subs: Vec<Subtask>) -> io::Result<bool> {
        let Some(t) = self.get_mut(id) else {
            return Ok(false);
        };
        t.subtasks.extend(subs);
        self.save()?;
        Ok(true)
    }

    /// Flip a subtask's done flag and persist. Returns false if either id
    /// is unknown.
    pub fn toggle_subtask(&mut self, id: &str, sub_id: &str) -> io::Result<bool> {
        let Some(t) = self.get_mut(id) else {
            return Ok(false);
        };
        let Some(s) = t.subtasks.iter_mut().find(|s| s.id == sub_id) else {
            return Ok(false);
        };
        s.done = !s.done;
        self.save()?;
        Ok(true)
    }

    /// The task generated subtasks attach to: the last task in the store.
    pub fn last_task(&self) -> Option<&Task> {
        self.tasks.last()
    }

    /// Resolve a user-supplied identifier to a task id.
    ///
    /// Accepts an exact id, an unambiguous id prefix, or an unambiguous
    /// case-insensitive title.
    pub fn resolve(&self, ident: &str) -> Result<String, String> {
        if self.get(ident).is_some() {
            return Ok(ident.to_string());
        }

        let prefix_matches: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.id.starts_with(ident))
            .collect();
        match prefix_matches.len() {
            1 => return Ok(prefix_matches[0].id.clone()),
            n if n > 1 => {
                return Err(format!("Id prefix '{}' matches {} tasks; be more specific.", ident, n))
            }
            _ => {}
        }

        let title_matches: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.title.eq_ignore_ascii_case(ident))
            .collect();
        match title_matches.len() {
            0 => Err(format!("No task found matching '{}'", ident)),
            1 => Ok(title_matches[0].id.clone()),
            _ => {
                let mut msg = format!("Multiple tasks titled '{}':\n", ident);
                for t in title_matches {
                    msg.push_str(&format!("  {} - {}\n", t.id, t.title));
                }
                msg.push_str("Please use the id instead.");
                Err(msg)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Storage backend over a shared string, for tests.
    pub(crate) struct MemStorage(pub Rc<RefCell<Option<String>>>);

    impl Storage for MemStorage {
        fn load(&self) -> io::Result<Option<String>> {
            Ok(self.0.borrow().clone())
        }

        fn store(&self, json: &str) -> io::Result<()> {
            *self.0.borrow_mut() = Some(json.to_string());
            Ok(())
        }
    }

    pub(crate) fn mem_store() -> (Store, Rc<RefCell<Option<String>>>) {
        let cell = Rc::new(RefCell::new(None));
        let store = Store::open(Box::new(MemStorage(cell.clone())));
        (store, cell)
    }

    #[test]
    fn test_add_first_task() {
        let (mut store, cell) = mem_store();
        let order = store.next_order();
        store.add(Task::new("Buy milk", Priority::Low, order)).unwrap();

        assert_eq!(store.tasks.len(), 1);
        assert_eq!(store.tasks[0].title, "Buy milk");
        assert_eq!(store.tasks[0].order, 0);
        assert!(!store.tasks[0].completed);
        // Mutation persisted synchronously.
        assert!(cell.borrow().as_deref().unwrap().contains("Buy milk"));
    }

    #[test]
    fn test_ids_stay_unique_across_add_remove() {
        let (mut store, _cell) = mem_store();
        for i in 0..8 {
            let order = store.next_order();
            store.add(Task::new(format!("t{i}"), Priority::Medium, order)).unwrap();
        }
        let victim = store.tasks[3].id.clone();
        store.remove(&victim).unwrap();
        let order = store.next_order();
        store.add(Task::new("replacement", Priority::Medium, order)).unwrap();

        let mut ids: Vec<&str> = store.tasks.iter().map(|t| t.id.as_str()).collect();
        let n = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), n);
    }

    #[test]
    fn test_reorder_round_trips_through_persistence() {
        let (mut store, cell) = mem_store();
        for title in ["a", "b", "c"] {
            let order = store.next_order();
            store.add(Task::new(title, Priority::Medium, order)).unwrap();
        }
        let ids: Vec<String> = store.tasks.iter().map(|t| t.id.clone()).collect();
        let wanted = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
        store.reorder(&wanted).unwrap();

        let reloaded = Store::open(Box::new(MemStorage(cell)));
        let titles: Vec<&str> = reloaded.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
        let orders: Vec<usize> = reloaded.tasks.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_reorder_with_partial_sequence_keeps_rest_behind() {
        let (mut store, _cell) = mem_store();
        for title in ["a", "b", "c", "d"] {
            let order = store.next_order();
            store.add(Task::new(title, Priority::Medium, order)).unwrap();
        }
        let ids: Vec<String> = store.tasks.iter().map(|t| t.id.clone()).collect();
        // Only two of four tasks named.
        store.reorder(&[ids[3].clone(), ids[1].clone()]).unwrap();

        let titles: Vec<&str> = store.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["d", "b", "a", "c"]);
        let orders: Vec<usize> = store.tasks.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_export_import_round_trip() {
        let (mut store, _cell) = mem_store();
        for title in ["one", "two"] {
            let order = store.next_order();
            let mut task = Task::new(title, Priority::High, order);
            task.tags = vec!["home".into()];
            task.subtasks.push(Subtask::new("step"));
            store.add(task).unwrap();
        }
        let exported = serde_json::to_string_pretty(&store.tasks).unwrap();

        let (mut other, _cell2) = mem_store();
        let imported: Vec<Task> = serde_json::from_str(&exported).unwrap();
        other.replace_all(imported).unwrap();
        assert_eq!(other.tasks, store.tasks);
    }

    #[test]
    fn test_replace_all_accepts_sparse_records() {
        let (mut store, _cell) = mem_store();
        let imported: Vec<Task> =
            serde_json::from_str(r#"[{"id":"x","title":"A","priority":"high"}]"#).unwrap();
        store.replace_all(imported).unwrap();
        assert_eq!(store.tasks.len(), 1);
        assert_eq!(store.tasks[0].priority, Priority::High);
    }

    #[test]
    fn test_update_applies_patch() {
        let (mut store, _cell) = mem_store();
        let order = store.next_order();
        store.add(Task::new("draft", Priority::Low, order)).unwrap();
        let id = store.tasks[0].id.clone();

        let patch = TaskPatch {
            title: Some("final".into()),
            description: Some("ready".into()),
            priority: Some(Priority::High),
            add_tags: vec!["work".into(), "work".into()],
            ..TaskPatch::default()
        };
        assert!(store.update(&id, patch).unwrap());

        let t = store.get(&id).unwrap();
        assert_eq!(t.title, "final");
        assert_eq!(t.description.as_deref(), Some("ready"));
        assert_eq!(t.priority, Priority::High);
        assert_eq!(t.tags, vec!["work".to_string()]);

        assert!(!store.update("missing", TaskPatch::default()).unwrap());
    }

    #[test]
    fn test_subtasks_preserve_insertion_order() {
        let (mut store, _cell) = mem_store();
        let order = store.next_order();
        store.add(Task::new("host", Priority::Medium, order)).unwrap();
        let id = store.tasks[0].id.clone();

        store
            .append_subtasks(&id, vec![Subtask::new("first"), Subtask::new("second")])
            .unwrap();
        store.append_subtasks(&id, vec![Subtask::new("third")]).unwrap();

        let texts: Vec<&str> = store.get(&id).unwrap().subtasks.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);

        let sub_id = store.get(&id).unwrap().subtasks[1].id.clone();
        assert!(store.toggle_subtask(&id, &sub_id).unwrap());
        assert!(store.get(&id).unwrap().subtasks[1].done);
    }

    #[test]
    fn test_open_sorts_by_order_index() {
        let cell = Rc::new(RefCell::new(Some(
            r#"[{"id":"b","title":"B","order":1},{"id":"a","title":"A","order":0}]"#.to_string(),
        )));
        let store = Store::open(Box::new(MemStorage(cell)));
        let ids: Vec<&str> = store.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_open_tolerates_garbage() {
        let cell = Rc::new(RefCell::new(Some("not json at all".to_string())));
        let store = Store::open(Box::new(MemStorage(cell)));
        assert!(store.tasks.is_empty());
    }

    #[test]
    fn test_resolve_by_id_prefix_and_title() {
        let (mut store, _cell) = mem_store();
        for title in ["Pay rent", "Call bank"] {
            let order = store.next_order();
            store.add(Task::new(title, Priority::Medium, order)).unwrap();
        }
        let full = store.tasks[0].id.clone();
        assert_eq!(store.resolve(&full).unwrap(), full);
        assert_eq!(store.resolve(&full[..10]).unwrap(), full);
        assert_eq!(store.resolve("call bank").unwrap(), store.tasks[1].id);
        assert!(store.resolve("no such").is_err());
        // "task-" prefixes every id, so it must be rejected as ambiguous.
        assert!(store.resolve("task-").is_err());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let storage = FileStorage::new(&path);

        let mut store = Store::open(Box::new(FileStorage::new(&path)));
        let order = store.next_order();
        store.add(Task::new("persisted", Priority::Low, order)).unwrap();

        let raw = storage.load().unwrap().expect("file written");
        assert!(raw.contains("persisted"));
        let reloaded = Store::open(Box::new(storage));
        assert_eq!(reloaded.tasks.len(), 1);
    }
}
