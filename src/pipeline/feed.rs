use std::path::{Path, PathBuf};

use crate::error::LineageError;

/// One routine to process: a unique name and its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineTask {
    /// Unique routine name.
    pub name: String,
    /// Full routine definition.
    pub source_text: String,
}

impl RoutineTask {
    /// Create a task.
    pub fn new(name: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_text: source_text.into(),
        }
    }

    /// True when there is no source to parse.
    pub fn is_blank(&self) -> bool {
        self.source_text.trim().is_empty()
    }
}

/// Pull-based source of routine tasks.
pub trait RoutineFeed {
    /// Next routine, or `None` at end of stream. Errors abort the run.
    fn next_routine(&mut self) -> Result<Option<RoutineTask>, LineageError>;
}

/// In-memory feed over prepared tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskListFeed {
    tasks: std::vec::IntoIter<RoutineTask>,
}

impl TaskListFeed {
    /// Feed the given tasks in order.
    pub fn new(tasks: Vec<RoutineTask>) -> Self {
        Self {
            tasks: tasks.into_iter(),
        }
    }
}

impl RoutineFeed for TaskListFeed {
    fn next_routine(&mut self) -> Result<Option<RoutineTask>, LineageError> {
        Ok(self.tasks.next())
    }
}

/// Feed over a directory of `<routine>.sql` definition files.
///
/// Files are listed up front (sorted by path) and read one at a time as the
/// pipeline pulls them.
#[derive(Debug, Clone)]
pub struct DirectoryFeed {
    files: std::vec::IntoIter<PathBuf>,
}

impl DirectoryFeed {
    /// List the `.sql` files in `dir`.
    pub fn open(dir: &Path) -> Result<Self, LineageError> {
        let feed_err = |source| LineageError::Feed {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(feed_err)? {
            let path = entry.map_err(feed_err)?.path();
            if path.is_file() && path.extension().is_some_and(|e| e.eq_ignore_ascii_case("sql")) {
                files.push(path);
            }
        }
        files.sort();
        Ok(Self {
            files: files.into_iter(),
        })
    }

    /// Number of files not yet pulled.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl RoutineFeed for DirectoryFeed {
    fn next_routine(&mut self) -> Result<Option<RoutineTask>, LineageError> {
        let Some(path) = self.files.next() else {
            return Ok(None);
        };
        let source_text = std::fs::read_to_string(&path).map_err(|source| LineageError::Feed {
            path: path.clone(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Some(RoutineTask { name, source_text }))
    }
}
