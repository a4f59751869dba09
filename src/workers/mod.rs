//! The `workers` module loads operator-supplied worker functions into a
//! dispatch tree and keeps that tree fresh as the source directory changes.
//!
//! Files become callable leaf capabilities keyed by file name with the
//! extension stripped; directories become child mappings keyed by directory
//! name. A name can be both callable and a namespace at the same time: the
//! tree is built files-first at every level so a directory's children merge
//! onto a worker already created for the same name.
//!
//! The registry snapshot is immutable and swapped wholesale on reload, so
//! concurrent route lookups always see either the old complete tree or the
//! new complete tree.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::broker::request::Request;
use crate::queue::QueueHandle;
use crate::utils::error::WorkerError;


/// An invocable worker. Receives the routed request and a handle to the
/// queue service, and reports an optional failure on completion.
pub type WorkerFn =
    Arc<dyn Fn(Request, QueueHandle) -> BoxFuture<'static, Result<(), WorkerError>> + Send + Sync>;

/// Errors raised while building the dispatch tree.
///
/// Any failure is fatal at startup; during a hot reload it is reported and
/// the previous tree is retained instead.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read worker directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load worker {path}: {reason}")]
    Worker { path: PathBuf, reason: String },
}

/// A node in the dispatch tree.
///
/// May carry a worker, child nodes, or both.
#[derive(Default, Clone)]
pub struct WorkerNode {
    pub worker: Option<WorkerFn>,
    pub children: HashMap<String, WorkerNode>,
}

impl WorkerNode {
    pub fn child(&self, name: &str) -> Option<&WorkerNode> {
        self.children.get(name)
    }
}

impl fmt::Debug for WorkerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerNode")
            .field("worker", &self.worker.is_some())
            .field("children", &self.children)
            .finish()
    }
}

/// Turns a worker source file into a callable.
///
/// This is the seam between the file/name discovery convention and the
/// compiled worker functions an operator registers.
pub trait WorkerSource: Send + Sync {
    /// The file extension identifying worker modules; other files are
    /// ignored.
    fn extension(&self) -> &str;

    fn load(&self, path: &Path) -> Result<WorkerFn, LoadError>;
}

/// A [`WorkerSource`] backed by a map of workers registered in code.
///
/// Each `.worker` file under the source tree binds its stem to the
/// registered worker of the same name; a file with no registered worker is a
/// load error.
#[derive(Default)]
pub struct ModuleSource {
    workers: HashMap<String, WorkerFn>,
}

impl ModuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, worker: WorkerFn) {
        self.workers.insert(name.to_string(), worker);
    }
}

impl WorkerSource for ModuleSource {
    fn extension(&self) -> &str {
        "worker"
    }

    fn load(&self, path: &Path) -> Result<WorkerFn, LoadError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.workers
            .get(&stem)
            .cloned()
            .ok_or_else(|| LoadError::Worker {
                path: path.to_path_buf(),
                reason: format!("no registered worker named '{stem}'"),
            })
    }
}

/// The worker registry: owns the current dispatch tree and rebuilds it when
/// the source directory changes.
pub struct Registry {
    root: PathBuf,
    source: Arc<dyn WorkerSource>,
    snapshot: RwLock<Arc<WorkerNode>>,
}

impl Registry {
    /// Build the registry from the worker source tree.
    ///
    /// A file that fails to load is a fatal startup error.
    pub fn load(root: impl Into<PathBuf>, source: Arc<dyn WorkerSource>) -> Result<Self, LoadError> {
        let root = root.into();
        let tree = build_tree(&root, source.as_ref())?;

        Ok(Self {
            root,
            source,
            snapshot: RwLock::new(Arc::new(tree)),
        })
    }

    /// The current immutable snapshot of the dispatch tree.
    pub fn workers(&self) -> Arc<WorkerNode> {
        self.snapshot.read().unwrap().clone()
    }

    /// Rebuild the tree from the source directory and swap it in.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn rebuild(&self) -> Result<(), LoadError> {
        let tree = build_tree(&self.root, self.source.as_ref())?;
        *self.snapshot.write().unwrap() = Arc::new(tree);
        Ok(())
    }

    /// Watch the source tree for changes, triggering a full rebuild on any
    /// add, change or removal.
    pub fn watch(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut seen = fingerprint(&self.root);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let current = fingerprint(&self.root);
                if current != seen {
                    if let Err(err) = self.rebuild() {
                        tracing::warn!("worker reload failed, keeping previous workers: {err}");
                    }
                    seen = current;
                }
            }
        })
    }
}

/// Recursively build a dispatch node from a directory.
///
/// Files must be read before directories so that deeper levels can attach to
/// worker functions already created at the same name.
fn build_tree(dir: &Path, source: &dyn WorkerSource) -> Result<WorkerNode, LoadError> {
    let mut node = WorkerNode::default();

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries.iter().filter(|p| p.is_file()) {
        if path.extension().and_then(|e| e.to_str()) != Some(source.extension()) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let worker = source.load(path)?;
        node.children.entry(stem.to_string()).or_default().worker = Some(worker);
    }

    for path in entries.iter().filter(|p| p.is_dir()) {
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };

        let subtree = build_tree(path, source)?;
        let child = node.children.entry(name.to_string()).or_default();
        child.children.extend(subtree.children);
    }

    Ok(node)
}

/// A cheap content fingerprint of the source tree: every file path with its
/// modification time and size, sorted. Unreadable entries are treated as
/// absent.
fn fingerprint(dir: &Path) -> Vec<(PathBuf, SystemTime, u64)> {
    let mut entries = Vec::new();
    collect(dir, &mut entries);
    entries.sort();
    entries
}

fn collect(dir: &Path, out: &mut Vec<(PathBuf, SystemTime, u64)>) {
    let Ok(read) = fs::read_dir(dir) else {
        return;
    };

    for entry in read.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(&path, out);
        } else if let Ok(meta) = entry.metadata() {
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push((path, modified, meta.len()));
        }
    }
}
