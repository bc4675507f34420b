use crate::crawl::prune::PruneRules;
use crate::crawl::visited::{DirKey, VisitedSet};
use crate::crawl::{CrawlOptions, CrawlReport};
use crate::error::Error;
use crate::index::types::IndexedPath;
use ignore::{DirEntry, ParallelVisitor, ParallelVisitorBuilder, WalkBuilder, WalkState};
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::{Mutex, PoisonError};

/// Entries buffered per walker thread before they are sent
const BATCH_SIZE: usize = 4096;

#[derive(Debug, Default)]
struct Counters {
    entries: AtomicUsize,
    directories: AtomicUsize,
    entry_errors: AtomicUsize,
    pruned: AtomicUsize,
    links_followed: AtomicUsize,
    links_skipped: AtomicUsize,
}

/// State shared by every worker of one crawl
pub(crate) struct WalkContext {
    options: CrawlOptions,
    prune: PruneRules,
    tx: SyncSender<Vec<IndexedPath>>,
    /// Set once the consumer dropped its end of the channel
    disconnected: AtomicBool,
    counters: Counters,
    root_errors: Mutex<Vec<Error>>,
    roots: Mutex<Vec<PathBuf>>,
}

impl WalkContext {
    pub(crate) fn new(options: CrawlOptions, prune: PruneRules, tx: SyncSender<Vec<IndexedPath>>) -> Self {
        Self {
            options,
            prune,
            tx,
            disconnected: AtomicBool::new(false),
            counters: Counters::default(),
            root_errors: Mutex::new(Vec::new()),
            roots: Mutex::new(Vec::new()),
        }
    }

    /// Walk every root in turn, each with its own visited set
    pub(crate) fn walk_roots(&self, roots: &[PathBuf]) {
        for root in roots {
            if self.should_stop() {
                return;
            }
            self.walk_root(root);
        }
    }

    fn walk_root(&self, root: &Path) {
        let root = match std::path::absolute(root) {
            Ok(root) => root,
            Err(e) => return self.root_error(root, e),
        };

        let meta = match fs::metadata(&root) {
            Ok(meta) => meta,
            Err(e) => return self.root_error(&root, e),
        };

        if !meta.is_dir() {
            self.opened(&root);
            self.emit(vec![IndexedPath::new(path_string(&root))]);
            return;
        }

        // An unreadable root is a root failure, not a skipped entry
        if let Err(e) = fs::read_dir(&root) {
            return self.root_error(&root, e);
        }

        let walk = RootWalk {
            ctx: self,
            visited: VisitedSet::new(),
            deferred: Mutex::new(Vec::new()),
        };
        match DirKey::new(&root, &meta) {
            Ok(key) => {
                walk.visited.insert(key);
            }
            Err(e) => return self.root_error(&root, e),
        }

        let is_link = fs::symlink_metadata(&root).is_ok_and(|m| m.file_type().is_symlink());
        let actual = if is_link {
            match fs::canonicalize(&root) {
                Ok(target) => target,
                Err(e) => return self.root_error(&root, e),
            }
        } else {
            root.clone()
        };

        tracing::debug!(root = %root.display(), "crawling root");
        self.opened(&root);

        walk.walk_tree(&Tree {
            shown: root,
            actual,
            link_depth: 0,
            via_link: false,
        });
        walk.follow_deferred_links();
    }

    fn should_stop(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
            || self
                .options
                .cancel
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn emit(&self, batch: Vec<IndexedPath>) {
        if batch.is_empty() || self.disconnected.load(Ordering::Relaxed) {
            return;
        }
        self.counters.entries.fetch_add(batch.len(), Ordering::Relaxed);
        if self.tx.send(batch).is_err() {
            self.disconnected.store(true, Ordering::Relaxed);
        }
    }

    fn opened(&self, root: &Path) {
        self.roots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(root.to_path_buf());
    }

    fn root_error(&self, root: &Path, e: io::Error) {
        tracing::warn!(root = %root.display(), error = %e, "cannot crawl root, skipping");
        self.root_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Error::crawl(root, e));
    }

    fn entry_error(&self, path: &Path, e: &io::Error) {
        tracing::debug!(path = %path.display(), error = %e, "skipping unreadable entry");
        self.counters.entry_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn walk_error(&self, e: &ignore::Error) {
        tracing::debug!(error = %e, "skipping unreadable entry");
        self.counters.entry_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn into_report(self) -> CrawlReport {
        let cancelled = self
            .options
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        let mut roots = self.roots.into_inner().unwrap_or_else(PoisonError::into_inner);
        roots.sort();

        CrawlReport {
            entries: self.counters.entries.into_inner(),
            directories: self.counters.directories.into_inner(),
            entry_errors: self.counters.entry_errors.into_inner(),
            pruned: self.counters.pruned.into_inner(),
            links_followed: self.counters.links_followed.into_inner(),
            links_skipped: self.counters.links_skipped.into_inner(),
            root_errors: self
                .root_errors
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            roots,
            cancelled,
        }
    }
}

/// Symlinked directory waiting to be descended
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct DeferredLink {
    path: PathBuf,
    depth: u32,
}

/// One walker run: the directory actually read and the path it is
/// reported under
struct Tree {
    shown: PathBuf,
    actual: PathBuf,
    link_depth: u32,
    /// The top of the tree was already recorded as a symlink
    via_link: bool,
}

impl Tree {
    fn shown_path<'p>(&self, path: &'p Path) -> Cow<'p, Path> {
        if self.shown == self.actual {
            return Cow::Borrowed(path);
        }
        match path.strip_prefix(&self.actual) {
            Ok(rel) if rel.as_os_str().is_empty() => Cow::Owned(self.shown.clone()),
            Ok(rel) => Cow::Owned(self.shown.join(rel)),
            Err(_) => Cow::Borrowed(path),
        }
    }
}

/// Traversal of a single root
struct RootWalk<'a> {
    ctx: &'a WalkContext,
    visited: VisitedSet,
    deferred: Mutex<Vec<DeferredLink>>,
}

impl RootWalk<'_> {
    /// Run the parallel walker over one tree. Hidden and ignored files are
    /// indexed like any other, and symlinks are never followed here.
    fn walk_tree(&self, tree: &Tree) {
        let walker = WalkBuilder::new(&tree.actual)
            .standard_filters(false)
            .follow_links(false)
            .threads(self.ctx.options.threads)
            .build_parallel();
        walker.visit(&mut TreeVisitorBuilder { walk: self, tree });
    }

    /// Remember a real directory so a symlink into it is not walked again.
    /// The directory itself is always descended; two real paths to one
    /// directory (a bind mount) are both indexed.
    fn mark_visited(&self, entry: &DirEntry) {
        let key = entry
            .metadata()
            .map_err(|e| e.into_io_error().unwrap_or_else(|| io::Error::other("no metadata")))
            .and_then(|meta| DirKey::new(entry.path(), &meta));
        match key {
            Ok(key) => {
                self.visited.insert(key);
            }
            Err(e) => tracing::trace!(path = %entry.path().display(), error = %e, "no directory identity"),
        }
    }

    fn defer_link(&self, path: PathBuf, link_depth: u32) {
        let ctx = self.ctx;
        if ctx.prune.is_pruned(&path) {
            ctx.counters.pruned.fetch_add(1, Ordering::Relaxed);
        } else if link_depth < ctx.options.max_link_depth {
            self.deferred
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(DeferredLink {
                    path,
                    depth: link_depth + 1,
                });
        } else {
            ctx.counters.links_skipped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Descend symlinked directories once the real tree is done.
    /// Links are taken in sorted order, one at a time, so the same
    /// filesystem always yields the same set of paths.
    fn follow_deferred_links(&self) {
        let ctx = self.ctx;
        loop {
            let mut pending = std::mem::take(
                &mut *self
                    .deferred
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() || ctx.should_stop() {
                return;
            }
            pending.sort();

            for link in pending {
                if ctx.should_stop() {
                    return;
                }
                let meta = match fs::metadata(&link.path) {
                    Ok(meta) => meta,
                    Err(e) => {
                        tracing::trace!(path = %link.path.display(), error = %e, "dangling symlink");
                        continue;
                    }
                };
                if !meta.is_dir() {
                    continue;
                }
                let key = match DirKey::new(&link.path, &meta) {
                    Ok(key) => key,
                    Err(e) => {
                        ctx.entry_error(&link.path, &e);
                        continue;
                    }
                };
                if !self.visited.insert(key) {
                    tracing::trace!(path = %link.path.display(), "symlink target already visited");
                    ctx.counters.links_skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let actual = match fs::canonicalize(&link.path) {
                    Ok(actual) => actual,
                    Err(e) => {
                        ctx.entry_error(&link.path, &e);
                        continue;
                    }
                };

                ctx.counters.links_followed.fetch_add(1, Ordering::Relaxed);
                self.walk_tree(&Tree {
                    shown: link.path,
                    actual,
                    link_depth: link.depth,
                    via_link: true,
                });
            }
        }
    }
}

struct TreeVisitorBuilder<'s> {
    walk: &'s RootWalk<'s>,
    tree: &'s Tree,
}

impl<'s> ParallelVisitorBuilder<'s> for TreeVisitorBuilder<'s> {
    fn build(&mut self) -> Box<dyn ParallelVisitor + 's> {
        Box::new(TreeVisitor {
            walk: self.walk,
            tree: self.tree,
            batch: Vec::new(),
        })
    }
}

/// Per-thread visitor; its batch is flushed when full and on drop
struct TreeVisitor<'s> {
    walk: &'s RootWalk<'s>,
    tree: &'s Tree,
    batch: Vec<IndexedPath>,
}

impl TreeVisitor<'_> {
    fn flush(&mut self) {
        self.walk.ctx.emit(std::mem::take(&mut self.batch));
    }
}

impl ParallelVisitor for TreeVisitor<'_> {
    fn visit(&mut self, entry: Result<DirEntry, ignore::Error>) -> WalkState {
        let walk = self.walk;
        let ctx = walk.ctx;
        if ctx.should_stop() {
            return WalkState::Quit;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                ctx.walk_error(&e);
                return WalkState::Continue;
            }
        };

        let is_top = entry.depth() == 0;
        let path = self.tree.shown_path(entry.path());
        if !(is_top && self.tree.via_link) {
            self.batch.push(IndexedPath::new(path_string(&path)));
        }

        let mut state = WalkState::Continue;
        match entry.file_type() {
            Some(ft) if ft.is_dir() => {
                if !is_top && ctx.prune.is_pruned(&path) {
                    ctx.counters.pruned.fetch_add(1, Ordering::Relaxed);
                    state = WalkState::Skip;
                } else {
                    ctx.counters.directories.fetch_add(1, Ordering::Relaxed);
                    if ctx.options.follow_symlinks && !is_top {
                        walk.mark_visited(&entry);
                    }
                }
            }
            Some(ft) if ft.is_symlink() && ctx.options.follow_symlinks => {
                walk.defer_link(path.into_owned(), self.tree.link_depth);
            }
            _ => {}
        }

        if self.batch.len() >= BATCH_SIZE {
            self.flush();
            if ctx.should_stop() {
                return WalkState::Quit;
            }
        }
        state
    }
}

impl Drop for TreeVisitor<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
