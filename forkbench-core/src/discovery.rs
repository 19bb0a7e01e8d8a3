//! Benchmark Discovery
//!
//! A benchmark file is a registration function collected at link time.
//! Loading it runs the function against a [`DiscoveryContext`], which keeps
//! the stack of groups currently open. Each `register_*` call attaches a node
//! under the top of that stack, so the tree mirrors the nesting of the calls.
//!
//! ```ignore
//! fn sorting(ctx: &mut DiscoveryContext) {
//!     ctx.group("vec", |ctx| {
//!         ctx.benchmark("sort", || data.clone().sort());
//!     });
//! }
//! forkbench::bench_file!(sorting);
//! ```

use crate::options::PartialOptions;
use crate::panic_message;
use crate::tree::{Benchmark, Group, Hook, LocalBoxFuture, Node, Routine};
use forkbench_ipc::BenchmarkOptions;
use std::collections::HashSet;
use std::future::Future;
use std::hint::black_box;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

/// A registered benchmark file
#[derive(Debug)]
pub struct BenchFile {
    /// Root of every id declared by the file
    pub path: &'static str,
    /// Registration function
    pub body: fn(&mut DiscoveryContext),
}

inventory::collect!(BenchFile);

impl BenchFile {
    /// Create a file entry (used by `bench_file!`)
    pub const fn new(path: &'static str, body: fn(&mut DiscoveryContext)) -> Self {
        Self { path, body }
    }

    /// Every file linked into this binary, sorted by path
    pub fn all() -> Vec<&'static BenchFile> {
        let mut files: Vec<&'static BenchFile> = inventory::iter::<BenchFile>.into_iter().collect();
        files.sort_by_key(|file| file.path);
        files
    }

    /// Look up a file by its registered path
    pub fn find(path: &str) -> Option<&'static BenchFile> {
        inventory::iter::<BenchFile>
            .into_iter()
            .find(|file| file.path == path)
    }
}

/// Errors that abort discovery of one file
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscoveryError {
    /// A group or file body panicked
    #[error("benchmark file '{file}' panicked during registration: {message}")]
    BodyPanicked {
        /// Registered file path
        file: String,
        /// Panic payload
        message: String,
    },

    /// Two nodes of one file share an id
    #[error("benchmark file '{file}' registers '{id}' more than once")]
    DuplicateId {
        /// Registered file path
        file: String,
        /// The repeated id
        id: String,
    },

    /// No file with this path was linked into the binary
    #[error("no benchmark file registered as '{0}'")]
    UnknownFile(String),
}

/// Registration state for one discovery pass
pub struct DiscoveryContext {
    base: BenchmarkOptions,
    path: Vec<Group>,
    seen: HashSet<String>,
    duplicate: Option<String>,
}

impl Default for DiscoveryContext {
    fn default() -> Self {
        Self::new(BenchmarkOptions::default())
    }
}

impl DiscoveryContext {
    /// Context whose root groups resolve to `base`
    pub fn new(base: BenchmarkOptions) -> Self {
        Self {
            base,
            path: Vec::new(),
            seen: HashSet::new(),
            duplicate: None,
        }
    }

    /// Load a registered file
    pub fn load_file(&mut self, file: &BenchFile) -> Result<Group, DiscoveryError> {
        self.load(file.path, file.body)
    }

    /// Run `body` under a fresh root group named `path` and return the root
    pub fn load(
        &mut self,
        path: &str,
        body: impl FnOnce(&mut DiscoveryContext),
    ) -> Result<Group, DiscoveryError> {
        self.path.clear();
        self.seen.clear();
        self.duplicate = None;
        debug!(file = path, "loading benchmark file");

        self.path
            .push(Group::new(path.to_string(), path, path, self.base));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(self)));
        let root = self.path.drain(..).next();

        if let Err(payload) = outcome {
            return Err(DiscoveryError::BodyPanicked {
                file: path.to_string(),
                message: panic_message(payload.as_ref()),
            });
        }
        if let Some(id) = self.duplicate.take() {
            return Err(DiscoveryError::DuplicateId {
                file: path.to_string(),
                id,
            });
        }

        let mut root = root.ok_or_else(|| DiscoveryError::UnknownFile(path.to_string()))?;
        root.inherit_hooks();
        Ok(root)
    }

    /// Register a group, run `body` inside it, then close it
    pub fn register_group(
        &mut self,
        name: &str,
        options: PartialOptions,
        body: impl FnOnce(&mut DiscoveryContext),
    ) {
        let Some((id, filename, resolved)) = self.child_identity(name, &options) else {
            return;
        };
        debug!(%id, "registering group");

        self.path.push(Group::new(id, name, &filename, resolved));
        body(self);

        if let Some(mut group) = self.path.pop() {
            group.inherit_hooks();
            if let Some(parent) = self.path.last_mut() {
                parent.children.push(Node::Group(group));
            }
        }
    }

    /// Register a benchmark under the current group
    pub fn register_benchmark(&mut self, name: &str, options: PartialOptions, routine: Routine) {
        let Some((id, filename, resolved)) = self.child_identity(name, &options) else {
            return;
        };
        debug!(%id, is_async = routine.is_async(), "registering benchmark");

        let bench = Benchmark::new(id, name, &filename, resolved, routine);
        if let Some(parent) = self.path.last_mut() {
            parent.children.push(Node::Benchmark(bench));
        }
    }

    /// [`register_group`](Self::register_group) without options
    pub fn group(&mut self, name: &str, body: impl FnOnce(&mut DiscoveryContext)) {
        self.register_group(name, PartialOptions::new(), body);
    }

    /// [`register_group`](Self::register_group) with options
    pub fn group_with(
        &mut self,
        name: &str,
        options: PartialOptions,
        body: impl FnOnce(&mut DiscoveryContext),
    ) {
        self.register_group(name, options, body);
    }

    /// Register a synchronous benchmark
    pub fn benchmark<F, T>(&mut self, name: &str, f: F)
    where
        F: FnMut() -> T + 'static,
    {
        self.benchmark_with(name, PartialOptions::new(), f);
    }

    /// Register a synchronous benchmark with options
    pub fn benchmark_with<F, T>(&mut self, name: &str, options: PartialOptions, mut f: F)
    where
        F: FnMut() -> T + 'static,
    {
        let routine = Routine::Sync(Box::new(move || {
            black_box(f());
        }));
        self.register_benchmark(name, options, routine);
    }

    /// Register a benchmark whose every invocation is awaited
    pub fn benchmark_async<F, Fut>(&mut self, name: &str, f: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future + 'static,
    {
        self.benchmark_async_with(name, PartialOptions::new(), f);
    }

    /// Register an async benchmark with options
    pub fn benchmark_async_with<F, Fut>(&mut self, name: &str, options: PartialOptions, mut f: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future + 'static,
    {
        let routine = Routine::Async(Box::new(move || -> LocalBoxFuture {
            let fut = f();
            Box::pin(async move {
                black_box(fut.await);
            })
        }));
        self.register_benchmark(name, options, routine);
    }

    /// Run `f` before every benchmark below the current group
    pub fn setup(&mut self, f: impl Fn() + 'static) {
        match self.path.last_mut() {
            Some(group) => group.setups.push(Rc::new(f) as Hook),
            None => warn!("setup registered outside of a benchmark file; ignoring"),
        }
    }

    /// Run `f` after every benchmark below the current group
    pub fn teardown(&mut self, f: impl Fn() + 'static) {
        match self.path.last_mut() {
            Some(group) => group.teardowns.push(Rc::new(f) as Hook),
            None => warn!("teardown registered outside of a benchmark file; ignoring"),
        }
    }

    /// Id, file and resolved options of a new child of the current group
    fn child_identity(
        &mut self,
        name: &str,
        options: &PartialOptions,
    ) -> Option<(String, String, BenchmarkOptions)> {
        let Some(parent) = self.path.last() else {
            warn!(name, "registration outside of a benchmark file; ignoring");
            return None;
        };
        let id = format!("{}:{}", parent.id, name);
        let filename = parent.filename.clone();
        let resolved = options.resolve(&parent.options);

        if !self.seen.insert(id.clone()) && self.duplicate.is_none() {
            self.duplicate = Some(id.clone());
        }
        Some((id, filename, resolved))
    }
}

/// Load every registered file, in path order.
///
/// A failing file is reported and skipped; it never hides the others.
pub fn discover_all(base: BenchmarkOptions) -> (Vec<Group>, Vec<(String, DiscoveryError)>) {
    let mut roots = Vec::new();
    let mut failures = Vec::new();
    for file in BenchFile::all() {
        let mut ctx = DiscoveryContext::new(base);
        match ctx.load_file(file) {
            Ok(root) => roots.push(root),
            Err(e) => {
                warn!(file = file.path, error = %e, "discovery failed");
                failures.push((file.path.to_string(), e));
            }
        }
    }
    (roots, failures)
}
