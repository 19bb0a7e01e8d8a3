//! Benchmark Tree
//!
//! Groups and benchmarks produced by one discovery pass. Every node carries
//! its colon-joined id, its name, the file it was declared in and its fully
//! resolved options.

use forkbench_ipc::{BenchmarkOptions, BenchmarkResult};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

/// Future returned by one invocation of an async benchmark
pub type LocalBoxFuture = Pin<Box<dyn Future<Output = ()>>>;

/// Setup or teardown hook
pub type Hook = Rc<dyn Fn()>;

/// The code under measurement
pub enum Routine {
    /// Runs to completion on every call
    Sync(Box<dyn FnMut()>),
    /// Produces a future that is awaited before the next call
    Async(Box<dyn FnMut() -> LocalBoxFuture>),
}

impl Routine {
    /// Whether invocations must be awaited
    pub fn is_async(&self) -> bool {
        matches!(self, Routine::Async(_))
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Routine::Sync(_) => f.write_str("Routine::Sync"),
            Routine::Async(_) => f.write_str("Routine::Async"),
        }
    }
}

/// Either kind of tree node
#[derive(Debug)]
pub enum Node {
    /// A named container
    Group(Group),
    /// A measurable leaf
    Benchmark(Benchmark),
}

impl Node {
    /// Colon-joined path from the file root
    pub fn id(&self) -> &str {
        match self {
            Node::Group(group) => &group.id,
            Node::Benchmark(bench) => &bench.id,
        }
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        match self {
            Node::Group(group) => &group.name,
            Node::Benchmark(bench) => &bench.name,
        }
    }

    /// Registered path of the declaring file
    pub fn filename(&self) -> &str {
        match self {
            Node::Group(group) => &group.filename,
            Node::Benchmark(bench) => &bench.filename,
        }
    }

    /// Resolved options
    pub fn options(&self) -> &BenchmarkOptions {
        match self {
            Node::Group(group) => &group.options,
            Node::Benchmark(bench) => &bench.options,
        }
    }
}

/// A named container of benchmarks and nested groups
pub struct Group {
    /// Colon-joined path from the file root
    pub id: String,
    /// Group name (the file path for a root group)
    pub name: String,
    /// Registered path of the declaring file
    pub filename: String,
    /// Resolved options, inherited by every child
    pub options: BenchmarkOptions,
    /// Children in registration order
    pub children: Vec<Node>,
    pub(crate) setups: Vec<Hook>,
    pub(crate) teardowns: Vec<Hook>,
}

impl Group {
    pub(crate) fn new(id: String, name: &str, filename: &str, options: BenchmarkOptions) -> Self {
        Self {
            id,
            name: name.to_string(),
            filename: filename.to_string(),
            options,
            children: Vec::new(),
            setups: Vec::new(),
            teardowns: Vec::new(),
        }
    }

    /// All benchmarks below this group, depth first in registration order
    pub fn benchmarks(&self) -> Vec<&Benchmark> {
        let mut found = Vec::new();
        collect(self, &mut found);
        found
    }

    /// Number of benchmarks below this group
    pub fn benchmark_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                Node::Group(group) => group.benchmark_count(),
                Node::Benchmark(_) => 1,
            })
            .sum()
    }

    /// Locate a benchmark by id
    pub fn find_benchmark(&self, id: &str) -> Option<&Benchmark> {
        self.benchmarks().into_iter().find(|bench| bench.id == id)
    }

    /// Locate a benchmark by id for measurement
    pub fn find_benchmark_mut(&mut self, id: &str) -> Option<&mut Benchmark> {
        for child in &mut self.children {
            match child {
                Node::Benchmark(bench) if bench.id == id => return Some(bench),
                Node::Group(group) if id.starts_with(group.id.as_str()) => {
                    if let Some(bench) = group.find_benchmark_mut(id) {
                        return Some(bench);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Give every descendant benchmark this group's hooks: setups in front
    /// of its own, teardowns after them.
    pub(crate) fn inherit_hooks(&mut self) {
        if self.setups.is_empty() && self.teardowns.is_empty() {
            return;
        }
        let setups = self.setups.clone();
        let teardowns = self.teardowns.clone();
        self.visit_benchmarks_mut(&mut |bench| {
            bench.setups.splice(0..0, setups.iter().cloned());
            bench.teardowns.extend(teardowns.iter().cloned());
        });
    }

    fn visit_benchmarks_mut(&mut self, visit: &mut dyn FnMut(&mut Benchmark)) {
        for child in &mut self.children {
            match child {
                Node::Group(group) => group.visit_benchmarks_mut(visit),
                Node::Benchmark(bench) => visit(bench),
            }
        }
    }
}

fn collect<'a>(group: &'a Group, found: &mut Vec<&'a Benchmark>) {
    for child in &group.children {
        match child {
            Node::Group(nested) => collect(nested, found),
            Node::Benchmark(bench) => found.push(bench),
        }
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("children", &self.children)
            .field("setups", &self.setups.len())
            .field("teardowns", &self.teardowns.len())
            .finish()
    }
}

/// A measurable leaf
pub struct Benchmark {
    /// Colon-joined path from the file root
    pub id: String,
    /// Benchmark name
    pub name: String,
    /// Registered path of the declaring file
    pub filename: String,
    /// Resolved options
    pub options: BenchmarkOptions,
    /// Code under measurement
    pub routine: Routine,
    /// Set once the benchmark has been measured
    pub result: Option<BenchmarkResult>,
    pub(crate) setups: Vec<Hook>,
    pub(crate) teardowns: Vec<Hook>,
}

impl Benchmark {
    pub(crate) fn new(
        id: String,
        name: &str,
        filename: &str,
        options: BenchmarkOptions,
        routine: Routine,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            filename: filename.to_string(),
            options,
            routine,
            result: None,
            setups: Vec::new(),
            teardowns: Vec::new(),
        }
    }

    /// Run inherited setups, outermost group first
    pub fn run_setups(&self) {
        for hook in &self.setups {
            hook();
        }
    }

    /// Run inherited teardowns, innermost group first
    pub fn run_teardowns(&self) {
        for hook in &self.teardowns {
            hook();
        }
    }
}

impl fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Benchmark")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("routine", &self.routine)
            .field("measured", &self.result.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn leaf(id: &str) -> Benchmark {
        let name = id.rsplit(':').next().unwrap_or(id);
        Benchmark::new(
            id.to_string(),
            name,
            "f.rs",
            BenchmarkOptions::default(),
            Routine::Sync(Box::new(|| {})),
        )
    }

    fn sample_tree() -> Group {
        let mut inner = Group::new("f.rs:a:b".into(), "b", "f.rs", BenchmarkOptions::default());
        inner.children.push(Node::Benchmark(leaf("f.rs:a:b:c")));
        let mut outer = Group::new("f.rs:a".into(), "a", "f.rs", BenchmarkOptions::default());
        outer.children.push(Node::Benchmark(leaf("f.rs:a:first")));
        outer.children.push(Node::Group(inner));
        let mut root = Group::new("f.rs".into(), "f.rs", "f.rs", BenchmarkOptions::default());
        root.children.push(Node::Group(outer));
        root.children.push(Node::Benchmark(leaf("f.rs:last")));
        root
    }

    #[test]
    fn test_depth_first_order() {
        let root = sample_tree();
        let ids: Vec<&str> = root.benchmarks().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["f.rs:a:first", "f.rs:a:b:c", "f.rs:last"]);
        assert_eq!(root.benchmark_count(), 3);
    }

    #[test]
    fn test_find_benchmark() {
        let mut root = sample_tree();
        assert_eq!(root.find_benchmark("f.rs:a:b:c").map(|b| b.name.as_str()), Some("c"));
        assert!(root.find_benchmark("f.rs:a:b").is_none());

        let bench = root.find_benchmark_mut("f.rs:last").unwrap();
        bench.options.min_samples = 9;
        assert_eq!(root.find_benchmark("f.rs:last").unwrap().options.min_samples, 9);
        assert!(root.find_benchmark_mut("f.rs:missing").is_none());
    }

    #[test]
    fn test_node_accessors() {
        let node = Node::Benchmark(leaf("f.rs:x"));
        assert_eq!(node.id(), "f.rs:x");
        assert_eq!(node.name(), "x");
        assert_eq!(node.filename(), "f.rs");
        assert_eq!(node.options(), &BenchmarkOptions::default());
        assert!(!matches!(node, Node::Group(_)));
    }

    #[test]
    fn test_inherit_hooks_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hook = |label: &'static str| -> Hook {
            let log = Rc::clone(&log);
            Rc::new(move || log.borrow_mut().push(label))
        };

        let mut inner = Group::new("f.rs:a:b".into(), "b", "f.rs", BenchmarkOptions::default());
        inner.children.push(Node::Benchmark(leaf("f.rs:a:b:c")));
        inner.setups.push(hook("b-setup"));
        inner.teardowns.push(hook("b-teardown"));
        inner.inherit_hooks();

        let mut outer = Group::new("f.rs:a".into(), "a", "f.rs", BenchmarkOptions::default());
        outer.children.push(Node::Group(inner));
        outer.setups.push(hook("a-setup"));
        outer.teardowns.push(hook("a-teardown"));
        outer.inherit_hooks();

        let bench = outer.find_benchmark("f.rs:a:b:c").unwrap();
        bench.run_setups();
        bench.run_teardowns();
        assert_eq!(
            *log.borrow(),
            ["a-setup", "b-setup", "b-teardown", "a-teardown"]
        );
    }
}
