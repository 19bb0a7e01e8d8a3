//! Tree view of discovered benchmarks.

use crate::exporter::Exporter;
use forkbench_core::{Group, Node};
use std::io::{self, Write};

/// Prints the discovered tree as soon as discovery completes
pub struct HierarchyExporter<W: Write = io::Stdout> {
    out: W,
}

impl HierarchyExporter<io::Stdout> {
    /// Exporter printing to stdout
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for HierarchyExporter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> HierarchyExporter<W> {
    /// Exporter printing to `out`
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Exporter for HierarchyExporter<W> {
    fn on_hierarchy(&mut self, roots: &[Group]) {
        let tree = render_tree(roots);
        if let Err(e) = self.out.write_all(tree.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to print benchmark tree: {}", e);
        }
    }
}

/// Render root groups as an indented tree, one file per root
pub fn render_tree(roots: &[Group]) -> String {
    let mut out = String::new();
    for root in roots {
        out.push_str(&format!("{} ({} benchmarks)\n", root.name, root.benchmark_count()));
        render_children(&root.children, "", &mut out);
    }
    out
}

fn render_children(children: &[Node], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let branch = if last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(child.name());
        out.push('\n');
        if let Node::Group(group) = child {
            let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
            render_children(&group.children, &nested, out);
        }
    }
}
