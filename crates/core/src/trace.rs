//! # Trace Trees
//!
//! A `TraceNode` is one measured span: a name, when it started relative to
//! the root of its tree, and how long it lasted. Profiling observers build
//! one tree per net run, with the net at the root and one child per
//! operator run.
//!
//! Offsets make concurrent runs readable: children of a DAG run overlap, so
//! their durations can add up to more than the parent's.
//!
//! ```text
//! net 12ms
//! ├─ load +0ns 4ms
//! ├─ left +4ms 8ms
//! └─ right +4ms 7ms
//! ```

use std::fmt::{self, Write};
use std::time::Duration;

/// A measured span and the spans nested in it.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceNode {
    pub name: String,
    /// Start, relative to the start of the root span.
    pub offset: Duration,
    pub duration: Duration,
    pub children: Vec<TraceNode>,
}

impl TraceNode {
    /// A span starting at offset zero.
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            offset: Duration::ZERO,
            duration,
            children: Vec::new(),
        }
    }

    /// Move the span to start at `offset`.
    pub fn at(mut self, offset: Duration) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_children(mut self, children: Vec<TraceNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Offset at which the span finished.
    pub fn end(&self) -> Duration {
        self.offset + self.duration
    }

    /// Sum of the direct children's durations.
    ///
    /// Under concurrent execution this can exceed `duration`.
    pub fn children_duration(&self) -> Duration {
        self.children.iter().map(|c| c.duration).sum()
    }

    /// Largest number of direct children running at the same instant.
    ///
    /// A child ending exactly when another starts does not overlap it.
    pub fn peak_concurrency(&self) -> usize {
        let mut edges: Vec<(Duration, i64)> = self
            .children
            .iter()
            .flat_map(|c| [(c.offset, 1), (c.end(), -1)])
            .collect();
        // Ends sort before starts at the same instant.
        edges.sort_unstable();

        let (mut live, mut peak) = (0i64, 0i64);
        for (_, delta) in edges {
            live += delta;
            peak = peak.max(live);
        }
        peak as usize
    }

    /// First span (depth-first, self included) with the given name.
    pub fn find(&self, name: &str) -> Option<&TraceNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Render the tree, one span per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} {:?}", self.name, self.duration);
        self.render_children(&mut out, "");
        out
    }

    fn render_children(&self, out: &mut String, prefix: &str) {
        let last = self.children.len().saturating_sub(1);
        for (i, child) in self.children.iter().enumerate() {
            let (branch, indent) = if i == last {
                ("└─ ", "   ")
            } else {
                ("├─ ", "│  ")
            };
            let _ = writeln!(
                out,
                "{prefix}{branch}{} +{:?} {:?}",
                child.name, child.offset, child.duration
            );
            child.render_children(out, &format!("{prefix}{indent}"));
        }
    }
}

impl fmt::Display for TraceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
