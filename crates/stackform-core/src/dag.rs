//! Dependency ordering for emission
//!
//! Kahn's algorithm over the declaration graph with:
//! - Cycle detection with a per-resource explanation
//! - Stable sort (preserves declaration order when no dependency relationship)
//!
//! Edges come from two places: declared references (source depends on target)
//! and config linkages (route methods, schedule targets, execution roles,
//! placeholder tokens). Leaves -- tables, roles, buckets -- therefore always
//! emit before the functions, routes, and rules that use them.

use std::collections::BinaryHeap;

use crate::error::ComposeError;
use crate::graph::StackGraph;
use crate::resolver::config_dependencies;

/// Wrapper for BinaryHeap to get min-heap behavior (stable sort by decl_index)
#[derive(Debug, Eq, PartialEq)]
struct MinHeapEntry {
    decl_index: usize,
    node: usize,
}

impl Ord for MinHeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering for min-heap
        other
            .decl_index
            .cmp(&self.decl_index)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for MinHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Compute the emission order as indices into the graph's resource arena
///
/// # Algorithm
///
/// 1. Build adjacency from dependency to dependent
/// 2. Run Kahn's algorithm with a min-heap keyed on declaration index
/// 3. If not every node was emitted, the remainder forms a cycle
///
/// Dependencies on ids the graph does not contain produce no edge here; the
/// resolver owns that failure mode and reports it as `UnknownResource`.
pub fn emission_order(graph: &StackGraph) -> Result<Vec<usize>, ComposeError> {
    let n = graph.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    // adj[i] = nodes that depend on node i (i must come before them)
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree: Vec<usize> = vec![0; n];

    // A self-edge is kept: it pins in_degree above zero forever, so a
    // resource depending on itself is reported as a cycle like any other.
    fn add_edge(adj: &mut [Vec<usize>], in_degree: &mut [usize], dep: usize, node: usize) {
        if !adj[dep].contains(&node) {
            adj[dep].push(node);
            in_degree[node] += 1;
        }
    }

    for (node, descriptor) in graph.resources().iter().enumerate() {
        for dep_id in config_dependencies(descriptor) {
            if let Some(dep) = graph.index_of(&dep_id) {
                add_edge(&mut adj, &mut in_degree, dep, node);
            }
        }
    }
    for reference in graph.references() {
        if let (Some(node), Some(dep)) = (
            graph.index_of(&reference.source_id),
            graph.index_of(&reference.target_id),
        ) {
            add_edge(&mut adj, &mut in_degree, dep, node);
        }
    }

    // Kahn's algorithm; always pick the lowest declaration index available so
    // independent resources keep their declared order.
    let mut heap: BinaryHeap<MinHeapEntry> = BinaryHeap::new();
    for (node, &degree) in in_degree.iter().enumerate() {
        if degree == 0 {
            heap.push(MinHeapEntry {
                decl_index: node,
                node,
            });
        }
    }

    let mut order: Vec<usize> = Vec::with_capacity(n);
    while let Some(entry) = heap.pop() {
        let node = entry.node;
        order.push(node);

        for &next in &adj[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                heap.push(MinHeapEntry {
                    decl_index: next,
                    node: next,
                });
            }
        }
    }

    if order.len() != n {
        let remaining: Vec<usize> = (0..n).filter(|i| !order.contains(i)).collect();
        let mut explanation = String::new();
        for &node in &remaining {
            let descriptor = &graph.resources()[node];
            explanation.push_str(&format!(
                "  --> {} '{}'\n",
                descriptor.kind(),
                descriptor.id
            ));
        }
        explanation.push_str("these resources depend on each other in a cycle");
        return Err(ComposeError::CyclicDependency { explanation });
    }

    Ok(order)
}
