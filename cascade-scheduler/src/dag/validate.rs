//! DAG validation
//!
//! Pure, side-effect-free checks over a graph snapshot, so edits can be
//! validated speculatively before committing. Cycle detection is a
//! three-color depth-first traversal that reports the minimal cycle path;
//! the topological order comes from Kahn's algorithm with an ascending-id
//! tie-break and cross-checks the DFS verdict.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use uuid::Uuid;

use crate::dag::graph::WorkflowGraph;
use crate::error::DagViolation;

#[derive(Clone, Copy, PartialEq)]
enum Color {
    InProgress,
    Done,
}

/// Finds a cycle if one exists, returning the nodes along it in edge order.
///
/// Any edge into an in-progress node during the traversal signals a cycle;
/// the reported path is the segment of the DFS stack from that node back to
/// the current one, i.e. the minimal cycle through the back-edge.
pub fn find_cycle(graph: &WorkflowGraph) -> Option<Vec<Uuid>> {
    let mut colors: HashMap<Uuid, Color> = HashMap::new();
    let mut path: Vec<Uuid> = Vec::new();

    for start in graph.job_ids() {
        if colors.contains_key(&start) {
            continue;
        }
        if let Some(cycle) = dfs(graph, start, &mut colors, &mut path) {
            return Some(cycle);
        }
    }
    None
}

fn dfs(
    graph: &WorkflowGraph,
    node: Uuid,
    colors: &mut HashMap<Uuid, Color>,
    path: &mut Vec<Uuid>,
) -> Option<Vec<Uuid>> {
    colors.insert(node, Color::InProgress);
    path.push(node);

    for child in graph.children_of(node) {
        match colors.get(&child) {
            Some(Color::InProgress) => {
                let start = path.iter().position(|&n| n == child)?;
                return Some(path[start..].to_vec());
            }
            Some(Color::Done) => {}
            None => {
                if let Some(cycle) = dfs(graph, child, colors, path) {
                    return Some(cycle);
                }
            }
        }
    }

    path.pop();
    colors.insert(node, Color::Done);
    None
}

/// Topological order via Kahn's algorithm.
///
/// Zero-in-degree nodes are removed in ascending-id order, so the result is
/// identical across repeated calls on an unchanged graph. Nodes remaining
/// after no removable node exists mean a cycle; the DFS detector supplies
/// the diagnostic path.
pub fn topological_order(graph: &WorkflowGraph) -> Result<Vec<Uuid>, DagViolation> {
    let mut in_degree: HashMap<Uuid, usize> = graph
        .job_ids()
        .map(|id| (id, graph.in_degree(id)))
        .collect();

    let mut heap: BinaryHeap<Reverse<Uuid>> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&id, _)| Reverse(id))
        .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(Reverse(node)) = heap.pop() {
        order.push(node);
        for child in graph.children_of(node) {
            if let Some(degree) = in_degree.get_mut(&child) {
                *degree -= 1;
                if *degree == 0 {
                    heap.push(Reverse(child));
                }
            }
        }
    }

    if order.len() != graph.job_count() {
        let path = find_cycle(graph).unwrap_or_default();
        return Err(DagViolation::Cycle { path });
    }

    Ok(order)
}

/// Full validation of a graph snapshot, yielding its topological order
pub fn validate(graph: &WorkflowGraph) -> Result<Vec<Uuid>, DagViolation> {
    if let Some(path) = find_cycle(graph) {
        return Err(DagViolation::Cycle { path });
    }
    topological_order(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::domain::job::{ComponentType, Job};
    use cascade_core::domain::workflow::JobDependency;

    fn jobs(workflow_id: Uuid, n: usize) -> Vec<Job> {
        (0..n)
            .map(|i| Job::new(workflow_id, format!("job-{i}"), ComponentType::from("shell")))
            .collect()
    }

    fn edge(workflow_id: Uuid, job_id: Uuid, parent: Uuid) -> JobDependency {
        JobDependency::new(workflow_id, job_id, parent)
    }

    #[test]
    fn test_acyclic_graph_has_no_cycle() {
        let wf = Uuid::new_v4();
        let js = jobs(wf, 3);
        let edges = vec![edge(wf, js[1].id, js[0].id), edge(wf, js[2].id, js[1].id)];
        let graph = WorkflowGraph::assemble_unchecked(wf, &js, &edges);
        assert!(find_cycle(&graph).is_none());
    }

    #[test]
    fn test_cycle_reports_minimal_path() {
        let wf = Uuid::new_v4();
        let js = jobs(wf, 4);
        // js[0] -> js[1] -> js[2] -> js[1] (cycle of length 2, js[3] clean)
        let edges = vec![
            edge(wf, js[1].id, js[0].id),
            edge(wf, js[2].id, js[1].id),
            edge(wf, js[1].id, js[2].id),
        ];
        let graph = WorkflowGraph::assemble_unchecked(wf, &js, &edges);
        let mut cycle = find_cycle(&graph).expect("cycle");
        cycle.sort();
        let mut expected = vec![js[1].id, js[2].id];
        expected.sort();
        assert_eq!(cycle, expected, "minimal cycle excludes js[0] and js[3]");
    }

    #[test]
    fn test_kahn_agrees_with_dfs_on_cycle() {
        let wf = Uuid::new_v4();
        let js = jobs(wf, 2);
        let edges = vec![edge(wf, js[1].id, js[0].id), edge(wf, js[0].id, js[1].id)];
        let graph = WorkflowGraph::assemble_unchecked(wf, &js, &edges);
        assert!(find_cycle(&graph).is_some());
        let err = topological_order(&graph).unwrap_err();
        assert_eq!(err.rule(), "cycle");
    }

    #[test]
    fn test_all_nodes_in_cycle_rejected() {
        // No reachable root at all: every node sits on the cycle
        let wf = Uuid::new_v4();
        let js = jobs(wf, 3);
        let edges = vec![
            edge(wf, js[1].id, js[0].id),
            edge(wf, js[2].id, js[1].id),
            edge(wf, js[0].id, js[2].id),
        ];
        let graph = WorkflowGraph::assemble_unchecked(wf, &js, &edges);
        assert!(validate(&graph).is_err());
    }

    #[test]
    fn test_topological_order_is_valid_linearization() {
        let wf = Uuid::new_v4();
        let js = jobs(wf, 5);
        let edges = vec![
            edge(wf, js[1].id, js[0].id),
            edge(wf, js[2].id, js[0].id),
            edge(wf, js[3].id, js[1].id),
            edge(wf, js[3].id, js[2].id),
            edge(wf, js[4].id, js[3].id),
        ];
        let graph = WorkflowGraph::assemble_unchecked(wf, &js, &edges);
        let order = topological_order(&graph).unwrap();
        assert_eq!(order.len(), 5);

        let position: std::collections::HashMap<Uuid, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        for job in &js {
            for parent in graph.parents_of(job.id) {
                assert!(
                    position[&parent] < position[&job.id],
                    "parent must precede child"
                );
            }
        }
    }

    #[test]
    fn test_topological_order_is_deterministic() {
        let wf = Uuid::new_v4();
        let js = jobs(wf, 6);
        let edges = vec![
            edge(wf, js[3].id, js[0].id),
            edge(wf, js[4].id, js[1].id),
            edge(wf, js[5].id, js[2].id),
        ];
        let graph = WorkflowGraph::assemble_unchecked(wf, &js, &edges);
        let first = topological_order(&graph).unwrap();
        for _ in 0..10 {
            assert_eq!(topological_order(&graph).unwrap(), first);
        }
        // The smallest root is always removed first
        let min_root = [js[0].id, js[1].id, js[2].id]
            .into_iter()
            .min()
            .unwrap();
        assert_eq!(first[0], min_root);
    }

    #[test]
    fn test_empty_graph_valid() {
        let graph = WorkflowGraph::assemble_unchecked(Uuid::new_v4(), &[], &[]);
        assert_eq!(validate(&graph).unwrap(), Vec::<Uuid>::new());
    }
}
