//! Graph model
//!
//! Holds the jobs and dependency edges of one workflow, restricted to
//! non-deleted rows, and answers structural queries. Mutations are staged:
//! the `with_*`/`without_*` constructors return a validated candidate and
//! leave the original graph untouched, so an edit can be rejected without
//! corrupting anything.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use cascade_core::domain::job::{ComponentType, Job};
use cascade_core::domain::run::JobRunStatus;
use cascade_core::domain::workflow::JobDependency;

use crate::dag::validate;
use crate::error::DagViolation;

/// Upper bound on jobs per workflow graph
pub const MAX_NODES: usize = 1_000;

/// What the dispatcher needs to know about a job to trigger it
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub component: ComponentType,
    pub parameters: HashMap<String, serde_json::Value>,
}

/// Directed dependency graph of one workflow
///
/// Edges point upstream: `parents_of(j)` are the jobs that must succeed
/// before `j` becomes ready. Node iteration is in ascending job id for
/// deterministic ordering everywhere.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    workflow_id: Uuid,
    nodes: BTreeMap<Uuid, JobSpec>,
    parents: HashMap<Uuid, BTreeSet<Uuid>>,
    children: HashMap<Uuid, BTreeSet<Uuid>>,
    /// Soft-deleted job ids seen at assembly, kept so staged edits can
    /// distinguish a deleted endpoint from an unknown one
    deleted_jobs: HashSet<Uuid>,
}

impl WorkflowGraph {
    /// Builds the active graph from repository rows.
    ///
    /// Soft-deleted jobs and edges are filtered out; edges referencing a
    /// deleted or unknown job, self-loops, duplicates and cycles are all
    /// rejected with the violated rule.
    pub fn from_parts(
        workflow_id: Uuid,
        jobs: &[Job],
        edges: &[JobDependency],
    ) -> Result<Self, DagViolation> {
        let graph = Self::assemble(workflow_id, jobs, edges)?;
        if let Some(path) = validate::find_cycle(&graph) {
            return Err(DagViolation::Cycle { path });
        }
        Ok(graph)
    }

    /// Structural assembly without the acyclicity check
    fn assemble(
        workflow_id: Uuid,
        jobs: &[Job],
        edges: &[JobDependency],
    ) -> Result<Self, DagViolation> {
        let deleted: HashSet<Uuid> = jobs
            .iter()
            .filter(|j| !j.record_status.is_active())
            .map(|j| j.id)
            .collect();

        let mut graph = Self {
            workflow_id,
            nodes: BTreeMap::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
            deleted_jobs: deleted.clone(),
        };

        for job in jobs.iter().filter(|j| j.record_status.is_active()) {
            graph.nodes.insert(
                job.id,
                JobSpec {
                    name: job.name.clone(),
                    component: job.component.clone(),
                    parameters: job.parameters.clone(),
                },
            );
            graph.parents.entry(job.id).or_default();
            graph.children.entry(job.id).or_default();
        }

        if graph.nodes.len() > MAX_NODES {
            return Err(DagViolation::TooManyNodes {
                count: graph.nodes.len(),
                max: MAX_NODES,
            });
        }

        for edge in edges.iter().filter(|e| e.record_status.is_active()) {
            graph.insert_edge(edge.job_id, edge.parent_job_id, &deleted)?;
        }

        Ok(graph)
    }

    /// Structure-only construction for validator tests; may contain cycles
    #[cfg(test)]
    pub(crate) fn assemble_unchecked(
        workflow_id: Uuid,
        jobs: &[Job],
        edges: &[JobDependency],
    ) -> Self {
        Self::assemble(workflow_id, jobs, edges).expect("structurally valid graph")
    }

    /// Structural checks for one edge, then adjacency insertion
    fn insert_edge(
        &mut self,
        job_id: Uuid,
        parent_job_id: Uuid,
        deleted: &HashSet<Uuid>,
    ) -> Result<(), DagViolation> {
        if job_id == parent_job_id {
            return Err(DagViolation::SelfLoop { job_id });
        }
        for endpoint in [job_id, parent_job_id] {
            if deleted.contains(&endpoint) {
                return Err(DagViolation::DeletedEndpoint {
                    job_id,
                    parent_job_id,
                    deleted: endpoint,
                });
            }
            if !self.nodes.contains_key(&endpoint) {
                return Err(DagViolation::UnknownEndpoint {
                    job_id,
                    parent_job_id,
                    missing: endpoint,
                });
            }
        }
        let up = self.parents.entry(job_id).or_default();
        if !up.insert(parent_job_id) {
            return Err(DagViolation::DuplicateEdge {
                job_id,
                parent_job_id,
            });
        }
        self.children.entry(parent_job_id).or_default().insert(job_id);
        Ok(())
    }

    // =============================================================================
    // Staged edits
    // =============================================================================

    /// Stages `job_id depends-on parent_job_id` and validates the candidate.
    ///
    /// On violation the original graph is unchanged and the caller gets the
    /// violated rule; on success the returned graph is ready to commit.
    pub fn with_edge(&self, job_id: Uuid, parent_job_id: Uuid) -> Result<Self, DagViolation> {
        let mut candidate = self.clone();
        let deleted = candidate.deleted_jobs.clone();
        candidate.insert_edge(job_id, parent_job_id, &deleted)?;
        if let Some(path) = validate::find_cycle(&candidate) {
            return Err(DagViolation::Cycle { path });
        }
        Ok(candidate)
    }

    /// Stages the insertion of a job with no edges yet.
    ///
    /// An isolated node cannot introduce a cycle, so only the node cap is
    /// checked; on violation the original graph is unchanged.
    pub fn with_job(&self, job: &Job) -> Result<Self, DagViolation> {
        let mut candidate = self.clone();
        if candidate.nodes.len() + 1 > MAX_NODES {
            return Err(DagViolation::TooManyNodes {
                count: candidate.nodes.len() + 1,
                max: MAX_NODES,
            });
        }
        candidate.nodes.insert(
            job.id,
            JobSpec {
                name: job.name.clone(),
                component: job.component.clone(),
                parameters: job.parameters.clone(),
            },
        );
        candidate.parents.entry(job.id).or_default();
        candidate.children.entry(job.id).or_default();
        Ok(candidate)
    }

    /// Stages the removal of an edge; removal cannot introduce a violation
    pub fn without_edge(&self, job_id: Uuid, parent_job_id: Uuid) -> Self {
        let mut candidate = self.clone();
        if let Some(up) = candidate.parents.get_mut(&job_id) {
            up.remove(&parent_job_id);
        }
        if let Some(down) = candidate.children.get_mut(&parent_job_id) {
            down.remove(&job_id);
        }
        candidate
    }

    /// Stages the removal of a job and all its incident edges
    pub fn without_job(&self, job_id: Uuid) -> Self {
        let mut candidate = self.clone();
        candidate.nodes.remove(&job_id);
        let up = candidate.parents.remove(&job_id).unwrap_or_default();
        let down = candidate.children.remove(&job_id).unwrap_or_default();
        for parent in up {
            if let Some(set) = candidate.children.get_mut(&parent) {
                set.remove(&job_id);
            }
        }
        for child in down {
            if let Some(set) = candidate.parents.get_mut(&child) {
                set.remove(&job_id);
            }
        }
        candidate
    }

    // =============================================================================
    // Structural queries
    // =============================================================================

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    pub fn job_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, job_id: Uuid) -> bool {
        self.nodes.contains_key(&job_id)
    }

    pub fn spec(&self, job_id: Uuid) -> Option<&JobSpec> {
        self.nodes.get(&job_id)
    }

    /// All job ids in ascending order
    pub fn job_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.nodes.keys().copied()
    }

    /// Upstream neighbors (the jobs `job_id` depends on), ascending
    pub fn parents_of(&self, job_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.parents.get(&job_id).into_iter().flatten().copied()
    }

    /// Downstream neighbors (the jobs depending on `job_id`), ascending
    pub fn children_of(&self, job_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.children.get(&job_id).into_iter().flatten().copied()
    }

    pub fn in_degree(&self, job_id: Uuid) -> usize {
        self.parents.get(&job_id).map_or(0, BTreeSet::len)
    }

    /// Jobs with no upstream dependency, ascending
    pub fn roots(&self) -> Vec<Uuid> {
        self.job_ids().filter(|&id| self.in_degree(id) == 0).collect()
    }

    /// Jobs nothing depends on, ascending
    pub fn leaves(&self) -> Vec<Uuid> {
        self.job_ids()
            .filter(|&id| self.children.get(&id).is_none_or(BTreeSet::is_empty))
            .collect()
    }

    /// Transitive downstream closure of `job_id`, excluding the job itself
    pub fn downstream_of(&self, job_id: Uuid) -> Vec<Uuid> {
        let mut visited = HashSet::new();
        let mut stack: Vec<Uuid> = self.children_of(job_id).collect();
        let mut result = Vec::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);
            stack.extend(self.children_of(current));
        }
        result
    }

    /// Jobs ready to dispatch under the given per-job run statuses.
    ///
    /// A job is ready when its own status is still `Pending` and every
    /// parent has reached terminal success. Ordered by ascending job id for
    /// determinism; this is a stable tie-break, not an execution priority.
    pub fn ready_jobs(&self, statuses: &HashMap<Uuid, JobRunStatus>) -> Vec<Uuid> {
        let status_of = |id: Uuid| statuses.get(&id).copied().unwrap_or(JobRunStatus::Pending);
        self.job_ids()
            .filter(|&id| {
                status_of(id) == JobRunStatus::Pending
                    && self
                        .parents_of(id)
                        .all(|parent| status_of(parent).is_terminal_success())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::domain::job::RecordStatus;

    fn job(workflow_id: Uuid) -> Job {
        Job::new(workflow_id, "step", ComponentType::from("shell"))
    }

    fn edge(workflow_id: Uuid, job_id: Uuid, parent: Uuid) -> JobDependency {
        JobDependency::new(workflow_id, job_id, parent)
    }

    /// A is upstream of B and C; D is downstream of both
    fn diamond() -> (WorkflowGraph, [Uuid; 4]) {
        let wf = Uuid::new_v4();
        let jobs: Vec<Job> = (0..4).map(|_| job(wf)).collect();
        let [a, b, c, d] = [jobs[0].id, jobs[1].id, jobs[2].id, jobs[3].id];
        let edges = vec![
            edge(wf, b, a),
            edge(wf, c, a),
            edge(wf, d, b),
            edge(wf, d, c),
        ];
        let graph = WorkflowGraph::from_parts(wf, &jobs, &edges).unwrap();
        (graph, [a, b, c, d])
    }

    #[test]
    fn test_ready_jobs_start_at_roots() {
        let (graph, [a, ..]) = diamond();
        let statuses = HashMap::new();
        assert_eq!(graph.ready_jobs(&statuses), vec![a]);
    }

    #[test]
    fn test_ready_jobs_unlock_tier_together() {
        let (graph, [a, b, c, _]) = diamond();
        let statuses = HashMap::from([(a, JobRunStatus::Succeeded)]);
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(graph.ready_jobs(&statuses), expected);
    }

    #[test]
    fn test_ready_jobs_exclude_non_success_parents() {
        let (graph, [a, b, c, d]) = diamond();
        for blocked in [
            JobRunStatus::Running,
            JobRunStatus::Failed,
            JobRunStatus::Skipped,
        ] {
            let statuses = HashMap::from([(a, blocked)]);
            assert!(graph.ready_jobs(&statuses).is_empty(), "{blocked:?}");
        }
        // D stays blocked until both parents succeed
        let statuses = HashMap::from([
            (a, JobRunStatus::Succeeded),
            (b, JobRunStatus::Succeeded),
            (c, JobRunStatus::Running),
        ]);
        assert!(graph.ready_jobs(&statuses).is_empty());
        let statuses = HashMap::from([
            (a, JobRunStatus::Succeeded),
            (b, JobRunStatus::Succeeded),
            (c, JobRunStatus::Succeeded),
        ]);
        assert_eq!(graph.ready_jobs(&statuses), vec![d]);
    }

    #[test]
    fn test_soft_deleted_jobs_excluded() {
        let wf = Uuid::new_v4();
        let mut a = job(wf);
        a.record_status = RecordStatus::Deleted;
        let b = job(wf);
        let graph = WorkflowGraph::from_parts(wf, &[a.clone(), b.clone()], &[]).unwrap();
        assert!(!graph.contains(a.id));
        assert!(graph.contains(b.id));
    }

    #[test]
    fn test_edge_to_deleted_job_rejected() {
        let wf = Uuid::new_v4();
        let mut a = job(wf);
        a.record_status = RecordStatus::Deleted;
        let b = job(wf);
        let err =
            WorkflowGraph::from_parts(wf, &[a.clone(), b.clone()], &[edge(wf, b.id, a.id)])
                .unwrap_err();
        assert_eq!(err.rule(), "deleted-endpoint");
    }

    #[test]
    fn test_self_loop_rejected() {
        let wf = Uuid::new_v4();
        let a = job(wf);
        let err = WorkflowGraph::from_parts(wf, &[a.clone()], &[edge(wf, a.id, a.id)]).unwrap_err();
        assert_eq!(err.rule(), "self-loop");
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let wf = Uuid::new_v4();
        let a = job(wf);
        let b = job(wf);
        let edges = vec![edge(wf, b.id, a.id), edge(wf, b.id, a.id)];
        let err = WorkflowGraph::from_parts(wf, &[a, b], &edges).unwrap_err();
        assert_eq!(err.rule(), "duplicate-edge");
    }

    #[test]
    fn test_with_edge_rejects_cycle_and_leaves_original_unchanged() {
        let wf = Uuid::new_v4();
        let a = job(wf);
        let b = job(wf);
        let graph =
            WorkflowGraph::from_parts(wf, &[a.clone(), b.clone()], &[edge(wf, b.id, a.id)])
                .unwrap();

        // Adding a->b on top of b->a closes a cycle
        let err = graph.with_edge(a.id, b.id).unwrap_err();
        match &err {
            DagViolation::Cycle { path } => {
                assert!(path.contains(&a.id));
                assert!(path.contains(&b.id));
            }
            other => panic!("expected cycle, got {other:?}"),
        }

        // The original graph kept exactly its one edge
        assert_eq!(graph.parents_of(b.id).collect::<Vec<_>>(), vec![a.id]);
        assert_eq!(graph.parents_of(a.id).count(), 0);
    }

    #[test]
    fn test_with_job_stages_isolated_node() {
        let (graph, _) = diamond();
        let extra = job(graph.workflow_id());
        let grown = graph.with_job(&extra).unwrap();
        assert!(grown.contains(extra.id));
        assert_eq!(grown.in_degree(extra.id), 0);
        // The original graph is untouched
        assert!(!graph.contains(extra.id));
    }

    #[test]
    fn test_with_job_enforces_node_cap() {
        let wf = Uuid::new_v4();
        let jobs: Vec<Job> = (0..MAX_NODES).map(|_| job(wf)).collect();
        let graph = WorkflowGraph::from_parts(wf, &jobs, &[]).unwrap();
        let err = graph.with_job(&job(wf)).unwrap_err();
        assert_eq!(err.rule(), "too-many-nodes");
        assert_eq!(graph.job_count(), MAX_NODES);
    }

    #[test]
    fn test_with_edge_to_deleted_job_reports_deleted_endpoint() {
        let wf = Uuid::new_v4();
        let mut a = job(wf);
        a.record_status = RecordStatus::Deleted;
        let b = job(wf);
        let graph = WorkflowGraph::from_parts(wf, &[a.clone(), b.clone()], &[]).unwrap();
        let err = graph.with_edge(b.id, a.id).unwrap_err();
        assert_eq!(err.rule(), "deleted-endpoint");
    }

    #[test]
    fn test_without_edge_unblocks_child() {
        let (graph, [a, b, ..]) = diamond();
        let pruned = graph.without_edge(b, a);
        assert_eq!(pruned.in_degree(b), 0);
        // Original still carries the edge
        assert_eq!(graph.in_degree(b), 1);
    }

    #[test]
    fn test_without_job_drops_incident_edges() {
        let (graph, [a, b, _, d]) = diamond();
        let pruned = graph.without_job(b);
        assert!(!pruned.contains(b));
        assert!(pruned.children_of(a).all(|c| c != b));
        assert!(pruned.parents_of(d).all(|p| p != b));
    }

    #[test]
    fn test_downstream_closure() {
        let (graph, [a, b, c, d]) = diamond();
        let mut downstream = graph.downstream_of(a);
        downstream.sort();
        let mut expected = vec![b, c, d];
        expected.sort();
        assert_eq!(downstream, expected);
        assert!(graph.downstream_of(d).is_empty());
    }

    #[test]
    fn test_roots_and_leaves() {
        let (graph, [a, _, _, d]) = diamond();
        assert_eq!(graph.roots(), vec![a]);
        assert_eq!(graph.leaves(), vec![d]);
    }

    #[test]
    fn test_empty_workflow_is_valid() {
        let graph = WorkflowGraph::from_parts(Uuid::new_v4(), &[], &[]).unwrap();
        assert!(graph.is_empty());
        assert!(graph.ready_jobs(&HashMap::new()).is_empty());
    }
}
