//! Post-allocation hook for redistributing teacher workload.

use crate::data::{Placement, Teacher};
use crate::report;
use log::debug;

/// Runs over the committed placements of a generation run before they are persisted.
pub trait WorkloadBalancer: Send + Sync {
    fn rebalance(&self, placements: Vec<Placement>, teachers: &[Teacher]) -> Vec<Placement>;
}

/// Leaves the allocation untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBalancer;

impl WorkloadBalancer for NoopBalancer {
    fn rebalance(&self, placements: Vec<Placement>, teachers: &[Teacher]) -> Vec<Placement> {
        let workload = report::teacher_workload(&placements, teachers.iter().map(|t| t.id));
        debug!("Teacher workload after allocation: {workload:?}");
        placements
    }
}
