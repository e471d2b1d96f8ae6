//! Read-only aggregation over committed placements.

use crate::data::{ClassroomId, Placement, SectionId, TeacherId};
use chrono::Weekday;
use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Placement counts per teacher, classroom, subject and weekday.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatistics {
    pub total_count: usize,
    pub by_teacher: BTreeMap<TeacherId, usize>,
    pub by_classroom: BTreeMap<ClassroomId, usize>,
    pub by_subject: BTreeMap<String, usize>,
    pub by_day: BTreeMap<String, usize>,
}

pub fn statistics(placements: &[Placement]) -> ScheduleStatistics {
    ScheduleStatistics {
        total_count: placements.len(),
        by_teacher: placements.iter().map(|p| p.teacher_id).counts().into_iter().collect(),
        by_classroom: placements
            .iter()
            .map(|p| p.classroom_id)
            .counts()
            .into_iter()
            .collect(),
        by_subject: placements
            .iter()
            .map(|p| p.subject.clone())
            .counts()
            .into_iter()
            .collect(),
        by_day: placements
            .iter()
            .map(|p| p.day_of_week.to_string())
            .counts()
            .into_iter()
            .collect(),
    }
}

/// Placements per teacher, including teachers with none.
pub fn teacher_workload(
    placements: &[Placement],
    teachers: impl IntoIterator<Item = TeacherId>,
) -> BTreeMap<TeacherId, usize> {
    let mut workload: BTreeMap<TeacherId, usize> = teachers.into_iter().map(|id| (id, 0)).collect();
    for placement in placements {
        *workload.entry(placement.teacher_id).or_default() += 1;
    }
    workload
}

/// A section meeting the same subject more than once on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateViolation {
    pub section_id: SectionId,
    pub day: Weekday,
    pub subject: String,
}

/// Re-scans placements for same-day subject repeats. Reports, never repairs.
pub fn same_day_duplicates(placements: &[Placement]) -> Vec<DuplicateViolation> {
    let mut seen: HashSet<(SectionId, Weekday, &str)> = HashSet::new();
    let mut violations = Vec::new();

    for placement in placements {
        let Some(section_id) = placement.section_id else {
            continue;
        };
        let key = (section_id, placement.day_of_week, placement.subject.as_str());
        if !seen.insert(key) {
            warn!(
                "Section {} has {} more than once on {}",
                section_id, placement.subject, placement.day_of_week
            );
            violations.push(DuplicateViolation {
                section_id,
                day: placement.day_of_week,
                subject: placement.subject.clone(),
            });
        }
    }

    if violations.is_empty() {
        debug!("Validation passed: no section repeats a subject on the same day");
    }
    violations
}
