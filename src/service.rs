//! The scheduling operations exposed to the HTTP layer.

use crate::balance::{NoopBalancer, WorkloadBalancer};
use crate::data::{Catalog, Placement, UnscheduledRequest, WeeklyRequest};
use crate::error::SchedulingError;
use crate::grid::SlotGrid;
use crate::oracle::ConflictOracle;
use crate::report::{self, ScheduleStatistics};
use crate::requests::generate_requests;
use crate::solver::allocate;
use crate::store::Store;
use chrono::{Datelike, Duration, Local, NaiveDate};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome of a bulk generation run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    pub message: String,
    pub placements: Vec<Placement>,
    pub warnings: Vec<String>,
    pub unscheduled: Vec<UnscheduledRequest>,
    pub statistics: ScheduleStatistics,
}

impl GenerationResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Checks the catalog can be scheduled at all; returns the reason when it cannot.
pub fn check_prerequisites(catalog: &Catalog) -> Result<(), String> {
    if catalog.sections.is_empty()
        || catalog.subjects.is_empty()
        || catalog.teachers.is_empty()
        || catalog.classrooms.is_empty()
    {
        return Err(
            "Prerequisites not met: at least one section, subject, teacher and classroom is required"
                .to_string(),
        );
    }

    let taught: BTreeSet<&str> = catalog
        .teachers
        .iter()
        .flat_map(|t| t.subjects.iter().map(String::as_str))
        .collect();
    let missing: BTreeSet<&str> = catalog
        .subjects
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| !taught.contains(name))
        .collect();
    if !missing.is_empty() {
        let missing: Vec<&str> = missing.into_iter().collect();
        return Err(format!(
            "Prerequisites not met: no teacher covers {}",
            missing.join(", ")
        ));
    }
    Ok(())
}

pub struct SchedulingService {
    store: Arc<dyn Store>,
    grid: SlotGrid,
    balancer: Arc<dyn WorkloadBalancer>,
}

impl SchedulingService {
    pub fn new(store: Arc<dyn Store>, grid: SlotGrid) -> Self {
        Self {
            store,
            grid,
            balancer: Arc::new(NoopBalancer),
        }
    }

    pub fn with_balancer(mut self, balancer: Arc<dyn WorkloadBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    /// Generates and persists a timetable for the current week.
    pub fn generate_optimized_schedule(&self) -> GenerationResult {
        self.generate_optimized_schedule_for_week(week_start_of(Local::now().date_naive()))
    }

    /// Generates and persists a timetable dated in the week starting at `week_start`.
    ///
    /// Never fails outright: prerequisite problems and unexpected errors come
    /// back as `success == false` with the cause in `message`.
    pub fn generate_optimized_schedule_for_week(&self, week_start: NaiveDate) -> GenerationResult {
        let week_start = week_start_of(week_start);
        match self.try_generate(week_start) {
            Ok(result) => result,
            Err(e) => {
                error!("Schedule generation aborted: {e}");
                GenerationResult::failure(format!("Failed to generate schedule: {e}"))
            }
        }
    }

    fn try_generate(&self, week_start: NaiveDate) -> Result<GenerationResult, SchedulingError> {
        let catalog = Catalog {
            teachers: self.store.teachers()?,
            classrooms: self.store.classrooms()?,
            sections: self.store.sections()?,
            subjects: self.store.subjects()?,
        };
        info!(
            "Generating schedule for week of {week_start}: {} sections, {} subjects, {} teachers, {} classrooms",
            catalog.sections.len(),
            catalog.subjects.len(),
            catalog.teachers.len(),
            catalog.classrooms.len()
        );

        if let Err(reason) = check_prerequisites(&catalog) {
            warn!("{reason}");
            return Ok(GenerationResult::failure(reason));
        }

        let requests = generate_requests(&catalog.sections, &catalog.subjects);
        let outcome = allocate(
            &self.grid,
            &catalog.teachers,
            &catalog.classrooms,
            &requests,
            week_start,
        );
        let mut warnings: Vec<String> = outcome.unscheduled.iter().map(ToString::to_string).collect();

        let placements = self.balancer.rebalance(outcome.placements, &catalog.teachers);

        let mut saved = Vec::with_capacity(placements.len());
        for placement in placements {
            match self.store.save_placement(placement) {
                Ok(placement) => saved.push(placement),
                Err(e) => {
                    warn!("Failed to save schedule: {e}");
                    warnings.push(format!("Failed to save schedule: {e}"));
                }
            }
        }

        let statistics = report::statistics(&saved);
        Ok(GenerationResult {
            success: true,
            message: format!("Successfully generated {} schedule entries", saved.len()),
            placements: saved,
            warnings,
            unscheduled: outcome.unscheduled,
            statistics,
        })
    }

    /// Places caller-specified meetings against the persisted calendar.
    ///
    /// Walks the seven days from `week_start`, handling each request on the date
    /// whose weekday matches. Each placement is persisted before the next
    /// request is tried.
    pub fn generate_weekly_schedule(
        &self,
        requests: &[WeeklyRequest],
        week_start: NaiveDate,
    ) -> Result<Vec<Placement>, SchedulingError> {
        let teachers = self.store.teachers()?;
        let classrooms = self.store.classrooms()?;
        let oracle = ConflictOracle::new(self.store.as_ref());

        let mut placed = Vec::new();
        for offset in 0..7 {
            let date = week_start + Duration::days(offset);
            let day = date.weekday();

            for request in requests.iter().filter(|r| r.day_of_week == day) {
                if request.start_time >= request.end_time {
                    warn!(
                        "Skipping {} on {date}: {} does not precede {}",
                        request.subject, request.start_time, request.end_time
                    );
                    continue;
                }
                match oracle.place(request, date, &teachers, &classrooms)? {
                    Some(placement) => placed.push(placement),
                    None => warn!(
                        "No conflict-free teacher and classroom for {} on {date} {}-{}",
                        request.subject, request.start_time, request.end_time
                    ),
                }
            }
        }

        info!(
            "Placed {} of {} weekly requests from {week_start}",
            placed.len(),
            requests.len()
        );
        Ok(placed)
    }

    /// Counts persisted placements dated within `[start, end]`.
    pub fn schedule_statistics(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ScheduleStatistics, SchedulingError> {
        if start > end {
            return Err(SchedulingError::InvalidDateRange { start, end });
        }
        let placements = self.store.placements_between(start, end)?;
        Ok(report::statistics(&placements))
    }
}
