use crate::data::{
    Classroom, Placement, Teacher, UnscheduledReason, UnscheduledRequest, describe_minutes,
};
use crate::grid::{Booking, SlotGrid, SlotLedger, SubjectDayRegistry};
use crate::report;
use crate::requests::BlockRequest;
use chrono::{Duration, NaiveDate};
use itertools::iproduct;
use log::{debug, info, trace, warn};
use std::time::Instant;

/// Placements committed by one run and the requests it had to drop.
#[derive(Debug, Clone, Default)]
pub struct AllocationOutcome {
    pub placements: Vec<Placement>,
    pub unscheduled: Vec<UnscheduledRequest>,
}

/// First-fit allocator over the slot grid.
///
/// Owns the ledger and the section/day subject registry of a single run, so
/// independent runs never observe each other's reservations.
pub struct Allocator<'a> {
    grid: &'a SlotGrid,
    teachers: &'a [Teacher],
    classrooms: &'a [Classroom],
    week_start: NaiveDate,
    ledger: SlotLedger,
    registry: SubjectDayRegistry,
}

impl<'a> Allocator<'a> {
    /// `week_start` is the Monday whose week the placements are dated in.
    pub fn new(
        grid: &'a SlotGrid,
        teachers: &'a [Teacher],
        classrooms: &'a [Classroom],
        week_start: NaiveDate,
    ) -> Self {
        Self {
            grid,
            teachers,
            classrooms,
            week_start,
            ledger: SlotLedger::new(),
            registry: SubjectDayRegistry::new(),
        }
    }

    /// Places one block at the first feasible (day, start, teacher, classroom).
    ///
    /// Days come from the section pattern, starts are scanned left to right,
    /// and teachers and classrooms are tried in catalog order. Days on which
    /// the section already has this subject are skipped.
    pub fn place(&mut self, request: &BlockRequest<'_>) -> Result<Placement, UnscheduledReason> {
        let (section, subject) = (request.section, request.subject);
        let all_teachers = self.teachers;
        let all_classrooms = self.classrooms;

        let teachers: Vec<&Teacher> = all_teachers
            .iter()
            .filter(|t| t.teaches(&subject.name))
            .collect();
        if teachers.is_empty() {
            return Err(UnscheduledReason::NoQualifiedTeacher);
        }

        let classrooms: Vec<&Classroom> = all_classrooms
            .iter()
            .filter(|c| c.suits(request.required_capacity, request.room_type))
            .collect();
        if classrooms.is_empty() {
            return Err(UnscheduledReason::NoSuitableClassroom);
        }

        let units = request.units as usize;
        for &day in section.meeting_days() {
            if self.registry.contains(section.id, day, &subject.name) {
                trace!(
                    "Skipping {day}: {} already has {} that day",
                    section.section_name, subject.name
                );
                continue;
            }

            for start in 0..self.grid.len() {
                let Some((start_time, end_time)) = self.grid.span(start, units) else {
                    continue;
                };
                let windows = start..start + units;

                let available = teachers
                    .iter()
                    .copied()
                    .filter(|t| t.is_available(day, start_time, end_time));
                let found = iproduct!(available, classrooms.iter().copied()).find(
                    |(teacher, classroom)| {
                        let booking = Booking {
                            teacher: teacher.id,
                            classroom: classroom.id,
                        };
                        self.ledger.is_span_free(day, windows.clone(), booking)
                    },
                );
                let Some((teacher, classroom)) = found else {
                    continue;
                };

                let booking = Booking {
                    teacher: teacher.id,
                    classroom: classroom.id,
                };
                if self.ledger.reserve(day, windows, booking).is_err() {
                    continue;
                }
                self.registry.record(section.id, day, &subject.name);

                let date = self.week_start + Duration::days(i64::from(day.num_days_from_monday()));
                let notes = format!(
                    "Auto-generated: {} - {} (Schedule {}, {}: {}-{})",
                    section.section_name,
                    subject.name,
                    request.sequence + 1,
                    describe_minutes(i64::from(request.units) * 30),
                    start_time.format("%H:%M"),
                    end_time.format("%H:%M"),
                );
                return Ok(Placement::new(
                    date,
                    day,
                    start_time,
                    end_time,
                    teacher.id,
                    classroom.id,
                    subject.name.clone(),
                )
                .with_section(section.id)
                .with_subject_id(subject.id)
                .with_notes(notes)
                .recurring(true)
                .with_block_sequence(request.sequence));
            }
        }

        Err(UnscheduledReason::NoFreeSlot)
    }

    /// Processes every request in order. Dropped requests never abort the run
    /// and earlier placements are never revisited.
    pub fn run(mut self, requests: &[BlockRequest<'_>]) -> AllocationOutcome {
        let started = Instant::now();
        info!(
            "Allocating {} block requests on a {}-window grid",
            requests.len(),
            self.grid.len()
        );

        let mut outcome = AllocationOutcome::default();
        for request in requests {
            match self.place(request) {
                Ok(placement) => {
                    debug!(
                        "Scheduled {} - {} on {} at {}-{} (teacher {}, classroom {})",
                        request.section.section_name,
                        placement.subject,
                        placement.day_of_week,
                        placement.start_time,
                        placement.end_time,
                        placement.teacher_id,
                        placement.classroom_id
                    );
                    outcome.placements.push(placement);
                }
                Err(reason) => {
                    let dropped = UnscheduledRequest {
                        section_id: request.section.id,
                        section_name: request.section.section_name.clone(),
                        subject: request.subject.name.clone(),
                        block_sequence: request.sequence,
                        units: request.units,
                        reason,
                    };
                    warn!("{dropped}");
                    outcome.unscheduled.push(dropped);
                }
            }
        }

        report::same_day_duplicates(&outcome.placements);

        info!(
            "Placed {} of {} requests ({} slot keys reserved) in {:.2?}",
            outcome.placements.len(),
            requests.len(),
            self.ledger.len(),
            started.elapsed()
        );
        outcome
    }
}

/// Runs a fresh allocator over `requests`.
pub fn allocate(
    grid: &SlotGrid,
    teachers: &[Teacher],
    classrooms: &[Classroom],
    requests: &[BlockRequest<'_>],
    week_start: NaiveDate,
) -> AllocationOutcome {
    Allocator::new(grid, teachers, classrooms, week_start).run(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SchedulePattern, Section, Subject};
    use crate::oracle::intervals_overlap;
    use crate::requests::generate_requests;
    use chrono::{NaiveTime, Weekday};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    fn teacher(id: u64, subjects: &[&str]) -> Teacher {
        Teacher::new(id, format!("Teacher {id}"), t(8, 0), t(16, 0))
            .with_days([
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ])
            .with_subjects(subjects.iter().copied())
    }

    fn run(
        sections: &[Section],
        subjects: &[Subject],
        teachers: &[Teacher],
        classrooms: &[Classroom],
    ) -> AllocationOutcome {
        let grid = SlotGrid::default();
        let requests = generate_requests(sections, subjects);
        allocate(&grid, teachers, classrooms, &requests, monday())
    }

    #[test]
    fn test_three_hour_subject_spreads_over_mwf() {
        let sections = vec![Section::new(1, "7-A", 30).with_pattern(SchedulePattern::Mwf)];
        let subjects = vec![Subject::new(1, "Chemistry", 3.0)
            .with_room_type("Lab")
            .with_priority(5)];
        let teachers = vec![teacher(1, &["Chemistry"])];
        let classrooms = vec![Classroom::new(1, "Lab 1", "Lab", 40)];

        let outcome = run(&sections, &subjects, &teachers, &classrooms);
        assert!(outcome.unscheduled.is_empty());
        let days: Vec<Weekday> = outcome.placements.iter().map(|p| p.day_of_week).collect();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        for p in &outcome.placements {
            assert_eq!(p.duration_minutes(), 60);
            assert_eq!((p.start_time, p.end_time), (t(8, 0), t(9, 0)));
            assert_eq!((p.teacher_id, p.classroom_id), (1, 1));
            assert!(p.recurring);
        }
        assert_eq!(outcome.placements[1].date, NaiveDate::from_ymd_opt(2024, 9, 4).unwrap());
        assert_eq!(
            outcome.placements[0].notes,
            "Auto-generated: 7-A - Chemistry (Schedule 1, 1.0 hours: 08:00-09:00)"
        );
    }

    #[test]
    fn test_room_type_mismatch_drops_only_that_subject() {
        let sections = vec![Section::new(1, "7-A", 30)];
        let subjects = vec![
            Subject::new(1, "PE", 1.0).with_room_type("Gym").with_priority(9),
            Subject::new(2, "Biology", 1.0).with_room_type("Lab"),
        ];
        let teachers = vec![teacher(1, &["PE", "Biology"])];
        let classrooms = vec![Classroom::new(1, "Lab 1", "Lab", 40)];

        let outcome = run(&sections, &subjects, &teachers, &classrooms);
        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.placements[0].subject, "Biology");
        assert_eq!(outcome.unscheduled.len(), 1);
        assert_eq!(
            outcome.unscheduled[0].reason,
            UnscheduledReason::NoSuitableClassroom
        );
    }

    #[test]
    fn test_higher_priority_wins_contested_teacher() {
        let sections = vec![Section::new(1, "7-A", 20).with_pattern(SchedulePattern::Tth)];
        let subjects = vec![
            Subject::new(1, "History", 1.0).with_priority(1),
            Subject::new(2, "Geography", 1.0).with_priority(5),
        ];
        // a single hour on Tuesday is all the teacher has
        let teachers = vec![Teacher::new(1, "Only One", t(8, 0), t(9, 0))
            .with_days([Weekday::Tue])
            .with_subjects(["History", "Geography"])];
        let classrooms = vec![
            Classroom::new(1, "Room 1", "Lecture", 30),
            Classroom::new(2, "Room 2", "Lecture", 30),
        ];

        let outcome = run(&sections, &subjects, &teachers, &classrooms);
        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.placements[0].subject, "Geography");
        assert_eq!(outcome.unscheduled[0].subject, "History");
        assert_eq!(outcome.unscheduled[0].reason, UnscheduledReason::NoFreeSlot);
    }

    #[test]
    fn test_section_takes_parallel_meetings_with_separate_staff() {
        let sections = vec![Section::new(1, "7-A", 20)];
        let subjects = vec![
            Subject::new(1, "History", 1.0).with_priority(5),
            Subject::new(2, "Music", 1.0).with_priority(1),
        ];
        let teachers = vec![
            Teacher::new(1, "Historian", t(8, 0), t(9, 0))
                .with_days([Weekday::Mon])
                .with_subjects(["History"]),
            Teacher::new(2, "Musician", t(8, 0), t(9, 0))
                .with_days([Weekday::Mon])
                .with_subjects(["Music"]),
        ];
        let classrooms = vec![
            Classroom::new(1, "R1", "Lecture", 30),
            Classroom::new(2, "R2", "Lecture", 30),
        ];

        let outcome = run(&sections, &subjects, &teachers, &classrooms);
        assert!(outcome.unscheduled.is_empty(), "{:?}", outcome.unscheduled);
        let placed: Vec<(&str, u64, u64, NaiveTime)> = outcome
            .placements
            .iter()
            .map(|p| (p.subject.as_str(), p.teacher_id, p.classroom_id, p.start_time))
            .collect();
        assert_eq!(
            placed,
            vec![("History", 1, 1, t(8, 0)), ("Music", 2, 2, t(8, 0))]
        );
    }

    #[test]
    fn test_unknown_subject_has_no_teacher() {
        let sections = vec![Section::new(1, "7-A", 20)];
        let subjects = vec![Subject::new(1, "Latin", 1.0)];
        let teachers = vec![teacher(1, &["Math"])];
        let classrooms = vec![Classroom::new(1, "Room 1", "Lecture", 30)];

        let outcome = run(&sections, &subjects, &teachers, &classrooms);
        assert!(outcome.placements.is_empty());
        assert_eq!(
            outcome.unscheduled[0].reason,
            UnscheduledReason::NoQualifiedTeacher
        );
    }

    #[test]
    fn test_blocks_never_straddle_lunch() {
        // teacher free 11:00-14:30, so a 1.5h block can only sit at 13:00
        let sections = vec![Section::new(1, "7-A", 20)];
        let subjects = vec![Subject::new(1, "Music", 1.5)];
        let teachers = vec![Teacher::new(1, "Late Starter", t(11, 0), t(14, 30))
            .with_days([Weekday::Mon])
            .with_subjects(["Music"])];
        let classrooms = vec![Classroom::new(1, "Room 1", "Lecture", 30)];

        let outcome = run(&sections, &subjects, &teachers, &classrooms);
        let p = &outcome.placements[0];
        assert_eq!((p.start_time, p.end_time), (t(13, 0), t(14, 30)));
        assert_eq!(p.duration_minutes(), 90);
    }

    #[test]
    fn test_full_week_invariants() {
        let sections = vec![
            Section::new(1, "7-A", 30).with_pattern(SchedulePattern::Mwf),
            Section::new(2, "7-B", 25).with_pattern(SchedulePattern::Tth),
            Section::new(3, "8-A", 35).with_pattern(SchedulePattern::Daily),
        ];
        let subjects = vec![
            Subject::new(1, "Math", 3.5).with_priority(5),
            Subject::new(2, "English", 3.0).with_priority(4),
            Subject::new(3, "Science", 2.5).with_room_type("Lab").with_priority(3),
            Subject::new(4, "Art", 1.0).with_priority(1),
        ];
        let teachers = vec![
            teacher(1, &["Math", "Science"]),
            teacher(2, &["English", "Art"]),
            teacher(3, &["Math", "English"]),
        ];
        let classrooms = vec![
            Classroom::new(1, "Room 101", "Lecture", 40),
            Classroom::new(2, "Lab A", "Lab", 40),
        ];

        let outcome = run(&sections, &subjects, &teachers, &classrooms);
        assert!(!outcome.placements.is_empty());
        assert!(report::same_day_duplicates(&outcome.placements).is_empty());

        let placements = &outcome.placements;
        for (i, a) in placements.iter().enumerate() {
            assert_eq!(
                a.duration_minutes() % 30,
                0,
                "placement {a:?} is not a whole number of windows"
            );
            for b in &placements[i + 1..] {
                let shares = a.teacher_id == b.teacher_id || a.classroom_id == b.classroom_id;
                if shares && a.date == b.date {
                    assert!(
                        !intervals_overlap(a.start_time, a.end_time, b.start_time, b.end_time),
                        "{a:?} overlaps {b:?}"
                    );
                }
            }
        }
    }
}
