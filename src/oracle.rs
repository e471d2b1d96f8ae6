//! Conflict checks against already-persisted placements.
//!
//! Used by the incremental path, which places one fully specified meeting at
//! a time instead of running the grid allocator.

use crate::data::{Classroom, ClassroomId, Placement, Teacher, TeacherId, WeeklyRequest};
use crate::error::StoreResult;
use crate::store::PlacementStore;
use chrono::{NaiveDate, NaiveTime};
use itertools::iproduct;
use log::{debug, trace};

/// Half-open overlap: `[s1, e1)` and `[s2, e2)` share time. Touching ends do not.
pub fn intervals_overlap(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && s2 < e1
}

pub struct ConflictOracle<'a, S: PlacementStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PlacementStore + ?Sized> ConflictOracle<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn teacher_conflicts(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> StoreResult<Vec<Placement>> {
        self.store
            .conflicting_teacher_placements(teacher, date, start, end)
    }

    pub fn classroom_conflicts(
        &self,
        classroom: ClassroomId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> StoreResult<Vec<Placement>> {
        self.store
            .conflicting_classroom_placements(classroom, date, start, end)
    }

    /// Neither the teacher nor the classroom has anything overlapping on `date`.
    pub fn is_conflict_free(
        &self,
        teacher: TeacherId,
        classroom: ClassroomId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> StoreResult<bool> {
        if !self.teacher_conflicts(teacher, date, start, end)?.is_empty() {
            return Ok(false);
        }
        Ok(self.classroom_conflicts(classroom, date, start, end)?.is_empty())
    }

    /// Commits `request` on `date` with the first conflict-free teacher/classroom pair.
    ///
    /// Candidates are filtered the same way the allocator filters them and tried
    /// in listed order. Returns `Ok(None)` when no pair is free.
    pub fn place(
        &self,
        request: &WeeklyRequest,
        date: NaiveDate,
        teachers: &[Teacher],
        classrooms: &[Classroom],
    ) -> StoreResult<Option<Placement>> {
        let (start, end) = (request.start_time, request.end_time);
        let day = request.day_of_week;

        let candidates = iproduct!(
            teachers
                .iter()
                .filter(|t| t.teaches(&request.subject) && t.is_available(day, start, end)),
            classrooms
                .iter()
                .filter(|c| c.suits(request.required_capacity, &request.room_type))
        );

        for (teacher, classroom) in candidates {
            if !self.is_conflict_free(teacher.id, classroom.id, date, start, end)? {
                trace!(
                    "Teacher {} / classroom {} busy on {date} {start}-{end}",
                    teacher.id, classroom.id
                );
                continue;
            }

            let mut placement = Placement::new(
                date,
                day,
                start,
                end,
                teacher.id,
                classroom.id,
                request.subject.clone(),
            )
            .with_notes(request.notes.clone().unwrap_or_default())
            .recurring(request.recurring);
            if let Some(section) = request.section_id {
                placement = placement.with_section(section);
            }
            if let Some(subject) = request.subject_id {
                placement = placement.with_subject_id(subject);
            }

            let saved = self.store.save_placement(placement)?;
            debug!(
                "Placed {} on {date} {start}-{end} with teacher {} in classroom {}",
                request.subject, teacher.id, classroom.id
            );
            return Ok(Some(saved));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Weekday;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    fn request(start: NaiveTime, end: NaiveTime) -> WeeklyRequest {
        WeeklyRequest {
            day_of_week: Weekday::Mon,
            start_time: start,
            end_time: end,
            subject: "Math".into(),
            subject_id: Some(7),
            section_id: Some(3),
            required_capacity: 25,
            room_type: "Lecture".into(),
            notes: Some("make-up class".into()),
            recurring: false,
        }
    }

    fn teachers() -> Vec<Teacher> {
        vec![
            Teacher::new(1, "First", t(8, 0), t(16, 0))
                .with_days([Weekday::Mon])
                .with_subjects(["Math"]),
            Teacher::new(2, "Second", t(8, 0), t(16, 0))
                .with_days([Weekday::Mon])
                .with_subjects(["Math"]),
        ]
    }

    #[test]
    fn test_overlap_is_half_open() {
        assert!(intervals_overlap(t(8, 0), t(9, 0), t(8, 30), t(9, 30)));
        assert!(intervals_overlap(t(8, 0), t(12, 0), t(9, 0), t(10, 0)));
        assert!(!intervals_overlap(t(8, 0), t(9, 0), t(9, 0), t(10, 0)));
        assert!(!intervals_overlap(t(10, 0), t(11, 0), t(8, 0), t(10, 0)));
    }

    #[test]
    fn test_place_takes_first_free_pair() {
        let store = MemoryStore::new();
        let oracle = ConflictOracle::new(&store);
        let classrooms = vec![Classroom::new(1, "101", "Lecture", 30)];

        let first = oracle
            .place(&request(t(9, 0), t(10, 0)), monday(), &teachers(), &classrooms)
            .unwrap()
            .unwrap();
        assert_eq!((first.teacher_id, first.classroom_id), (1, 1));
        assert_eq!(first.section_id, Some(3));
        assert_eq!(first.subject_id, Some(7));
        assert_eq!(first.notes, "make-up class");
        assert!(first.id.is_some());

        // the only classroom is now taken 9-10, whichever teacher is tried
        let clash = oracle
            .place(&request(t(9, 30), t(10, 30)), monday(), &teachers(), &classrooms)
            .unwrap();
        assert!(clash.is_none());

        let after = oracle
            .place(&request(t(10, 0), t(11, 0)), monday(), &teachers(), &classrooms)
            .unwrap()
            .unwrap();
        assert_eq!(after.teacher_id, 1);
    }

    #[test]
    fn test_busy_teacher_falls_through_to_next() {
        let store = MemoryStore::new();
        let oracle = ConflictOracle::new(&store);
        let classrooms = vec![
            Classroom::new(1, "101", "Lecture", 30),
            Classroom::new(2, "102", "Lecture", 30),
        ];
        oracle
            .place(&request(t(9, 0), t(10, 0)), monday(), &teachers(), &classrooms)
            .unwrap();
        let second = oracle
            .place(&request(t(9, 0), t(10, 0)), monday(), &teachers(), &classrooms)
            .unwrap()
            .unwrap();
        assert_eq!((second.teacher_id, second.classroom_id), (2, 2));
    }

    #[test]
    fn test_rejection_is_stable_without_new_commits() {
        let store = MemoryStore::new();
        let oracle = ConflictOracle::new(&store);
        store
            .save_placement(Placement::new(monday(), Weekday::Mon, t(9, 0), t(10, 0), 1, 1, "Art"))
            .unwrap();

        let first = oracle.is_conflict_free(1, 2, monday(), t(9, 0), t(9, 30)).unwrap();
        let again = oracle.is_conflict_free(1, 2, monday(), t(9, 0), t(9, 30)).unwrap();
        assert!(!first);
        assert_eq!(first, again);
        assert!(oracle.is_conflict_free(2, 2, monday(), t(9, 0), t(9, 30)).unwrap());
    }

    #[test]
    fn test_unsuitable_candidates_are_never_tried() {
        let store = MemoryStore::new();
        let oracle = ConflictOracle::new(&store);
        let small = vec![Classroom::new(1, "Closet", "Lecture", 5)];
        let placed = oracle
            .place(&request(t(9, 0), t(10, 0)), monday(), &teachers(), &small)
            .unwrap();
        assert!(placed.is_none());

        let classrooms = vec![Classroom::new(1, "101", "Lecture", 30)];
        // outside every teacher's window
        let late = oracle
            .place(&request(t(15, 30), t(16, 30)), monday(), &teachers(), &classrooms)
            .unwrap();
        assert!(late.is_none());
        assert!(store.placements().unwrap().is_empty());
    }
}
