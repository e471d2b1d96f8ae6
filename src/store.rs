//! Storage collaborator contracts and the in-memory implementation.
//!
//! The engine only reads the catalog and appends placements; editing and
//! deleting records is left to whatever owns the store.

use crate::data::{
    Catalog, Classroom, ClassroomId, Placement, PlacementId, Section, Subject, Teacher, TeacherId,
};
use crate::error::StoreResult;
use crate::oracle::intervals_overlap;
use chrono::{NaiveDate, NaiveTime};
use parking_lot::RwLock;

/// Read access to the entity catalog.
pub trait CatalogStore: Send + Sync {
    fn teachers(&self) -> StoreResult<Vec<Teacher>>;
    fn classrooms(&self) -> StoreResult<Vec<Classroom>>;
    fn sections(&self) -> StoreResult<Vec<Section>>;
    /// Subjects ordered by priority descending, then name ascending.
    fn subjects(&self) -> StoreResult<Vec<Subject>>;

    fn teachers_for_subject(&self, subject: &str) -> StoreResult<Vec<Teacher>> {
        Ok(self
            .teachers()?
            .into_iter()
            .filter(|t| t.teaches(subject))
            .collect())
    }

    fn classrooms_for(&self, min_capacity: u32, room_type: &str) -> StoreResult<Vec<Classroom>> {
        Ok(self
            .classrooms()?
            .into_iter()
            .filter(|c| c.suits(min_capacity, room_type))
            .collect())
    }
}

/// Persistence and queries for committed placements.
pub trait PlacementStore: Send + Sync {
    /// Persists a placement and returns it with its assigned id.
    fn save_placement(&self, placement: Placement) -> StoreResult<Placement>;
    fn placements(&self) -> StoreResult<Vec<Placement>>;

    fn placements_by_teacher(&self, teacher: TeacherId) -> StoreResult<Vec<Placement>> {
        Ok(self
            .placements()?
            .into_iter()
            .filter(|p| p.teacher_id == teacher)
            .collect())
    }

    fn placements_by_classroom(&self, classroom: ClassroomId) -> StoreResult<Vec<Placement>> {
        Ok(self
            .placements()?
            .into_iter()
            .filter(|p| p.classroom_id == classroom)
            .collect())
    }

    fn placements_on(&self, date: NaiveDate) -> StoreResult<Vec<Placement>> {
        Ok(self
            .placements()?
            .into_iter()
            .filter(|p| p.date == date)
            .collect())
    }

    /// Placements dated within `[start, end]`, ordered by date then start time.
    fn placements_between(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<Placement>> {
        let mut found: Vec<Placement> = self
            .placements()?
            .into_iter()
            .filter(|p| p.date >= start && p.date <= end)
            .collect();
        found.sort_by_key(|p| (p.date, p.start_time));
        Ok(found)
    }

    fn conflicting_teacher_placements(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> StoreResult<Vec<Placement>> {
        Ok(self
            .placements_on(date)?
            .into_iter()
            .filter(|p| p.teacher_id == teacher)
            .filter(|p| intervals_overlap(p.start_time, p.end_time, start, end))
            .collect())
    }

    fn conflicting_classroom_placements(
        &self,
        classroom: ClassroomId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> StoreResult<Vec<Placement>> {
        Ok(self
            .placements_on(date)?
            .into_iter()
            .filter(|p| p.classroom_id == classroom)
            .filter(|p| intervals_overlap(p.start_time, p.end_time, start, end))
            .collect())
    }
}

/// Everything the scheduling service needs from storage.
pub trait Store: CatalogStore + PlacementStore {}

impl<T: CatalogStore + PlacementStore> Store for T {}

#[derive(Debug, Default)]
struct Tables {
    teachers: Vec<Teacher>,
    classrooms: Vec<Classroom>,
    sections: Vec<Section>,
    subjects: Vec<Subject>,
    placements: Vec<Placement>,
    next_placement_id: PlacementId,
}

/// Process-local store. Catalog records are replaced whole by id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

fn upsert<T>(records: &mut Vec<T>, record: T, same: impl Fn(&T) -> bool) {
    match records.iter_mut().find(|r| same(r)) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        let store = Self::new();
        store.load_catalog(catalog);
        store
    }

    pub fn load_catalog(&self, catalog: Catalog) {
        for teacher in catalog.teachers {
            self.upsert_teacher(teacher);
        }
        for classroom in catalog.classrooms {
            self.upsert_classroom(classroom);
        }
        for section in catalog.sections {
            self.upsert_section(section);
        }
        for subject in catalog.subjects {
            self.upsert_subject(subject);
        }
    }

    pub fn upsert_teacher(&self, teacher: Teacher) {
        let id = teacher.id;
        upsert(&mut self.tables.write().teachers, teacher, |t| t.id == id);
    }

    pub fn upsert_classroom(&self, classroom: Classroom) {
        let id = classroom.id;
        upsert(&mut self.tables.write().classrooms, classroom, |c| c.id == id);
    }

    pub fn upsert_section(&self, section: Section) {
        let id = section.id;
        upsert(&mut self.tables.write().sections, section, |s| s.id == id);
    }

    pub fn upsert_subject(&self, subject: Subject) {
        let id = subject.id;
        upsert(&mut self.tables.write().subjects, subject, |s| s.id == id);
    }
}

impl CatalogStore for MemoryStore {
    fn teachers(&self) -> StoreResult<Vec<Teacher>> {
        Ok(self.tables.read().teachers.clone())
    }

    fn classrooms(&self) -> StoreResult<Vec<Classroom>> {
        Ok(self.tables.read().classrooms.clone())
    }

    fn sections(&self) -> StoreResult<Vec<Section>> {
        Ok(self.tables.read().sections.clone())
    }

    fn subjects(&self) -> StoreResult<Vec<Subject>> {
        let mut subjects = self.tables.read().subjects.clone();
        subjects.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Ok(subjects)
    }
}

impl PlacementStore for MemoryStore {
    fn save_placement(&self, placement: Placement) -> StoreResult<Placement> {
        let mut tables = self.tables.write();
        tables.next_placement_id += 1;
        let saved = placement.with_id(tables.next_placement_id);
        tables.placements.push(saved.clone());
        Ok(saved)
    }

    fn placements(&self) -> StoreResult<Vec<Placement>> {
        Ok(self.tables.read().placements.clone())
    }

    fn placements_on(&self, date: NaiveDate) -> StoreResult<Vec<Placement>> {
        Ok(self
            .tables
            .read()
            .placements
            .iter()
            .filter(|p| p.date == date)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    fn meeting(date: NaiveDate, start: NaiveTime, end: NaiveTime, teacher: u64, room: u64) -> Placement {
        Placement::new(date, Weekday::Mon, start, end, teacher, room, "Math")
    }

    #[test]
    fn test_save_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.save_placement(meeting(d(2), t(8, 0), t(9, 0), 1, 1)).unwrap();
        let b = store.save_placement(meeting(d(2), t(9, 0), t(10, 0), 1, 1)).unwrap();
        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(2));
        assert_eq!(store.placements().unwrap().len(), 2);
        assert_eq!(store.placements_by_teacher(1).unwrap().len(), 2);
        assert!(store.placements_by_classroom(2).unwrap().is_empty());
    }

    #[test]
    fn test_conflict_queries_use_half_open_overlap() {
        let store = MemoryStore::new();
        store.save_placement(meeting(d(2), t(9, 0), t(10, 0), 1, 1)).unwrap();

        // touching endpoints do not conflict
        assert!(store.conflicting_teacher_placements(1, d(2), t(8, 0), t(9, 0)).unwrap().is_empty());
        assert!(store.conflicting_teacher_placements(1, d(2), t(10, 0), t(11, 0)).unwrap().is_empty());
        assert_eq!(store.conflicting_teacher_placements(1, d(2), t(9, 30), t(10, 30)).unwrap().len(), 1);
        assert_eq!(store.conflicting_classroom_placements(1, d(2), t(8, 0), t(12, 0)).unwrap().len(), 1);
        // other date, other teacher
        assert!(store.conflicting_teacher_placements(1, d(3), t(9, 0), t(10, 0)).unwrap().is_empty());
        assert!(store.conflicting_teacher_placements(2, d(2), t(9, 0), t(10, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_between_is_inclusive_and_ordered() {
        let store = MemoryStore::new();
        store.save_placement(meeting(d(4), t(9, 0), t(10, 0), 1, 1)).unwrap();
        store.save_placement(meeting(d(2), t(13, 0), t(14, 0), 1, 1)).unwrap();
        store.save_placement(meeting(d(2), t(8, 0), t(9, 0), 1, 1)).unwrap();
        store.save_placement(meeting(d(9), t(8, 0), t(9, 0), 1, 1)).unwrap();

        let found = store.placements_between(d(2), d(4)).unwrap();
        let keys: Vec<(NaiveDate, NaiveTime)> = found.iter().map(|p| (p.date, p.start_time)).collect();
        assert_eq!(keys, vec![(d(2), t(8, 0)), (d(2), t(13, 0)), (d(4), t(9, 0))]);
    }

    #[test]
    fn test_upsert_replaces_by_id_and_subjects_sorted() {
        let store = MemoryStore::new();
        store.upsert_subject(Subject::new(1, "Art", 1.0).with_priority(1));
        store.upsert_subject(Subject::new(2, "Math", 3.0).with_priority(5));
        store.upsert_subject(Subject::new(3, "Biology", 2.0).with_priority(5));
        store.upsert_subject(Subject::new(1, "Art", 2.0).with_priority(1));

        let subjects = store.subjects().unwrap();
        let names: Vec<&str> = subjects.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Biology", "Math", "Art"]);
        assert_eq!(subjects[2].duration_hours, 2.0);
    }

    #[test]
    fn test_filtered_catalog_lookups() {
        let store = MemoryStore::from_catalog(Catalog {
            teachers: vec![
                Teacher::new(1, "A", t(8, 0), t(16, 0)).with_subjects(["Math"]),
                Teacher::new(2, "B", t(8, 0), t(16, 0)).with_subjects(["Art"]),
            ],
            classrooms: vec![
                Classroom::new(1, "Lab", "Lab", 40),
                Classroom::new(2, "Small", "Lecture", 10),
            ],
            ..Catalog::default()
        });
        let math: Vec<u64> = store.teachers_for_subject("Math").unwrap().iter().map(|t| t.id).collect();
        assert_eq!(math, vec![1]);
        assert_eq!(store.classrooms_for(20, "Any").unwrap().len(), 1);
        assert!(store.classrooms_for(20, "Gym").unwrap().is_empty());
    }
}
