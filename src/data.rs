use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for clarity
pub type TeacherId = u64;
pub type ClassroomId = u64;
pub type SectionId = u64;
pub type SubjectId = u64;
pub type PlacementId = u64;

/// Room type accepted by a subject that can meet in any classroom.
pub const ANY_ROOM_TYPE: &str = "Any";

/// A teacher with the subjects they can teach and a single daily availability window.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    pub full_name: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub available_days: Vec<Weekday>,
    pub available_start: NaiveTime,
    pub available_end: NaiveTime,
}

impl Teacher {
    pub fn new(
        id: TeacherId,
        full_name: impl Into<String>,
        available_start: NaiveTime,
        available_end: NaiveTime,
    ) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            subjects: Vec::new(),
            available_days: Vec::new(),
            available_start,
            available_end,
        }
    }

    pub fn with_subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.available_days = days.into_iter().collect();
        self
    }

    pub fn teaches(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }

    /// True when the teacher works on `day` and `[start, end)` lies inside their window.
    pub fn is_available(&self, day: Weekday, start: NaiveTime, end: NaiveTime) -> bool {
        self.available_days.contains(&day)
            && self.available_start <= start
            && self.available_end >= end
    }
}

/// A physical room with a type tag and a seat capacity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub id: ClassroomId,
    pub room_name: String,
    pub room_type: String,
    pub capacity: u32,
}

impl Classroom {
    pub fn new(
        id: ClassroomId,
        room_name: impl Into<String>,
        room_type: impl Into<String>,
        capacity: u32,
    ) -> Self {
        Self {
            id,
            room_name: room_name.into(),
            room_type: room_type.into(),
            capacity,
        }
    }

    /// Capacity covers `required` seats and the type matches, `"Any"` matching every room.
    pub fn suits(&self, required: u32, room_type: &str) -> bool {
        self.capacity >= required && (room_type == ANY_ROOM_TYPE || self.room_type == room_type)
    }
}

/// Which weekdays a section meets on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchedulePattern {
    #[default]
    Mwf,
    Tth,
    Daily,
}

impl SchedulePattern {
    pub fn days(self) -> &'static [Weekday] {
        match self {
            SchedulePattern::Mwf => &[Weekday::Mon, Weekday::Wed, Weekday::Fri],
            SchedulePattern::Tth => &[Weekday::Tue, Weekday::Thu],
            SchedulePattern::Daily => &[
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }
}

/// A group of students that takes every subject together.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub section_name: String,
    pub student_count: u32,
    #[serde(default)]
    pub schedule_pattern: Option<SchedulePattern>,
}

impl Section {
    pub fn new(id: SectionId, section_name: impl Into<String>, student_count: u32) -> Self {
        Self {
            id,
            section_name: section_name.into(),
            student_count,
            schedule_pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: SchedulePattern) -> Self {
        self.schedule_pattern = Some(pattern);
        self
    }

    /// Meeting days, falling back to Mon/Wed/Fri when no pattern is set.
    pub fn meeting_days(&self) -> &'static [Weekday] {
        self.schedule_pattern.unwrap_or_default().days()
    }
}

/// A subject with its weekly load in hours.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    #[serde(default)]
    pub code: String,
    pub duration_hours: f64,
    pub required_room_type: String,
    pub priority: i32,
}

impl Subject {
    pub fn new(id: SubjectId, name: impl Into<String>, duration_hours: f64) -> Self {
        Self {
            id,
            name: name.into(),
            code: String::new(),
            duration_hours,
            required_room_type: ANY_ROOM_TYPE.to_string(),
            priority: 1,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_room_type(mut self, room_type: impl Into<String>) -> Self {
        self.required_room_type = room_type.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// The full catalog snapshot a generation run reads.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub classrooms: Vec<Classroom>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlacementStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

/// A committed class meeting.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    #[serde(default)]
    pub id: Option<PlacementId>,
    pub date: NaiveDate,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub teacher_id: TeacherId,
    pub classroom_id: ClassroomId,
    #[serde(default)]
    pub section_id: Option<SectionId>,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    pub subject: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub status: PlacementStatus,
    #[serde(default)]
    pub block_sequence: Option<u32>,
}

impl Placement {
    pub fn new(
        date: NaiveDate,
        day_of_week: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
        teacher_id: TeacherId,
        classroom_id: ClassroomId,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            date,
            day_of_week,
            start_time,
            end_time,
            teacher_id,
            classroom_id,
            section_id: None,
            subject_id: None,
            subject: subject.into(),
            notes: String::new(),
            recurring: false,
            status: PlacementStatus::Scheduled,
            block_sequence: None,
        }
    }

    pub fn with_id(mut self, id: PlacementId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_section(mut self, section_id: SectionId) -> Self {
        self.section_id = Some(section_id);
        self
    }

    pub fn with_subject_id(mut self, subject_id: SubjectId) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn recurring(mut self, recurring: bool) -> Self {
        self.recurring = recurring;
        self
    }

    pub fn with_block_sequence(mut self, sequence: u32) -> Self {
        self.block_sequence = Some(sequence);
        self
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// A fully specified meeting to place against the already-committed calendar.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRequest {
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub subject: String,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub section_id: Option<SectionId>,
    pub required_capacity: u32,
    #[serde(default = "any_room_type")]
    pub room_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub recurring: bool,
}

fn any_room_type() -> String {
    ANY_ROOM_TYPE.to_string()
}

/// Why a block request could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnscheduledReason {
    NoQualifiedTeacher,
    NoSuitableClassroom,
    NoFreeSlot,
}

impl fmt::Display for UnscheduledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnscheduledReason::NoQualifiedTeacher => "No Qualified Teacher",
            UnscheduledReason::NoSuitableClassroom => "No Suitable Classroom",
            UnscheduledReason::NoFreeSlot => "No Free Slot",
        };
        f.write_str(text)
    }
}

/// Describes a block request that was dropped from the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnscheduledRequest {
    pub section_id: SectionId,
    pub section_name: String,
    pub subject: String,
    pub block_sequence: u32,
    pub units: u32,
    pub reason: UnscheduledReason,
}

impl fmt::Display for UnscheduledRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Could not schedule {} - {} (Schedule {}, {} needed)",
            self.reason,
            self.section_name,
            self.subject,
            self.block_sequence + 1,
            describe_minutes(i64::from(self.units) * 30)
        )
    }
}

/// Renders a duration the way placement notes and diagnostics show it.
pub fn describe_minutes(minutes: i64) -> String {
    if minutes >= 60 {
        format!("{:.1} hours", minutes as f64 / 60.0)
    } else {
        format!("{minutes} minutes")
    }
}
