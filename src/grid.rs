//! The half-hour slot grid and the run-scoped occupancy state.
//!
//! `SlotGrid` is immutable and shared; `SlotLedger` and `SubjectDayRegistry`
//! belong to a single generation run and are dropped with it.

use crate::config::GridConfig;
use crate::data::{ClassroomId, SectionId, TeacherId};
use crate::error::ConfigError;
use chrono::{NaiveTime, Timelike, Weekday};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

pub const WINDOW_MINUTES: u32 = 30;

/// One half-hour teaching window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Ordered windows of a teaching day, lunch gap excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotGrid {
    windows: Vec<Window>,
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

fn time_at(minutes: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

impl SlotGrid {
    pub fn from_config(config: &GridConfig) -> Result<Self, ConfigError> {
        if config.sessions.is_empty() {
            return Err(ConfigError::InvalidGrid("no teaching sessions".into()));
        }

        let mut windows = Vec::new();
        let mut previous_end: Option<NaiveTime> = None;
        for session in &config.sessions {
            if session.start >= session.end {
                return Err(ConfigError::InvalidGrid(format!(
                    "session {}-{} does not end after it starts",
                    session.start, session.end
                )));
            }
            if previous_end.is_some_and(|end| session.start < end) {
                return Err(ConfigError::InvalidGrid(format!(
                    "session {}-{} overlaps or precedes the previous one",
                    session.start, session.end
                )));
            }
            let (start, end) = (minutes_of(session.start), minutes_of(session.end));
            let whole_minutes =
                |time: NaiveTime| time.second() == 0 && time.nanosecond() == 0;
            if !whole_minutes(session.start)
                || !whole_minutes(session.end)
                || (end - start) % WINDOW_MINUTES != 0
            {
                return Err(ConfigError::InvalidGrid(format!(
                    "session {}-{} is not a whole number of {WINDOW_MINUTES}-minute windows",
                    session.start, session.end
                )));
            }

            for offset in (start..end).step_by(WINDOW_MINUTES as usize) {
                let (Some(w_start), Some(w_end)) =
                    (time_at(offset), time_at(offset + WINDOW_MINUTES))
                else {
                    return Err(ConfigError::InvalidGrid(format!(
                        "window at minute {offset} is out of range"
                    )));
                };
                windows.push(Window {
                    start: w_start,
                    end: w_end,
                });
            }
            previous_end = Some(session.end);
        }

        Ok(Self { windows })
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Start and end time of `units` windows from `start`, if they exist and run back to back.
    pub fn span(&self, start: usize, units: usize) -> Option<(NaiveTime, NaiveTime)> {
        if units == 0 || start + units > self.windows.len() {
            return None;
        }
        let span = &self.windows[start..start + units];
        if span.windows(2).any(|pair| pair[0].end != pair[1].start) {
            return None;
        }
        Some((span[0].start, span[units - 1].end))
    }
}

impl Default for SlotGrid {
    fn default() -> Self {
        // the default sessions are always well formed
        Self::from_config(&GridConfig::default()).unwrap_or(Self {
            windows: Vec::new(),
        })
    }
}

/// Uniqueness token for a booked (day, window, teacher, classroom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub day: Weekday,
    pub window: usize,
    pub teacher: TeacherId,
    pub classroom: ClassroomId,
}

/// Who a span of windows is being booked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Booking {
    pub teacher: TeacherId,
    pub classroom: ClassroomId,
}

/// Returned when a reservation would overlap something already booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTaken {
    pub day: Weekday,
    pub window: usize,
}

/// Slots consumed during one run.
///
/// Only teachers and classrooms are exclusive. A section may be booked into
/// overlapping windows when each meeting has its own teacher and room.
#[derive(Debug, Default)]
pub struct SlotLedger {
    used: HashSet<SlotKey>,
    teachers: HashSet<(Weekday, usize, TeacherId)>,
    classrooms: HashSet<(Weekday, usize, ClassroomId)>,
}

impl SlotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_free(&self, day: Weekday, window: usize, booking: Booking) -> bool {
        let key = SlotKey {
            day,
            window,
            teacher: booking.teacher,
            classroom: booking.classroom,
        };
        !self.used.contains(&key)
            && !self.teachers.contains(&(day, window, booking.teacher))
            && !self.classrooms.contains(&(day, window, booking.classroom))
    }

    pub fn is_span_free(&self, day: Weekday, windows: Range<usize>, booking: Booking) -> bool {
        windows.into_iter().all(|w| self.is_free(day, w, booking))
    }

    /// Books every window of the span, or none of them.
    pub fn reserve(
        &mut self,
        day: Weekday,
        windows: Range<usize>,
        booking: Booking,
    ) -> Result<(), SlotTaken> {
        if let Some(window) = windows.clone().find(|&w| !self.is_free(day, w, booking)) {
            return Err(SlotTaken { day, window });
        }
        for window in windows {
            self.used.insert(SlotKey {
                day,
                window,
                teacher: booking.teacher,
                classroom: booking.classroom,
            });
            self.teachers.insert((day, window, booking.teacher));
            self.classrooms.insert((day, window, booking.classroom));
        }
        Ok(())
    }

    /// Number of reserved slot keys.
    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Subjects already placed for each section on each day.
#[derive(Debug, Default)]
pub struct SubjectDayRegistry {
    seen: HashMap<(SectionId, Weekday), HashSet<String>>,
}

impl SubjectDayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, section: SectionId, day: Weekday, subject: &str) -> bool {
        self.seen
            .get(&(section, day))
            .is_some_and(|subjects| subjects.contains(subject))
    }

    /// Records the subject; returns false if it was already there.
    pub fn record(&mut self, section: SectionId, day: Weekday, subject: &str) -> bool {
        self.seen
            .entry((section, day))
            .or_default()
            .insert(subject.to_string())
    }
}
