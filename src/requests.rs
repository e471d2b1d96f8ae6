//! Request generation: turns every (section, subject) pair into block requests.
//!
//! A subject's weekly hours are converted to half-hour units and split into
//! blocks of at most three units, preferring one-hour blocks. The resulting
//! requests are ordered by subject priority, then by block length, which is
//! the only notion of importance the allocator has.

use crate::data::{Section, Subject};
use log::{debug, warn};

/// Longest block the splitter emits, in half-hour units.
pub const MAX_BLOCK_UNITS: u32 = 3;

/// Most units a subject can ask of one section per week: a full-length block
/// on each of the five weekdays.
pub const MAX_WEEKLY_UNITS: u32 = MAX_BLOCK_UNITS * 5;

/// One contiguous block of a subject to place for a section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockRequest<'a> {
    pub section: &'a Section,
    pub subject: &'a Subject,
    pub required_capacity: u32,
    pub room_type: &'a str,
    pub priority: i32,
    /// 0-based index among the blocks generated for this subject.
    pub sequence: u32,
    /// Block length in half-hour units.
    pub units: u32,
}

/// Converts weekly hours to half-hour units, rounding to the nearest unit.
pub fn hours_to_units(hours: f64) -> u32 {
    if !hours.is_finite() || hours <= 0.0 {
        return 0;
    }
    (hours * 2.0).round() as u32
}

/// Splits `units` half-hour units into block lengths.
///
/// Six and seven units are fixed at `[2, 2, 2]` and `[2, 2, 3]`. Otherwise a
/// 1.5-hour block is taken whenever the rest stays an even number of at least
/// two units, and a 1-hour block is taken when it would not.
pub fn split_units(units: u32) -> Vec<u32> {
    match units {
        6 => return vec![2, 2, 2],
        7 => return vec![2, 2, 3],
        _ => {}
    }

    let mut blocks = Vec::new();
    let mut remaining = units;
    while remaining > 0 {
        match remaining {
            1 => blocks.push(1),
            2 => blocks.push(2),
            3 => blocks.push(3),
            4 => blocks.extend([2, 2]),
            5 => blocks.extend([2, 3]),
            _ => {
                let take = if (remaining - 3) % 2 == 0 && remaining - 3 >= 2 { 3 } else { 2 };
                blocks.push(take);
                remaining -= take;
                continue;
            }
        }
        remaining = 0;
    }
    blocks
}

/// Builds the ordered request list for every section × subject pair.
///
/// Subjects whose duration converts to zero units, or to more than
/// [`MAX_WEEKLY_UNITS`], produce no requests.
pub fn generate_requests<'a>(
    sections: &'a [Section],
    subjects: &'a [Subject],
) -> Vec<BlockRequest<'a>> {
    let mut requests = Vec::new();

    for section in sections {
        for subject in subjects {
            let units = hours_to_units(subject.duration_hours);
            if units == 0 {
                warn!(
                    "Subject {} has no schedulable duration ({} hours), skipping",
                    subject.name, subject.duration_hours
                );
                continue;
            }
            if units > MAX_WEEKLY_UNITS {
                warn!(
                    "Subject {} asks for {} hours a week, more than a section can take, skipping",
                    subject.name, subject.duration_hours
                );
                continue;
            }
            let blocks = split_units(units);
            debug!(
                "{} - {}: {} hours = {} units split into {:?}",
                section.section_name, subject.name, subject.duration_hours, units, blocks
            );

            requests.extend(blocks.into_iter().enumerate().map(|(i, block)| BlockRequest {
                section,
                subject,
                required_capacity: section.student_count,
                room_type: subject.required_room_type.as_str(),
                priority: subject.priority,
                sequence: i as u32,
                units: block,
            }));
        }
    }

    // stable sort keeps insertion order for ties
    requests.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.units.cmp(&a.units))
    });
    requests
}
