//! Weekly class timetabling.
//!
//! Sections, subjects, teachers and classrooms go in; dated, conflict-free
//! placements come out. [`service::SchedulingService`] runs either a full
//! greedy allocation over the catalog or places individual weekly requests
//! against what is already committed.

pub mod balance;
pub mod config;
pub mod data;
pub mod error;
pub mod grid;
pub mod oracle;
pub mod report;
pub mod requests;
pub mod server;
pub mod service;
pub mod solver;
pub mod store;
