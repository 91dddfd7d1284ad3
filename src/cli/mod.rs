//! Command handlers and terminal rendering

pub mod history;
pub mod probe;
pub mod schedule;
pub mod setup;
pub mod single;
pub mod stats;
pub mod ui;
