//! Application-level orchestration.
//!
//! This module owns the search lifecycle (start/pause/resume/stop) and results export.
//! Console and one-shot front ends call into it and only render the events it emits.

mod controller;
mod export;

pub(crate) use controller::{run_controller, SearchController, UiCommand};
pub(crate) use export::PathDestination;
