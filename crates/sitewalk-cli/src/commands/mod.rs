pub mod common;
pub mod completions;
pub mod inspections;
pub mod sites;
pub mod status;
pub mod sync;
pub mod watch;
