pub mod diff;
pub mod setup;
