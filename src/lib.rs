//! Local activity-tracking daemon: samples the foreground window once per
//! second, collapses continuous focus into duration-accumulating activity
//! records in SQLite, classifies records into categories, and serves the
//! timeline over a small HTTP API.

pub mod api;
pub mod categorize;
pub mod db;
pub mod probe;
pub mod query;
pub mod settings;
pub mod tracker;
