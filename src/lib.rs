//! taskmirror keeps a list of UI-annotation tasks in `tasks.json`, mirrors it
//! to a human-readable `tasks.md`, and upgrades projects still carrying the
//! older annotation files.

pub mod build_info;
pub mod commands;
pub mod config;
pub mod error;
pub mod legacy;
pub mod model;
pub mod output;
pub mod render;
pub mod store;
