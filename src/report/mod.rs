//! Report rendering.
//!
//! Turns a metric snapshot and its run metadata into Markdown or JSON.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report};
