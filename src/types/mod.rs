//! Core domain types for the maintenance exporter.
//!
//! Identifiers, entity names and the enter/leave action shared by the
//! registry, the command parser and the webhook layer.

pub mod entity;
pub mod ids;

pub use entity::{Action, EntityError, EntityKind, MACHINE_SEPARATOR, MachineName};
pub use ids::{IssueId, Project, UnknownProject};
