//! GitHub Maintenance Exporter - tracks machine and site maintenance declared
//! in GitHub issues and exports it as Prometheus gauges.
//!
//! This library provides the maintenance state engine, the site directory it
//! consults, and the HTTP surface that feeds it from GitHub webhooks.

pub mod commands;
pub mod config;
pub mod directory;
pub mod maintenance;
pub mod metrics;
pub mod persistence;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
