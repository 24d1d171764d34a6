//! Core engine for the recruitment portal: the permission-gated candidate
//! pipeline state machine, the dynamic permission store with its static
//! fallback policy, and the append-only rejection ledger.

pub mod coalesce;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod rbac;
pub mod telemetry;
