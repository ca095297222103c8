//! Gantry Core
//!
//! Core types and abstractions for the Gantry pipeline engine.
//!
//! This crate contains:
//! - Domain types: pipelines, steps, runs, events
//! - Configuration: the on-disk YAML pipeline documents and their validation
//! - Trigger evaluation: the inclusion/exclusion predicate model shared by
//!   pipeline `trigger` clauses and step `when` clauses

pub mod config;
pub mod domain;
pub mod trigger;
