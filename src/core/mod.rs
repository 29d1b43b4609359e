//! core
//!
//! Core domain types and configuration for gitsnap.
//!
//! # Modules
//!
//! - [`types`] - Repositories, reference specs, resolved refs and reports
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Types here are plain data: no I/O, no remote calls
//! - Schemas are strict and self-describing

pub mod config;
pub mod types;
