//! gitsnap - Compare environments across the repositories of an Azure DevOps project
//!
//! An environment is a reference in every repository: a branch, the most
//! recent tag matching a glob, or a fixed commit. gitsnap resolves a SOURCE
//! and a TARGET environment in each repository over the REST API and reports
//! whether the two are aligned, divergent, or could not be compared, with
//! the commits and files that differ.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Reference resolution, diffing and the concurrent comparison run
//! - [`core`] - Domain types and configuration
//! - [`forge`] - Abstraction over the remote service, with the Azure DevOps client
//! - [`ui`] - Output formatting
//!
//! # Guarantees
//!
//! 1. Nothing is ever written to the remote service
//! 2. One report per repository, in listing order, whatever fails
//! 3. The access token is never persisted or printed

pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod ui;
