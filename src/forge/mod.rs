//! forge
//!
//! Abstraction for the remote Git hosting service.
//!
//! # Architecture
//!
//! The `Forge` trait defines the read-only interface the resolver and the
//! diff service use to talk to the remote. Commands build a concrete
//! [`azure::AzureDevOpsForge`] from the connection settings and hand it to
//! the engine as `&dyn Forge`; tests substitute [`mock::MockForge`].
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait, request and response types
//! - [`api_version`]: Protocol version candidates and negotiation cache
//! - [`retry`]: Backoff policy for network failures
//! - [`azure`]: Azure DevOps implementation over the Git REST API
//! - [`mock`]: Mock implementation for deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use gitsnap::forge::azure::{AzureDevOpsForge, ConnectionParams};
//! use gitsnap::forge::Forge;
//!
//! # async fn demo() -> Result<(), gitsnap::forge::ForgeError> {
//! let forge = AzureDevOpsForge::new(ConnectionParams::new("contoso", "Mobile", "pat"))?;
//! let version = forge.test_connection().await?;
//! println!("connected using api-version {}", version);
//!
//! for repo in forge.list_repositories().await? {
//!     println!("{}", repo.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api_version;
pub mod azure;
pub mod mock;
pub mod retry;
mod traits;

pub use api_version::ApiVersion;
pub use traits::*;
