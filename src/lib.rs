//! Pulumi resource provider for Buddy.works
//!
//! This crate implements the `pulumirpc.ResourceProvider` gRPC service for the
//! Buddy.works CI/CD platform. The Pulumi engine starts the
//! `pulumi-resource-buddy` binary, reads the port it listens on and drives
//! Check/Diff/Create/Read/Update/Delete/Invoke calls against it; the provider
//! turns those into Buddy REST requests.
//!
//! # Overview
//!
//! - **Diff engine** ([`differ`], [`rules`]): per-kind declarative tables of
//!   `(field, mapped path, replace)` rules evaluated against the previous
//!   inputs, the proposed inputs and the recorded outputs.
//! - **Identity** ([`identity`]): the `kind:id/kind:id` composite id codec and
//!   the `a~~~b` binding id used by membership resources.
//! - **Dispatcher** ([`dispatcher`]): routes calls to the handler for a
//!   resource's kind and remembers Check's olds per urn for Diff.
//! - **Resources** ([`resources`]): one lifecycle handler per kind.
//! - **Server** ([`server`]): the gRPC wrapper, handshake and shutdown.
//!
//! # Example
//!
//! ```
//! use pulumi_resource_buddy::resources::group;
//! use serde_json::json;
//!
//! let olds = json!({"name": "devs"});
//! let news = json!({"name": "engineers"});
//! let props = json!({"id": 4, "name": "devs"});
//!
//! let diff = group::RULES.evaluate(&olds, &news, &props);
//! assert_eq!(diff.diffs, vec!["name"]);
//! assert!(diff.replaces.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod differ;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod invoke;
pub mod logging;
pub mod properties;
pub mod provider;
pub mod resources;
pub mod rules;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use differ::Differ;
pub use dispatcher::Dispatcher;
pub use error::ProviderError;
pub use identity::{BindingId, CompositeId, Kind};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::BuddyProvider;
pub use rules::{DiffRules, FieldRule};
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{CheckFailure, CheckResult, CreateResult, DiffChanges, DiffResult, ReadResult};
