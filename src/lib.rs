//! Lattice Provider SDK
//!
//! This crate is the schema-driven core used to build Lattice providers:
//! declare a resource's attribute schema once and get configuration
//! validation, structural state-vs-config diffing, typed accessors inside
//! CRUD callbacks, and forced replacement for immutable fields.
//!
//! # Overview
//!
//! The SDK provides:
//!
//! - **Schema types**: [`SchemaMap`] and [`Attribute`] describe attribute
//!   types, roles (required / optional / computed), defaults, and the
//!   `force_new` change policy
//! - **Validation**: walk a raw configuration against the schema and
//!   collect every finding as [`Diagnostic`]s
//! - **Diffing**: [`InstanceDiff`] captures per-attribute changes between
//!   prior state and desired configuration, computed entirely from the
//!   schema
//! - **ResourceData**: the typed read/write facade handed to every CRUD
//!   callback
//! - **Resource & Provider**: bundle schemas with callbacks and dispatch
//!   the engine-side operations
//! - **Logging**: `tracing` integration for structured provider logs
//! - **Testing**: a harness that drives the full plan/apply pipeline
//!   without an engine
//!
//! # Quick start
//!
//! ```ignore
//! use lattice_provider_sdk::{Attribute, Provider, Resource, SchemaMap};
//!
//! struct Client { /* api handles */ }
//!
//! fn provider() -> Provider<Client> {
//!     let app = Resource::new(SchemaMap::new()
//!         .with_attribute("name", Attribute::required_string())
//!         .with_attribute("region", Attribute::optional_string()
//!             .with_default("us-east"))
//!         .with_attribute("id", Attribute::computed_string()))
//!     .create(|d, client: &Client| {
//!         let name = d.get("name").flat_string();
//!         // ... call the remote API ...
//!         d.set_id(format!("{name}-1"));
//!         Ok(())
//!     })
//!     .read(|d, client| { /* refresh computed attributes */ Ok(()) })
//!     .update(|d, client| { /* apply in-place changes */ Ok(()) })
//!     .delete(|d, client| { /* tear down */ Ok(()) });
//!
//!     Provider::new()
//!         .with_schema(SchemaMap::new()
//!             .with_attribute("token", Attribute::required_string().sensitive()))
//!         .with_configure(|d| Ok(Client { /* ... */ }))
//!         .with_resource("lattice_app", app)
//! }
//! ```
//!
//! # Pipeline
//!
//! For one resource in a plan/apply cycle the engine calls, in order:
//! `validate` on the configuration, `diff` against prior state, `apply`
//! with the resulting [`InstanceDiff`] (which drives the create, update,
//! or delete callback through a [`ResourceData`]), and `refresh` on later
//! runs. All calls are synchronous; the engine parallelizes across
//! resource instances, never within one.
//!
//! # Flat form
//!
//! State attributes are flat string maps keyed by dotted paths: a list
//! `x` stores `x.#` (count) plus `x.0`, `x.1`, …; a map stores `x.%`
//! plus `x.<key>`; a set stores elements keyed by a stable hash. The
//! schema reconstructs typed values from this form; nothing else does.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod diff;
pub mod error;
pub mod flatmap;
pub mod logging;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod state;
pub mod testing;
pub mod validation;
pub mod value;

// Re-export the main types at the crate root.
pub use config::ResourceConfig;
pub use data::ResourceData;
pub use diff::{AttributeDiff, InstanceDiff};
pub use error::{CallbackError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ConfigureFunc, Provider};
pub use resource::{CallbackResult, Resource, ResourceFunc};
pub use schema::{
    Attribute, AttributeType, Diagnostic, DiagnosticSeverity, Elem, SchemaMap, SetHashFunc,
    StateFunc, ValidateFunc,
};
pub use state::ResourceState;
pub use validation::{is_valid, validate, validate_result};
pub use value::Value;

// Re-export commonly used external crates.
pub use serde_json;
pub use tracing;
