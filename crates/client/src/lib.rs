//! REST client for the OpsDeck workflow instance endpoints.
//!
//! [`ConsoleApi`] wraps the HTTP API with [`reqwest`]; [`InstanceBackend`]
//! is the seam the instance manager talks to, so it can run against the
//! real service or an in-memory fake.

pub mod api;
pub mod backend;

pub use api::{ApiError, ClientConfig, ConsoleApi, InstancePage, InstanceQuery};
pub use backend::InstanceBackend;
