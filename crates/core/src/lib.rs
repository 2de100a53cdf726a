//! Domain types for the OpsDeck workflow instance console.
//!
//! Zero internal dependencies: the instance model, lifecycle action guards,
//! pagination window arithmetic, and input validation live here so the REST
//! client, the instance manager, and the operator binary all agree on them.

pub mod error;
pub mod pagination;
pub mod types;
pub mod workflow_instance;
