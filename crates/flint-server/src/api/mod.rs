//! REST API
//!
//! Route table, request/response types and handlers.

mod extractors;
mod handlers;
mod router;
mod types;


pub use router::create_router;
pub use types::*;
