//! Web API module for Jotter.
//!
//! This module provides the REST API over folders, files, storage quota,
//! activity and the private-space PIN.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
