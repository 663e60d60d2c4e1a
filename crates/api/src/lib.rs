//! HTTP API: router, envelope, authentication guard and handlers.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
