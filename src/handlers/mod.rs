//! HTTP handlers, one module per API area. Handlers extract, call a
//! service, and wrap the result in [`ApiResponse`](crate::middleware::ApiResponse).

pub mod attendance;
pub mod auth;
pub mod communications;
pub mod dashboards;
pub mod fees;
pub mod reports;
pub mod setup;
pub mod students;
pub mod system;
pub mod users;
