//! Upload admission and file-safety gate.

pub mod clock;
pub mod config;
pub mod convert;
pub mod error;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod upload;

pub use config::schema::GateConfig;
pub use error::GateError;
pub use gate::{EndpointLimit, SecurityGate};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
