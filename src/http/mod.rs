//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, compress handler)
//!     → gate admission (blacklist, suspicious activity, rate limit)
//!     → request.rs (header checks, multipart form)
//!     → gate inspection (upload policy, signatures)
//!     → convert, name, encode
//!     → response.rs (JSON body, rate limit headers, error mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{read_upload_form, UploadForm};
pub use response::{ApiError, CompressResponse};
pub use server::{build_router, AppState, HttpServer};
