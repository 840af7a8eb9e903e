//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access.rs (resolve client address, blacklist lookup)
//!     → suspicious.rs (long-horizon abuse counter)
//!     → rate_limit.rs (per-identifier token bucket)
//!     → Pass to upload inspection
//!
//! Every response:
//!     → headers.rs (hardening headers, CORS)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any admission check failure
//! - No retries inside the gate; denials go straight back to the caller
//! - Shared state lives in `store.rs`, one lock per identifier shard

pub mod access;
pub mod headers;
pub mod rate_limit;
pub mod store;
pub mod suspicious;
pub mod token_bucket;

pub use access::{client_ip, is_valid_ip, IpBlacklist};
pub use headers::security_headers;
pub use rate_limit::{RateLimitDecision, RateLimitRegistry};
pub use store::EvictionPolicy;
pub use suspicious::{SuspiciousActivityTracker, SuspiciousPolicy};
pub use token_bucket::TokenBucket;
