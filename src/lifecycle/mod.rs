//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Sweeper (sweeper.rs):
//!     Interval tick → Evict idle identifiers → Stop on shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod sweeper;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use sweeper::spawn_sweeper;
