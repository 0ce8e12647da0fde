//! # Herald Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # A running node plus an outcome queue on the exchange
//! │
//! └── integration/      # Cross-service choreography
//!     ├── lifecycle.rs  # create → deliver → read → acknowledge
//!     ├── broadcast.rs  # user.list round trip through identity
//!     ├── dead_letter.rs# reject, retry budget, DLQ retention
//!     ├── identity.rs   # register / login over the bus
//!     └── correlation.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p hd-tests
//!
//! # By category
//! cargo test -p hd-tests integration::dead_letter::
//!
//! # Benchmarks
//! cargo bench -p hd-tests
//! ```

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

pub mod harness;
pub mod integration;
