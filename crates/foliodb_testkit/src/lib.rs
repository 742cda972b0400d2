//! # FolioDB Testkit
//!
//! Test utilities for FolioDB.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent document access
//!
//! ## Usage
//!
//! ```
//! use foliodb_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     let doc = save_json(db, "greeting", serde_json::json!({"text": "hi"}));
//!     assert_eq!(doc.get_string("text").unwrap().as_deref(), Some("hi"));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
