//! waitwatch library
//!
//! Fetch/cache/sort pipeline and alert checking for park wait times.
//! Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
