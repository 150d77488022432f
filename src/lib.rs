//! Oracle Terminal Backend Library
//!
//! Exposes core modules for use by binaries and tests.

pub mod api;
pub mod control;
pub mod mission;
pub mod models;
pub mod positions;
pub mod thoughts;
