//! Engine backends.

pub mod embedded;
