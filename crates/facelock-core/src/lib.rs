//! Face embedding extraction and matching decisions.
//!
//! Everything here is a pure in-process computation over data the caller has
//! already loaded. Storage, sessions and lockout policy belong to the caller.

pub mod errors;
pub mod faces;
