//! Wiring shared by the quakewatch binaries: building the store and the
//! source adapter from resolved settings, and turning OS signals into a
//! cancellation token.

// Each binary uses a different subset.
#![allow(dead_code)]

pub mod components;
pub mod shutdown;
