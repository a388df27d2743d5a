//! Application use cases.

pub mod progression;
