#![warn(clippy::unwrap_used)]

pub mod attestation;
pub mod electra;
