#![warn(clippy::unwrap_used)]

pub mod attestation_data;
pub mod checkpoint;
pub mod constants;
pub mod misc;
