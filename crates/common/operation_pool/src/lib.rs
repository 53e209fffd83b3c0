pub mod aggregated_attestation_pool;
pub mod bitfield;
pub mod config;
pub mod errors;
pub mod matching_data_group;
pub mod participation;

#[cfg(test)]
pub(crate) mod test_utils;
