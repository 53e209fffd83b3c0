pub const GENESIS_EPOCH: u64 = 0;
pub const GENESIS_SLOT: u64 = 0;
pub const MAX_ATTESTATIONS: u64 = 128;
pub const MAX_VALIDATORS_PER_COMMITTEE: u64 = 2048;
pub const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 1;
pub const SLOTS_PER_EPOCH: u64 = 32;
pub const SLOTS_PER_HISTORICAL_ROOT: u64 = 8192;

// Participation flag indices
pub const TIMELY_SOURCE_FLAG_INDEX: u8 = 0;
pub const TIMELY_TARGET_FLAG_INDEX: u8 = 1;
pub const TIMELY_HEAD_FLAG_INDEX: u8 = 2;
