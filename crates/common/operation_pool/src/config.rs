use ream_consensus_misc::constants::MAX_ATTESTATIONS;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EPOCHS_RETAINED: u64 = 1;
pub const DEFAULT_MAX_RETAINED_ATTESTATIONS_PER_GROUP: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationPoolConfig {
    /// Number of epochs before the clock epoch whose attestations are kept on prune.
    pub epochs_retained: u64,
    /// Upper bound on the entries of one matching data group.
    pub max_retained_attestations_per_group: usize,
    pub max_attestations_per_block: usize,
}

impl Default for AttestationPoolConfig {
    fn default() -> Self {
        Self {
            epochs_retained: DEFAULT_EPOCHS_RETAINED,
            max_retained_attestations_per_group: DEFAULT_MAX_RETAINED_ATTESTATIONS_PER_GROUP,
            max_attestations_per_block: MAX_ATTESTATIONS as usize,
        }
    }
}
