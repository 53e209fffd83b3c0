use alloy_primitives::B256;
use anyhow::ensure;
use ream_consensus_misc::{
    checkpoint::Checkpoint,
    constants::{GENESIS_EPOCH, GENESIS_SLOT, SLOTS_PER_HISTORICAL_ROOT},
    misc::{compute_epoch_at_slot, compute_start_slot_at_epoch},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz_derive::{Decode, Encode};
use ssz_types::{
    FixedVector, VariableList,
    typenum::{U8192, U1099511627776},
};
use tree_hash_derive::TreeHash;

pub mod quoted_u8_var_list {
    use super::*;

    pub fn serialize<S>(
        value: &VariableList<u8, U1099511627776>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let string_vec: Vec<String> = value.iter().map(|v| v.to_string()).collect();
        string_vec.serialize(serializer)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<VariableList<u8, U1099511627776>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string_vec: Vec<String> = Vec::deserialize(deserializer)?;
        let bytes = string_vec
            .into_iter()
            .map(|s| s.parse::<u8>().map_err(serde::de::Error::custom))
            .collect::<Result<Vec<_>, _>>()?;
        VariableList::new(bytes).map_err(|err| {
            serde::de::Error::custom(format!("Cannot create VariableList from bytes: {err:?}"))
        })
    }
}

/// The slice of beacon state the attestation pool reads: the slot clock, recent block roots,
/// per-validator participation flags and the finality checkpoints.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconState {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    pub block_roots: FixedVector<B256, U8192>,

    // Participation
    #[serde(with = "quoted_u8_var_list")]
    pub previous_epoch_participation: VariableList<u8, U1099511627776>,
    #[serde(with = "quoted_u8_var_list")]
    pub current_epoch_participation: VariableList<u8, U1099511627776>,

    // Finality
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

impl BeaconState {
    /// Return the current epoch.
    pub fn get_current_epoch(&self) -> u64 {
        compute_epoch_at_slot(self.slot)
    }

    /// Return the previous epoch (unless the current epoch is ``GENESIS_EPOCH``).
    pub fn get_previous_epoch(&self) -> u64 {
        let current_epoch = self.get_current_epoch();
        if current_epoch == GENESIS_EPOCH {
            GENESIS_EPOCH
        } else {
            current_epoch - 1
        }
    }

    /// Return the block root at a recent ``slot``.
    pub fn get_block_root_at_slot(&self, slot: u64) -> anyhow::Result<B256> {
        ensure!(
            slot < self.slot && self.slot <= slot + SLOTS_PER_HISTORICAL_ROOT,
            "slot given was outside of block_roots range"
        );
        Ok(self.block_roots[(slot % SLOTS_PER_HISTORICAL_ROOT) as usize])
    }

    /// Return the root of the block that decided the attester shuffling for ``epoch``: the last
    /// block at or before the final slot of ``epoch - 2``. Epochs 0 and 1 use the genesis block.
    pub fn get_attester_shuffling_dependent_root(&self, epoch: u64) -> anyhow::Result<B256> {
        if epoch <= GENESIS_EPOCH + 1 {
            return self.get_block_root_at_slot(GENESIS_SLOT);
        }
        self.get_block_root_at_slot(compute_start_slot_at_epoch(epoch - 1) - 1)
    }

    /// Return the participation flags recorded for ``epoch``, if it is the current or previous
    /// epoch.
    pub fn get_epoch_participation(&self, epoch: u64) -> Option<&VariableList<u8, U1099511627776>> {
        if epoch == self.get_current_epoch() {
            Some(&self.current_epoch_participation)
        } else if epoch == self.get_previous_epoch() {
            Some(&self.previous_epoch_participation)
        } else {
            None
        }
    }

    /// Return a new ``ParticipationFlags`` adding ``flag_index`` to ``flags``.
    pub fn add_flag(flags: u8, flag_index: u8) -> u8 {
        let flag = 1 << flag_index;
        flags | flag
    }

    /// Return whether ``flags`` has ``flag_index`` set.
    pub fn has_flag(flags: u8, flag_index: u8) -> bool {
        let flag = 1 << flag_index;
        flags & flag == flag
    }
}
