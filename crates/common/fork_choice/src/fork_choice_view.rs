use alloy_primitives::B256;

use crate::proto_block::ProtoBlock;

/// How many epochs before a block's own epoch the shuffling decision is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochDifference {
    /// Proposer shuffling, decided at the end of the previous epoch.
    Current = 0,
    /// Attester shuffling, decided one epoch earlier.
    Previous = 1,
}

/// Read-only lookups into the fork choice block DAG.
pub trait ForkChoiceView {
    /// Return the summary of the block with root ``block_root``, if fork choice knows it.
    fn get_block(&self, block_root: &B256) -> Option<ProtoBlock>;

    /// Return the root of the last block before the start of epoch
    /// ``epoch(block.slot) - epoch_difference`` on the chain of ``block``. This is the block whose
    /// state seeded the shuffling ``block`` was produced under.
    fn get_dependent_root(
        &self,
        block: &ProtoBlock,
        epoch_difference: EpochDifference,
    ) -> anyhow::Result<B256>;
}
