use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use hashbrown::HashMap;
use ream_consensus_misc::{
    constants::SLOTS_PER_EPOCH,
    misc::{compute_epoch_at_slot, compute_start_slot_at_epoch},
};
use tracing::trace;

use crate::{
    fork_choice_view::{EpochDifference, ForkChoiceView},
    proto_block::ProtoBlock,
};

/// In-memory block DAG rooted at an anchor block.
#[derive(Debug, Clone)]
pub struct BlockTree {
    anchor_root: B256,
    blocks: HashMap<B256, ProtoBlock>,
}

impl BlockTree {
    pub fn new(anchor: ProtoBlock) -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(anchor.block_root, anchor);
        Self {
            anchor_root: anchor.block_root,
            blocks,
        }
    }

    pub fn anchor_root(&self) -> B256 {
        self.anchor_root
    }

    /// Run ``on_block`` for a block whose parent is already known. Known blocks are ignored.
    pub fn on_block(&mut self, block: ProtoBlock) -> anyhow::Result<()> {
        if self.contains_block(&block.block_root) {
            return Ok(());
        }

        let parent = self
            .blocks
            .get(&block.parent_root)
            .ok_or_else(|| anyhow!("Missing parent block for {:x}", block.block_root))?;
        ensure!(
            block.slot > parent.slot,
            "Block slot {} is not after parent slot {}",
            block.slot,
            parent.slot
        );
        trace!(block_root = ?block.block_root, slot = block.slot, "Block added to tree");
        self.blocks.insert(block.block_root, block);
        Ok(())
    }

    pub fn contains_block(&self, block_root: &B256) -> bool {
        self.blocks.contains_key(block_root)
    }

    /// Return the root of the ancestor of ``root`` at or before ``slot``.
    pub fn get_ancestor(&self, root: B256, slot: u64) -> anyhow::Result<B256> {
        let block = self
            .blocks
            .get(&root)
            .ok_or(anyhow!("Failed to find root in blocks"))?;
        if block.slot > slot && root != self.anchor_root {
            self.get_ancestor(block.parent_root, slot)
        } else {
            Ok(root)
        }
    }
}

impl ForkChoiceView for BlockTree {
    fn get_block(&self, block_root: &B256) -> Option<ProtoBlock> {
        self.blocks.get(block_root).copied()
    }

    fn get_dependent_root(
        &self,
        block: &ProtoBlock,
        epoch_difference: EpochDifference,
    ) -> anyhow::Result<B256> {
        let epoch_start_slot = compute_start_slot_at_epoch(compute_epoch_at_slot(block.slot));
        let lookback = epoch_difference as u64 * SLOTS_PER_EPOCH;

        // Close to genesis every shuffling is decided by the anchor block.
        if epoch_start_slot <= lookback {
            return Ok(self.anchor_root);
        }

        let before_slot = epoch_start_slot - lookback;
        self.get_ancestor(block.block_root, before_slot - 1)
    }
}
