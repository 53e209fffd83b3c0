use alloy_primitives::B256;

/// Summary of a block known to fork choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtoBlock {
    pub slot: u64,
    pub block_root: B256,
    pub parent_root: B256,
}
