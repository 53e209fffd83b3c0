use alloy_primitives::B256;
use ream_bls::{
    BLSSignature, PrivateKey, PublicKey,
    traits::{Aggregatable, Signable},
};
use ream_consensus_beacon::attestation::Attestation;
use ream_consensus_misc::{attestation_data::AttestationData, checkpoint::Checkpoint};

use crate::bitfield::aggregation_bits_from_indices;

pub fn private_key(validator_index: u64) -> PrivateKey {
    PrivateKey::new(B256::left_padding_from(&(validator_index + 1).to_be_bytes()))
}

pub fn public_key(validator_index: u64) -> PublicKey {
    private_key(validator_index).public_key().unwrap()
}

pub fn attestation_data(slot: u64, source_epoch: u64, target_epoch: u64) -> AttestationData {
    AttestationData {
        slot,
        index: 0,
        beacon_block_root: B256::repeat_byte(0xbb),
        source: Checkpoint {
            epoch: source_epoch,
            root: B256::repeat_byte(0x5e),
        },
        target: Checkpoint {
            epoch: target_epoch,
            root: B256::repeat_byte(0x7a),
        },
    }
}

/// Attestation signed by the committee members at ``indices``.
pub fn signed_attestation(
    data: &AttestationData,
    committee: &[u64],
    indices: &[usize],
) -> Attestation {
    let message = data.data_root();
    let signatures = indices
        .iter()
        .map(|&index| private_key(committee[index]).sign(message.as_slice()).unwrap())
        .collect::<Vec<_>>();
    let signature = if signatures.is_empty() {
        BLSSignature::infinity()
    } else {
        BLSSignature::aggregate(&signatures.iter().collect::<Vec<_>>()).unwrap()
    };

    Attestation {
        aggregation_bits: aggregation_bits_from_indices(committee.len(), indices).unwrap(),
        data: data.clone(),
        signature,
    }
}
