//! Committee bitset algebra over aggregation bits.
//!
//! All binary operations require both operands to have the committee's length. A mismatch means
//! an attestation was routed to the wrong committee upstream, so it panics instead of returning an
//! error.

use anyhow::anyhow;
use ssz_types::{BitList, typenum::Unsigned};

pub trait AggregationBitsExt {
    /// Positions of the set bits, ascending.
    fn true_indices(&self) -> Vec<usize>;

    /// Whether every bit set in ``other`` is also set in ``self``. Equal bitsets are supersets of
    /// each other.
    fn is_superset_of(&self, other: &Self) -> bool;

    /// Whether ``self`` and ``other`` share at least one set bit.
    fn intersects(&self, other: &Self) -> bool;

    fn or(&self, other: &Self) -> Self;

    /// Validator indices of the committee members whose bits are set.
    fn project_to_committee(&self, committee: &[u64]) -> Vec<u64>;
}

fn assert_same_length<N: Unsigned + Clone>(bits: &BitList<N>, other: &BitList<N>) {
    assert_eq!(
        bits.len(),
        other.len(),
        "Aggregation bits length mismatch: {} != {}",
        bits.len(),
        other.len()
    );
}

impl<N: Unsigned + Clone> AggregationBitsExt for BitList<N> {
    fn true_indices(&self) -> Vec<usize> {
        self.iter()
            .enumerate()
            .filter_map(|(index, bit)| bit.then_some(index))
            .collect()
    }

    fn is_superset_of(&self, other: &Self) -> bool {
        assert_same_length(self, other);
        self.iter()
            .zip(other.iter())
            .all(|(bit, other_bit)| bit || !other_bit)
    }

    fn intersects(&self, other: &Self) -> bool {
        assert_same_length(self, other);
        self.iter()
            .zip(other.iter())
            .any(|(bit, other_bit)| bit && other_bit)
    }

    fn or(&self, other: &Self) -> Self {
        assert_same_length(self, other);
        self.union(other)
    }

    fn project_to_committee(&self, committee: &[u64]) -> Vec<u64> {
        assert_eq!(
            self.len(),
            committee.len(),
            "Aggregation bits length {} does not match committee size {}",
            self.len(),
            committee.len()
        );
        self.true_indices()
            .into_iter()
            .map(|index| committee[index])
            .collect()
    }
}

/// Build aggregation bits of ``length`` with the bits at ``indices`` set.
pub fn aggregation_bits_from_indices<N: Unsigned + Clone>(
    length: usize,
    indices: &[usize],
) -> anyhow::Result<BitList<N>> {
    let mut bits = BitList::<N>::with_capacity(length)
        .map_err(|err| anyhow!("Failed to create BitList for aggregation_bits {err:?}"))?;
    for &index in indices {
        bits.set(index, true)
            .map_err(|err| anyhow!("Failed to set bit {index}: {err:?}"))?;
    }
    Ok(bits)
}
