use std::{cmp::Reverse, collections::HashSet};

use ream_bls::{BLSSignature, traits::Aggregatable};
use ream_consensus_beacon::attestation::Attestation;
use ream_consensus_misc::attestation_data::AttestationData;
use tracing::trace;

use crate::bitfield::AggregationBitsExt;

/// An attestation together with the population count of its aggregation bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationWithIndex {
    pub attestation: Attestation,
    pub true_bits_count: usize,
}

impl AttestationWithIndex {
    pub fn new(attestation: Attestation) -> Self {
        let true_bits_count = attestation.aggregation_bits.num_set_bits();
        Self {
            attestation,
            true_bits_count,
        }
    }

    /// Wrap ``attestation`` with a count the caller already computed.
    pub fn with_true_bits_count(attestation: Attestation, true_bits_count: usize) -> Self {
        assert_eq!(
            attestation.aggregation_bits.num_set_bits(),
            true_bits_count,
            "True bits count does not match aggregation bits"
        );
        Self {
            attestation,
            true_bits_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertOutcome {
    /// Kept as a new entry, possibly after evicting entries it subsumes.
    NewData,
    /// Merged into an existing entry with a disjoint signer set.
    Aggregated,
    /// Every signer is already covered by an existing entry.
    AlreadyKnown,
}

impl InsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsertOutcome::NewData => "new_data",
            InsertOutcome::Aggregated => "aggregated",
            InsertOutcome::AlreadyKnown => "already_known",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationNonParticipant {
    pub attestation: Attestation,
    /// Signers of ``attestation`` without a participation record yet.
    pub not_seen_attester_count: usize,
}

/// Merge two attestations over the same data whose signer sets are disjoint.
///
/// # Panics
///
/// Panics if the data differ or the aggregation bits overlap. Aggregating overlapping signers
/// would count some of them twice in the resulting signature.
pub fn aggregate_attestations(
    attestation: &AttestationWithIndex,
    other: &AttestationWithIndex,
) -> anyhow::Result<AttestationWithIndex> {
    assert_eq!(
        attestation.attestation.data, other.attestation.data,
        "Cannot aggregate attestations with different data"
    );
    assert!(
        !attestation
            .attestation
            .aggregation_bits
            .intersects(&other.attestation.aggregation_bits),
        "Cannot aggregate attestations with overlapping aggregation bits"
    );

    let signature = BLSSignature::aggregate(&[
        &attestation.attestation.signature,
        &other.attestation.signature,
    ])?;

    Ok(AttestationWithIndex {
        attestation: Attestation {
            aggregation_bits: attestation
                .attestation
                .aggregation_bits
                .or(&other.attestation.aggregation_bits),
            data: attestation.attestation.data.clone(),
            signature,
        },
        true_bits_count: attestation.true_bits_count + other.true_bits_count,
    })
}

/// Attestations for one committee that share identical data. No kept entry's signer set is a
/// subset of another's.
#[derive(Debug, Clone)]
pub struct MatchingDataAttestationGroup {
    committee: Vec<u64>,
    data: AttestationData,
    attestations: Vec<AttestationWithIndex>,
    max_retained_attestations: usize,
}

impl MatchingDataAttestationGroup {
    pub fn new(
        committee: Vec<u64>,
        data: AttestationData,
        max_retained_attestations: usize,
    ) -> Self {
        Self {
            committee,
            data,
            attestations: vec![],
            max_retained_attestations,
        }
    }

    pub fn committee(&self) -> &[u64] {
        &self.committee
    }

    pub fn data(&self) -> &AttestationData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.attestations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attestations.is_empty()
    }

    /// Insert ``candidate``.
    ///
    /// The candidate is dropped if an entry already covers its signers. Otherwise it is aggregated
    /// into the first entry with a disjoint signer set, or appended if there is none, and every
    /// other entry the result covers is evicted. When appending pushes the group over its
    /// retention limit, the smallest older entry is dropped. The group is unchanged if signature
    /// aggregation fails.
    ///
    /// # Panics
    ///
    /// Panics if ``candidate`` has different data or a bitset that does not match the committee
    /// size.
    pub fn add(&mut self, candidate: AttestationWithIndex) -> anyhow::Result<InsertOutcome> {
        assert_eq!(
            candidate.attestation.data, self.data,
            "Attestation data does not match the group's data"
        );
        assert_eq!(
            candidate.attestation.aggregation_bits.len(),
            self.committee.len(),
            "Aggregation bits length does not match committee size"
        );

        let candidate_bits = &candidate.attestation.aggregation_bits;
        if self
            .attestations
            .iter()
            .any(|existing| existing.attestation.aggregation_bits.is_superset_of(candidate_bits))
        {
            return Ok(InsertOutcome::AlreadyKnown);
        }

        // Equal bitsets returned above, so anything the candidate covers is a strict subset.
        let is_subsumed = |existing: &AttestationWithIndex| {
            candidate_bits.is_superset_of(&existing.attestation.aggregation_bits)
        };

        let partner_index = self.attestations.iter().position(|existing| {
            !is_subsumed(existing) && !existing.attestation.aggregation_bits.intersects(candidate_bits)
        });

        match partner_index {
            Some(index) => {
                let aggregate = aggregate_attestations(&self.attestations[index], &candidate)?;
                let aggregate_bits = aggregate.attestation.aggregation_bits.clone();
                self.attestations[index] = aggregate;

                // The aggregate covers the candidate, so this also evicts what the candidate
                // covers.
                let mut position = 0;
                self.attestations.retain(|existing| {
                    let keep = position == index
                        || !aggregate_bits.is_superset_of(&existing.attestation.aggregation_bits);
                    position += 1;
                    keep
                });
                trace!(
                    true_bits_count = candidate.true_bits_count,
                    "Attestation aggregated into existing entry"
                );
                Ok(InsertOutcome::Aggregated)
            }
            None => {
                self.attestations.retain(|existing| !is_subsumed(existing));
                self.attestations.push(candidate);
                self.enforce_retention_limit();
                Ok(InsertOutcome::NewData)
            }
        }
    }

    /// Drop the smallest entries until the group fits its limit. The newest entry is never dropped.
    fn enforce_retention_limit(&mut self) {
        while self.attestations.len() > self.max_retained_attestations {
            let older = self.attestations.len() - 1;
            let Some(index) = self.attestations[..older]
                .iter()
                .enumerate()
                .min_by_key(|(_, attestation)| attestation.true_bits_count)
                .map(|(index, _)| index)
            else {
                return;
            };
            self.attestations.remove(index);
        }
    }

    /// Kept attestations in insertion order.
    pub fn get_attestations(&self) -> Vec<Attestation> {
        self.attestations
            .iter()
            .map(|attestation| attestation.attestation.clone())
            .collect()
    }

    /// Count, for every kept attestation, the signers not in ``seen_validators``. Entries adding
    /// no new signers are included with a count of zero. Results are ordered by that count,
    /// highest first.
    pub fn get_attestations_for_block(
        &self,
        seen_validators: &HashSet<u64>,
    ) -> Vec<AttestationNonParticipant> {
        let mut attestations = self
            .attestations
            .iter()
            .map(|attestation| AttestationNonParticipant {
                attestation: attestation.attestation.clone(),
                not_seen_attester_count: attestation
                    .attestation
                    .aggregation_bits
                    .project_to_committee(&self.committee)
                    .into_iter()
                    .filter(|validator_index| !seen_validators.contains(validator_index))
                    .count(),
            })
            .collect::<Vec<_>>();
        attestations.sort_by_key(|attestation| Reverse(attestation.not_seen_attester_count));
        attestations
    }
}

#[cfg(test)]
mod tests {
    use ream_bls::traits::Verifiable;
    use rstest::rstest;

    use super::*;
    use crate::{
        bitfield::{AggregationBitsExt, aggregation_bits_from_indices},
        config::DEFAULT_MAX_RETAINED_ATTESTATIONS_PER_GROUP,
        test_utils::{attestation_data, public_key, signed_attestation},
    };

    const COMMITTEE: [u64; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

    fn group() -> MatchingDataAttestationGroup {
        MatchingDataAttestationGroup::new(
            COMMITTEE.to_vec(),
            attestation_data(100, 2, 3),
            DEFAULT_MAX_RETAINED_ATTESTATIONS_PER_GROUP,
        )
    }

    fn attestation(indices: &[usize]) -> AttestationWithIndex {
        AttestationWithIndex::new(signed_attestation(
            &attestation_data(100, 2, 3),
            &COMMITTEE,
            indices,
        ))
    }

    fn kept_indices(group: &MatchingDataAttestationGroup) -> Vec<Vec<usize>> {
        group
            .get_attestations()
            .iter()
            .map(|attestation| attestation.aggregation_bits.true_indices())
            .collect()
    }

    #[rstest]
    #[case(&[0, 1], &[2, 3])]
    #[case(&[2, 3], &[0, 1])]
    #[case(&[7], &[0, 1, 2, 3, 4, 5, 6])]
    fn test_disjoint_attestations_aggregate(#[case] first: &[usize], #[case] second: &[usize]) {
        let mut group = group();

        assert_eq!(group.add(attestation(first)).unwrap(), InsertOutcome::NewData);
        assert_eq!(group.add(attestation(second)).unwrap(), InsertOutcome::Aggregated);
        assert_eq!(group.len(), 1);

        let mut union = [first, second].concat();
        union.sort_unstable();
        let kept = &group.get_attestations()[0];
        assert_eq!(kept.aggregation_bits.true_indices(), union);

        let public_keys = union
            .iter()
            .map(|&index| public_key(COMMITTEE[index]))
            .collect::<Vec<_>>();
        assert!(
            kept.signature
                .fast_aggregate_verify(
                    public_keys.iter().collect::<Vec<_>>(),
                    kept.data.data_root().as_slice()
                )
                .unwrap()
        );
    }

    #[test]
    fn test_aggregated_entry_tracks_true_bits_count() {
        let mut group = group();
        group.add(attestation(&[0])).unwrap();
        group.add(attestation(&[1, 2])).unwrap();

        assert_eq!(group.attestations[0].true_bits_count, 3);
        assert_eq!(
            group.attestations[0].attestation.aggregation_bits.num_set_bits(),
            3
        );
    }

    #[test]
    fn test_subset_is_already_known() {
        let mut group = group();
        group.add(attestation(&[0, 1, 2])).unwrap();
        group.add(attestation(&[1, 5])).unwrap();
        let before = group.attestations.clone();

        assert_eq!(group.add(attestation(&[1, 2])).unwrap(), InsertOutcome::AlreadyKnown);
        assert_eq!(group.add(attestation(&[0, 1, 2])).unwrap(), InsertOutcome::AlreadyKnown);
        assert_eq!(group.attestations, before);
    }

    #[test]
    fn test_strict_superset_replaces_entry() {
        let mut group = group();
        group.add(attestation(&[1, 2])).unwrap();

        assert_eq!(group.add(attestation(&[1, 2, 3])).unwrap(), InsertOutcome::NewData);
        assert_eq!(kept_indices(&group), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_overlapping_attestations_are_both_kept() {
        let mut group = group();

        assert_eq!(group.add(attestation(&[0, 1])).unwrap(), InsertOutcome::NewData);
        assert_eq!(group.add(attestation(&[1, 2])).unwrap(), InsertOutcome::NewData);
        assert_eq!(kept_indices(&group), vec![vec![0, 1], vec![1, 2]]);
    }

    #[test]
    fn test_subsumed_entries_are_evicted_before_aggregation() {
        let mut group = group();
        group.add(attestation(&[0, 1])).unwrap();
        group.add(attestation(&[1, 4])).unwrap();

        // Covers [0, 1], overlaps [1, 4]; nothing disjoint remains after eviction.
        assert_eq!(group.add(attestation(&[0, 1, 3])).unwrap(), InsertOutcome::NewData);
        assert_eq!(kept_indices(&group), vec![vec![1, 4], vec![0, 1, 3]]);

        // Covers [1, 4]; [0, 1, 3] overlaps, so append.
        assert_eq!(group.add(attestation(&[1, 4, 5])).unwrap(), InsertOutcome::NewData);
        assert_eq!(kept_indices(&group), vec![vec![0, 1, 3], vec![1, 4, 5]]);
    }

    #[test]
    fn test_aggregates_into_first_disjoint_entry() {
        let mut group = group();
        group.add(attestation(&[0, 1])).unwrap();
        group.add(attestation(&[1, 2])).unwrap();
        group.add(attestation(&[1, 5])).unwrap();

        // Evicts [1, 5]; [0, 1] and [1, 2] overlap, so append.
        assert_eq!(group.add(attestation(&[1, 5, 6])).unwrap(), InsertOutcome::NewData);

        // Every entry is disjoint from [3, 4]; the oldest one absorbs it.
        assert_eq!(group.add(attestation(&[3, 4])).unwrap(), InsertOutcome::Aggregated);
        assert_eq!(
            kept_indices(&group),
            vec![vec![0, 1, 3, 4], vec![1, 2], vec![1, 5, 6]]
        );
    }

    #[test]
    fn test_retention_limit_drops_smallest_entry() {
        let mut group = group();
        for indices in [&[0, 1][..], &[0, 2], &[0, 3], &[0, 4]] {
            assert_eq!(group.add(attestation(indices)).unwrap(), InsertOutcome::NewData);
        }

        assert_eq!(group.add(attestation(&[0, 5, 6])).unwrap(), InsertOutcome::NewData);
        assert_eq!(group.len(), DEFAULT_MAX_RETAINED_ATTESTATIONS_PER_GROUP);
        assert_eq!(
            kept_indices(&group),
            vec![vec![0, 2], vec![0, 3], vec![0, 4], vec![0, 5, 6]]
        );
    }

    #[test]
    fn test_aggregate_evicts_entries_it_covers() {
        let mut group = group();
        group.add(attestation(&[0, 1])).unwrap();
        group.add(attestation(&[1, 2])).unwrap();

        // Disjoint from [0, 1]; the aggregate [0, 1, 2, 3] covers [1, 2].
        assert_eq!(group.add(attestation(&[2, 3])).unwrap(), InsertOutcome::Aggregated);
        assert_eq!(kept_indices(&group), vec![vec![0, 1, 2, 3]]);
        assert_eq!(group.attestations[0].true_bits_count, 4);
    }

    #[test]
    fn test_aggregate_keeps_entries_it_only_overlaps() {
        let mut group = group();
        group.add(attestation(&[1, 2])).unwrap();
        group.add(attestation(&[0, 1])).unwrap();
        group.add(attestation(&[1, 6])).unwrap();

        // Absorbed by [0, 1]; the aggregate covers [1, 2] but not [1, 6].
        assert_eq!(group.add(attestation(&[2, 3])).unwrap(), InsertOutcome::Aggregated);
        assert_eq!(kept_indices(&group), vec![vec![0, 1, 2, 3], vec![1, 6]]);
    }

    #[test]
    fn test_retention_limit_keeps_new_entry() {
        let mut group = group();
        for indices in [&[0, 1, 2][..], &[0, 1, 3], &[0, 1, 4], &[0, 1, 5]] {
            assert_eq!(group.add(attestation(indices)).unwrap(), InsertOutcome::NewData);
        }

        // Smallest entry of the group, yet still kept.
        assert_eq!(group.add(attestation(&[0, 6])).unwrap(), InsertOutcome::NewData);
        assert_eq!(
            kept_indices(&group),
            vec![vec![0, 1, 3], vec![0, 1, 4], vec![0, 1, 5], vec![0, 6]]
        );
    }

    #[test]
    #[should_panic(expected = "True bits count does not match aggregation bits")]
    fn test_wrong_true_bits_count_panics() {
        let _ = AttestationWithIndex::with_true_bits_count(
            signed_attestation(&attestation_data(100, 2, 3), &COMMITTEE, &[0, 1]),
            1,
        );
    }

    #[test]
    fn test_attestations_for_block_counts_unseen_attesters() {
        let mut group = group();
        // 0b11111110
        group.add(attestation(&[1, 2, 3, 4, 5, 6, 7])).unwrap();

        // 0b11110001
        let seen_bits = aggregation_bits_from_indices::<ssz_types::typenum::U2048>(
            COMMITTEE.len(),
            &[0, 4, 5, 6, 7],
        )
        .unwrap();
        let seen_validators = seen_bits
            .project_to_committee(&COMMITTEE)
            .into_iter()
            .collect::<HashSet<_>>();

        let attestations = group.get_attestations_for_block(&seen_validators);
        assert_eq!(attestations.len(), 1);
        assert_eq!(attestations[0].not_seen_attester_count, 3);
    }

    #[test]
    fn test_attestations_for_block_with_full_committee_seen() {
        let mut group = group();
        group.add(attestation(&[0, 1])).unwrap();
        group.add(attestation(&[1, 2])).unwrap();

        let seen_validators = COMMITTEE.iter().copied().collect::<HashSet<_>>();
        let attestations = group.get_attestations_for_block(&seen_validators);

        assert_eq!(attestations.len(), 2);
        assert!(
            attestations
                .iter()
                .all(|attestation| attestation.not_seen_attester_count == 0)
        );
    }

    #[test]
    fn test_attestations_for_block_ordered_by_unseen_count() {
        let mut group = group();
        group.add(attestation(&[0, 1])).unwrap();
        group.add(attestation(&[1, 2, 3])).unwrap();

        let attestations = group.get_attestations_for_block(&HashSet::from([1]));
        assert_eq!(
            attestations
                .iter()
                .map(|attestation| attestation.not_seen_attester_count)
                .collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[test]
    fn test_aggregate_attestations_round_trip() {
        let committee = [21, 22];
        let data = attestation_data(100, 2, 3);
        let attestation1 =
            AttestationWithIndex::new(signed_attestation(&data, &committee, &[1]));
        let attestation2 =
            AttestationWithIndex::new(signed_attestation(&data, &committee, &[0]));

        let aggregate = aggregate_attestations(&attestation1, &attestation2).unwrap();

        assert_eq!(aggregate.true_bits_count, 2);
        assert_eq!(
            aggregate.attestation.aggregation_bits.iter().collect::<Vec<_>>(),
            vec![true, true]
        );
        assert!(
            aggregate
                .attestation
                .signature
                .fast_aggregate_verify(
                    [&public_key(21), &public_key(22)],
                    data.data_root().as_slice()
                )
                .unwrap()
        );
    }

    #[test]
    #[should_panic(expected = "overlapping aggregation bits")]
    fn test_aggregate_overlapping_attestations_panics() {
        let _ = aggregate_attestations(&attestation(&[0, 1]), &attestation(&[1, 2]));
    }

    #[test]
    #[should_panic(expected = "does not match the group's data")]
    fn test_add_with_different_data_panics() {
        let mut group = group();
        let other = AttestationWithIndex::new(signed_attestation(
            &attestation_data(101, 2, 3),
            &COMMITTEE,
            &[0],
        ));
        let _ = group.add(other);
    }
}
