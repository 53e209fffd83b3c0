use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use alloy_primitives::B256;
use parking_lot::{Mutex, RwLock};
use ream_consensus_beacon::{attestation::Attestation, electra::beacon_state::BeaconState};
use ream_consensus_misc::{
    attestation_data::AttestationData, constants::MIN_ATTESTATION_INCLUSION_DELAY,
    misc::compute_epoch_at_slot,
};
use ream_fork_choice::fork_choice_view::{EpochDifference, ForkChoiceView};
use ream_metrics::{
    ATTESTATION_POOL_BLOCK_SELECTION_TIME, ATTESTATION_POOL_GROUPS,
    ATTESTATION_POOL_INSERT_OUTCOMES, inc_int_counter_vec, set_int_gauge_vec, start_timer_vec,
    stop_timer,
};
use tracing::{debug, trace};

use crate::{
    config::AttestationPoolConfig,
    errors::AttestationPoolError,
    matching_data_group::{AttestationWithIndex, InsertOutcome, MatchingDataAttestationGroup},
    participation::get_participation_fn,
};

#[derive(Debug, Default)]
struct AttestationGroups {
    by_data_root: HashMap<B256, Arc<Mutex<MatchingDataAttestationGroup>>>,
    lowest_permissible_epoch: u64,
}

/// Block candidate with its inclusion score.
struct ScoredAttestation {
    attestation: Attestation,
    score: f64,
}

/// Pool of aggregated attestations, keyed by attestation data root.
///
/// Every mutation of the data root map, including pruning, holds its write lock. Block selection
/// only holds the read lock long enough to snapshot the groups, so new groups can be created while
/// a selection runs.
#[derive(Debug, Default)]
pub struct AggregatedAttestationPool {
    config: AttestationPoolConfig,
    groups: RwLock<AttestationGroups>,
}

impl AggregatedAttestationPool {
    pub fn new(config: AttestationPoolConfig) -> Self {
        Self {
            config,
            groups: RwLock::new(AttestationGroups::default()),
        }
    }

    pub fn config(&self) -> &AttestationPoolConfig {
        &self.config
    }

    /// Insert ``attestation`` into the group for ``data_root``, creating the group with
    /// ``committee`` if this is the first attestation with that data.
    pub fn add(
        &self,
        attestation: Attestation,
        data_root: B256,
        true_bits_count: usize,
        committee: &[u64],
    ) -> Result<InsertOutcome, AttestationPoolError> {
        let mut groups = self.groups.write();

        let target_epoch = attestation.data.target.epoch;
        if target_epoch < groups.lowest_permissible_epoch {
            return Err(AttestationPoolError::StaleAttestation {
                target_epoch,
                lowest_permissible_epoch: groups.lowest_permissible_epoch,
            });
        }

        let group = groups
            .by_data_root
            .entry(data_root)
            .or_insert_with(|| {
                Arc::new(Mutex::new(MatchingDataAttestationGroup::new(
                    committee.to_vec(),
                    attestation.data.clone(),
                    self.config.max_retained_attestations_per_group,
                )))
            })
            .clone();

        let outcome = group.lock().add(AttestationWithIndex::with_true_bits_count(
            attestation,
            true_bits_count,
        ))?;

        trace!(?data_root, outcome = outcome.as_str(), "Attestation inserted into pool");
        inc_int_counter_vec(&ATTESTATION_POOL_INSERT_OUTCOMES, &[outcome.as_str()]);
        set_int_gauge_vec(&ATTESTATION_POOL_GROUPS, groups.by_data_root.len() as i64, &[]);

        Ok(outcome)
    }

    /// Select attestations worth including in a block built on ``state``.
    ///
    /// Groups whose source epoch is not the current justified epoch, whose head block fork choice
    /// does not know, or whose shuffling differs from the state's are skipped. The remaining
    /// attestations that add at least one new participant are ordered by new participants per
    /// slot of inclusion delay and capped at the configured block limit.
    pub fn get_attestations_for_block(
        &self,
        fork_choice: &impl ForkChoiceView,
        state: &BeaconState,
    ) -> Vec<Attestation> {
        let timer = start_timer_vec(
            &ATTESTATION_POOL_BLOCK_SELECTION_TIME,
            &["get_attestations_for_block"],
        );

        let groups = self
            .groups
            .read()
            .by_data_root
            .iter()
            .map(|(data_root, group)| (*data_root, group.clone()))
            .collect::<Vec<_>>();

        let participation_fn = get_participation_fn(state);
        let current_epoch = state.get_current_epoch();
        let previous_epoch = state.get_previous_epoch();
        let mut candidates = vec![];

        for (data_root, group) in groups {
            let group = group.lock();
            let data = group.data();

            if data.slot + MIN_ATTESTATION_INCLUSION_DELAY > state.slot {
                trace!(?data_root, slot = data.slot, "Attestation group not yet includable");
                continue;
            }

            if data.target.epoch != current_epoch && data.target.epoch != previous_epoch {
                trace!(
                    ?data_root,
                    target_epoch = data.target.epoch,
                    "Attestation group outside inclusion window"
                );
                continue;
            }

            if data.source.epoch != state.current_justified_checkpoint.epoch {
                debug!(
                    ?data_root,
                    source_epoch = data.source.epoch,
                    justified_epoch = state.current_justified_checkpoint.epoch,
                    "Skipping attestation group with mismatched source epoch"
                );
                continue;
            }

            if !is_valid_shuffling(fork_choice, state, data, data_root) {
                continue;
            }

            let seen_validators = participation_fn(data.target.epoch, group.committee());
            let inclusion_distance = (state.slot - data.slot) as f64;
            candidates.extend(
                group
                    .get_attestations_for_block(&seen_validators)
                    .into_iter()
                    .filter(|candidate| candidate.not_seen_attester_count > 0)
                    .map(|candidate| ScoredAttestation {
                        score: candidate.not_seen_attester_count as f64 / inclusion_distance,
                        attestation: candidate.attestation,
                    }),
            );
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(self.config.max_attestations_per_block);

        stop_timer(timer);
        debug!(
            count = candidates.len(),
            slot = state.slot,
            "Selected attestations for block"
        );

        candidates
            .into_iter()
            .map(|candidate| candidate.attestation)
            .collect()
    }

    /// All kept attestations, optionally only those for ``slot``.
    pub fn get_all(&self, slot: Option<u64>) -> Vec<Attestation> {
        self.groups
            .read()
            .by_data_root
            .values()
            .filter_map(|group| {
                let group = group.lock();
                match slot {
                    Some(slot) if group.data().slot != slot => None,
                    _ => Some(group.get_attestations()),
                }
            })
            .flatten()
            .collect()
    }

    pub fn get_attestation_count(&self) -> usize {
        self.groups
            .read()
            .by_data_root
            .values()
            .map(|group| group.lock().len())
            .sum()
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().by_data_root.len()
    }

    pub fn lowest_permissible_epoch(&self) -> u64 {
        self.groups.read().lowest_permissible_epoch
    }

    /// Drop every group whose target epoch is more than ``epochs_retained`` epochs before
    /// ``clock_epoch``, and reject later inserts for those epochs.
    pub fn prune(&self, clock_epoch: u64) {
        let mut groups = self.groups.write();
        let lowest_permissible_epoch = clock_epoch
            .saturating_sub(self.config.epochs_retained)
            .max(groups.lowest_permissible_epoch);

        let group_count = groups.by_data_root.len();
        groups
            .by_data_root
            .retain(|_, group| group.lock().data().target.epoch >= lowest_permissible_epoch);
        groups.lowest_permissible_epoch = lowest_permissible_epoch;

        debug!(
            pruned = group_count - groups.by_data_root.len(),
            lowest_permissible_epoch, "Pruned attestation pool"
        );
        set_int_gauge_vec(&ATTESTATION_POOL_GROUPS, groups.by_data_root.len() as i64, &[]);
    }
}

/// Whether the committee shuffling ``data`` was produced under matches the one of ``state``.
///
/// The state's pivot for the target epoch is compared with the dependent root fork choice
/// reports for the voted block, looked up once.
fn is_valid_shuffling(
    fork_choice: &impl ForkChoiceView,
    state: &BeaconState,
    data: &AttestationData,
    data_root: B256,
) -> bool {
    let target_epoch = data.target.epoch;
    let expected_dependent_root = match state.get_attester_shuffling_dependent_root(target_epoch)
    {
        Ok(root) => root,
        Err(err) => {
            debug!(?data_root, target_epoch, ?err, "Unable to resolve state shuffling pivot");
            return false;
        }
    };

    let Some(block) = fork_choice.get_block(&data.beacon_block_root) else {
        debug!(
            ?data_root,
            beacon_block_root = ?data.beacon_block_root,
            "Skipping attestation group with unknown head block"
        );
        return false;
    };

    let block_epoch = compute_epoch_at_slot(block.slot);
    let dependent_root = match block_epoch.cmp(&target_epoch) {
        Ordering::Equal => fork_choice.get_dependent_root(&block, EpochDifference::Previous),
        Ordering::Less if block_epoch + 1 == target_epoch => {
            fork_choice.get_dependent_root(&block, EpochDifference::Current)
        }
        // The head block itself is the last block before the pivot slot.
        Ordering::Less => Ok(block.block_root),
        Ordering::Greater => {
            debug!(?data_root, block_epoch, target_epoch, "Head block is after target epoch");
            return false;
        }
    };

    match dependent_root {
        Ok(root) if root == expected_dependent_root => true,
        Ok(root) => {
            debug!(
                ?data_root,
                dependent_root = ?root,
                ?expected_dependent_root,
                "Skipping attestation group with incompatible shuffling"
            );
            false
        }
        Err(err) => {
            debug!(?data_root, ?err, "Unable to resolve attestation dependent root");
            false
        }
    }
}
