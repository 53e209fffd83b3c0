use std::collections::HashSet;

use ream_consensus_beacon::electra::beacon_state::BeaconState;
use ream_consensus_misc::constants::TIMELY_SOURCE_FLAG_INDEX;

/// Return a function reporting which members of a committee already have a timely source
/// participation flag recorded in ``state`` for an epoch. Epochs other than the state's current
/// and previous epoch have no records.
pub fn get_participation_fn(state: &BeaconState) -> impl Fn(u64, &[u64]) -> HashSet<u64> + '_ {
    move |epoch, committee| {
        let Some(epoch_participation) = state.get_epoch_participation(epoch) else {
            return HashSet::new();
        };
        committee
            .iter()
            .copied()
            .filter(|&validator_index| {
                epoch_participation
                    .get(validator_index as usize)
                    .is_some_and(|&flags| BeaconState::has_flag(flags, TIMELY_SOURCE_FLAG_INDEX))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ream_consensus_misc::constants::{
        SLOTS_PER_EPOCH, TIMELY_HEAD_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX,
    };
    use ssz_types::VariableList;

    use super::*;

    #[test]
    fn test_participation_by_epoch() {
        let source = BeaconState::add_flag(0, TIMELY_SOURCE_FLAG_INDEX);
        let all_flags = BeaconState::add_flag(
            BeaconState::add_flag(source, TIMELY_TARGET_FLAG_INDEX),
            TIMELY_HEAD_FLAG_INDEX,
        );
        let state = BeaconState {
            slot: 5 * SLOTS_PER_EPOCH + 3,
            previous_epoch_participation: VariableList::from(vec![source, 0, 0, 0]),
            current_epoch_participation: VariableList::from(vec![
                0,
                all_flags,
                BeaconState::add_flag(0, TIMELY_TARGET_FLAG_INDEX),
                source,
            ]),
            ..Default::default()
        };
        let participation_fn = get_participation_fn(&state);

        assert_eq!(participation_fn(5, &[0, 1, 2, 3]), HashSet::from([1, 3]));
        assert_eq!(participation_fn(4, &[0, 1, 2, 3]), HashSet::from([0]));
        assert!(participation_fn(3, &[0, 1, 2, 3]).is_empty());
        // Unknown validator indices have no record.
        assert!(participation_fn(5, &[10]).is_empty());
        // Repeated calls do not change the answer.
        assert_eq!(participation_fn(5, &[3]), participation_fn(5, &[3]));
    }
}
