use core::cmp::Reverse;

use anyhow::Result;
use itertools::Itertools as _;
use ssz::BitVector;
use typenum::Unsigned as _;
use types::{
    altair::{
        consts::SyncCommitteeSubnetCount, containers::SyncCommitteeContribution,
        primitives::SubcommitteeIndex,
    },
    phase0::primitives::H256,
    preset::{Preset, SyncSubcommitteeSize},
};

use crate::misc;

pub fn filter_by_block_root<'contributions, P: Preset>(
    contributions: impl IntoIterator<Item = &'contributions SyncCommitteeContribution<P>>,
    beacon_block_root: H256,
) -> impl Iterator<Item = &'contributions SyncCommitteeContribution<P>> {
    contributions
        .into_iter()
        .filter(move |contribution| contribution.beacon_block_root == beacon_block_root)
}

pub fn filter_by_subcommittee_index<'contributions, P: Preset>(
    contributions: impl IntoIterator<Item = &'contributions SyncCommitteeContribution<P>>,
    subcommittee_index: SubcommitteeIndex,
) -> impl Iterator<Item = &'contributions SyncCommitteeContribution<P>> {
    contributions
        .into_iter()
        .filter(move |contribution| contribution.subcommittee_index == subcommittee_index)
}

/// Removes contributions whose bits are covered by another contribution
/// for the same slot, block root and subcommittee.
pub fn dedup_contributions<'contributions, P: Preset>(
    contributions: impl IntoIterator<Item = &'contributions SyncCommitteeContribution<P>>,
) -> Vec<&'contributions SyncCommitteeContribution<P>> {
    misc::eliminate_subsets(
        contributions,
        |contribution| {
            (
                contribution.slot,
                contribution.beacon_block_root,
                contribution.subcommittee_index,
            )
        },
        |contribution, other| {
            contribution
                .aggregation_bits
                .is_subset_of(&other.aggregation_bits)
        },
    )
}

/// Returns the contribution with the most bits set. Ties go to the earlier one.
pub fn most_profitable_contribution<'contributions, P: Preset>(
    contributions: impl IntoIterator<Item = &'contributions SyncCommitteeContribution<P>>,
) -> Option<&'contributions SyncCommitteeContribution<P>> {
    contributions
        .into_iter()
        .min_by_key(|contribution| Reverse(contribution.aggregation_bits.count_ones()))
}

/// Picks the best contribution for each subcommittee among those that vote for `beacon_block_root`.
///
/// The result is ordered by subcommittee index.
pub fn select_sync_contributions<P: Preset>(
    contributions: &[SyncCommitteeContribution<P>],
    beacon_block_root: H256,
) -> Vec<&SyncCommitteeContribution<P>> {
    let for_block = filter_by_block_root(contributions, beacon_block_root).collect_vec();

    (0..SyncCommitteeSubnetCount::U64)
        .filter_map(|subcommittee_index| {
            let candidates = filter_by_subcommittee_index(
                for_block.iter().copied(),
                subcommittee_index,
            );

            let candidates = dedup_contributions(candidates);

            features::log!(
                DebugSyncAggregate,
                "subcommittee {subcommittee_index} has {} candidate contributions",
                candidates.len(),
            );

            most_profitable_contribution(candidates)
        })
        .collect()
}

/// Lays out the bits of contributions in the sync committee.
///
/// Bit `i` of the contribution for subcommittee `s` becomes bit `s * SYNC_SUBCOMMITTEE_SIZE + i`.
pub fn sync_committee_bits<'contributions, P: Preset>(
    contributions: impl IntoIterator<Item = &'contributions SyncCommitteeContribution<P>>,
) -> Result<BitVector<P::SyncCommitteeSize>> {
    let mut sync_committee_bits = BitVector::default();

    for contribution in contributions {
        let offset = usize::try_from(contribution.subcommittee_index)?
            .checked_mul(SyncSubcommitteeSize::<P>::USIZE)
            .unwrap_or(usize::MAX);

        for position in contribution.aggregation_bits.iter_ones() {
            sync_committee_bits.set(offset.saturating_add(position), true)?;
        }
    }

    Ok(sync_committee_bits)
}
