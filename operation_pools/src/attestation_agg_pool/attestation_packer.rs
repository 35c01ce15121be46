use core::cmp::Reverse;
use std::collections::BTreeMap;

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use ssz::ContiguousList;
use strum::{AsRefStr, Display, EnumString};
use types::{
    phase0::{containers::Attestation, primitives::Slot},
    preset::Preset,
};

use crate::{attestation_agg_pool::max_cover, misc};

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Debug,
    AsRefStr,
    Display,
    EnumString,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RankingPolicy {
    /// Highest slot first, then most bits set.
    Naive,
    /// Greedy maximum coverage of attesters within each slot.
    #[default]
    MaxCover,
}

/// Dedups, ranks and truncates attestations to what fits in a block.
pub fn select_attestations<P: Preset>(
    attestations: impl IntoIterator<Item = Attestation<P>>,
    ranking_policy: RankingPolicy,
) -> ContiguousList<Attestation<P>, P::MaxAttestations> {
    let candidates = dedup(attestations);
    let candidate_count = candidates.len();
    let ranked = rank(candidates, ranking_policy);
    let selected = limit_to_max_attestations(ranked);

    features::log!(
        DebugAttestationPacker,
        "selected {} of {candidate_count} deduplicated attestations (ranking policy: {ranking_policy})",
        selected.len(),
    );

    selected
}

/// Removes attestations whose aggregation bits are covered by another attestation
/// with the same `AttestationData`.
///
/// Attestations with equal bits are collapsed into the first one.
/// Attestations with bit lists of different lengths are never considered covered.
pub fn dedup<P: Preset>(
    attestations: impl IntoIterator<Item = Attestation<P>>,
) -> Vec<Attestation<P>> {
    misc::eliminate_subsets(
        attestations,
        |attestation| attestation.data,
        |attestation, other| {
            attestation
                .aggregation_bits
                .is_subset_of(&other.aggregation_bits)
        },
    )
}

/// Orders attestations for inclusion according to `ranking_policy`.
///
/// With [`RankingPolicy::MaxCover`] attestations are grouped by slot and each slot is packed
/// greedily by marginal coverage. Attestations whose aggregation bits have a length different
/// from the first pick in their slot never add coverage. They are placed after the picked ones
/// along with other unpicked attestations, ordered by bit count.
#[must_use]
pub fn rank<P: Preset>(
    attestations: Vec<Attestation<P>>,
    ranking_policy: RankingPolicy,
) -> Vec<Attestation<P>> {
    match ranking_policy {
        RankingPolicy::Naive => rank_naively(attestations),
        RankingPolicy::MaxCover => rank_by_max_cover(attestations),
    }
}

#[must_use]
pub fn limit_to_max_attestations<P: Preset>(
    attestations: Vec<Attestation<P>>,
) -> ContiguousList<Attestation<P>, P::MaxAttestations> {
    ContiguousList::truncating_from_iter(attestations)
}

fn rank_naively<P: Preset>(mut attestations: Vec<Attestation<P>>) -> Vec<Attestation<P>> {
    attestations.sort_by_cached_key(|attestation| {
        Reverse((
            attestation.data.slot,
            attestation.aggregation_bits.count_ones(),
        ))
    });

    attestations
}

fn rank_by_max_cover<P: Preset>(attestations: Vec<Attestation<P>>) -> Vec<Attestation<P>> {
    let mut by_slot = BTreeMap::<Slot, Vec<_>>::new();

    for attestation in attestations {
        by_slot
            .entry(attestation.data.slot)
            .or_default()
            .push(attestation);
    }

    by_slot
        .into_values()
        .rev()
        .flat_map(|attestations| {
            let bit_lists = attestations
                .iter()
                .map(|attestation| &attestation.aggregation_bits)
                .collect_vec();

            let picked = max_cover::greedy_max_cover(&bit_lists);

            let mut slots = attestations.into_iter().map(Some).collect_vec();

            let picked = picked
                .into_iter()
                .filter_map(|index| slots[index].take())
                .collect_vec();

            let rest = slots
                .into_iter()
                .flatten()
                .sorted_by_cached_key(|attestation| {
                    Reverse(attestation.aggregation_bits.count_ones())
                });

            picked.into_iter().chain(rest)
        })
        .collect()
}
