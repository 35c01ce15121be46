use core::cmp::Reverse;

use ssz::BitList;

// Picking the subsets that cover the most attesters is the maximum coverage problem,
// which is NP-hard. See <https://en.wikipedia.org/wiki/Maximum_coverage_problem>.
// We use the greedy approximation.

/// Returns indices of the picked bit lists in the order they were picked.
///
/// Each step picks the bit list with the most bits not covered by the previous picks.
/// Ties go to the bit list with more bits set, then to the earlier one.
/// Picking stops when no remaining bit list adds new coverage.
/// Bit lists with a length different from the first pick never add coverage.
pub fn greedy_max_cover<N>(bit_lists: &[&BitList<N>]) -> Vec<usize> {
    let mut remaining = (0..bit_lists.len()).collect::<Vec<_>>();
    let mut picked = vec![];
    let mut covered = None::<BitList<N>>;

    loop {
        let best = remaining
            .iter()
            .enumerate()
            .map(|(position, index)| {
                let bits = bit_lists[*index];

                let new_coverage = match &covered {
                    Some(covered) => bits.count_not_in(covered).unwrap_or_default(),
                    None => bits.count_ones(),
                };

                (position, new_coverage, bits.count_ones(), *index)
            })
            .max_by_key(|(_, new_coverage, ones, index)| (*new_coverage, *ones, Reverse(*index)));

        let Some((position, new_coverage, _, index)) = best else {
            break;
        };

        if new_coverage == 0 {
            break;
        }

        remaining.remove(position);
        picked.push(index);

        match &mut covered {
            Some(covered) => *covered |= bit_lists[index],
            None => covered = Some(bit_lists[index].clone()),
        }
    }

    picked
}
