use core::hash::Hash;
use std::collections::HashMap;

/// Removes every item whose bits are covered by another item in the same group.
///
/// Groups are emitted in order of first appearance and survivors keep their relative order.
/// Of several items with equal bits only the first one survives.
/// `is_subset` must return `false` for items that cannot be compared.
pub fn eliminate_subsets<T, K: Hash + Eq>(
    items: impl IntoIterator<Item = T>,
    group_key: impl Fn(&T) -> K,
    is_subset: impl Fn(&T, &T) -> bool,
) -> Vec<T> {
    let mut group_indices = HashMap::new();
    let mut groups = Vec::<Vec<T>>::new();

    for item in items {
        let index = *group_indices
            .entry(group_key(&item))
            .or_insert_with(|| {
                groups.push(vec![]);
                groups.len() - 1
            });

        groups[index].push(item);
    }

    groups
        .into_iter()
        .flat_map(|group| {
            let covered = (0..group.len())
                .map(|index| {
                    let item = &group[index];

                    group.iter().enumerate().any(|(other_index, other)| {
                        other_index != index
                            && is_subset(item, other)
                            && (other_index < index || !is_subset(other, item))
                    })
                })
                .collect::<Vec<_>>();

            group
                .into_iter()
                .zip(covered)
                .filter(|(_, covered)| !covered)
                .map(|(item, _)| item)
        })
        .collect()
}
