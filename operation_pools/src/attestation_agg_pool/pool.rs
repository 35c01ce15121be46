use std::collections::{btree_map::Entry, BTreeMap};

use anyhow::Result;
use log::debug;
use parking_lot::RwLock;
use ssz::BitList;
use types::{
    phase0::{
        containers::{Attestation, AttestationData},
        primitives::SignatureBytes,
    },
    preset::Preset,
};

/// Source of attestations for block production.
///
/// Deleting an attestation that is not in the pool must succeed.
pub trait AttestationPool<P: Preset>: Send + Sync {
    fn aggregated_attestations(&self) -> Vec<Attestation<P>>;

    fn unaggregated_attestations(&self) -> Result<Vec<Attestation<P>>>;

    fn delete_aggregated(&self, attestation: &Attestation<P>) -> Result<()>;

    fn delete_unaggregated(&self, attestation: &Attestation<P>) -> Result<()>;
}

type AttestationKey<P> = (
    AttestationData,
    BitList<<P as Preset>::MaxValidatorsPerCommittee>,
);

type AttestationMap<P> = BTreeMap<AttestationKey<P>, SignatureBytes>;

/// Attestations keyed by `(AttestationData, aggregation bits)`.
///
/// Iteration order is deterministic, which keeps block contents reproducible.
pub struct InMemoryAttestationPool<P: Preset> {
    aggregated: RwLock<AttestationMap<P>>,
    unaggregated: RwLock<AttestationMap<P>>,
}

impl<P: Preset> Default for InMemoryAttestationPool<P> {
    fn default() -> Self {
        Self {
            aggregated: RwLock::default(),
            unaggregated: RwLock::default(),
        }
    }
}

impl<P: Preset> InMemoryAttestationPool<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an attestation into the aggregated or unaggregated map depending on its bits.
    ///
    /// Returns `false` and keeps the existing entry if an attestation with the same data and
    /// bits is already present.
    pub fn insert(&self, attestation: Attestation<P>) -> bool {
        let map = if attestation.is_aggregated() {
            &self.aggregated
        } else {
            &self.unaggregated
        };

        let Attestation {
            aggregation_bits,
            data,
            signature,
        } = attestation;

        match map.write().entry((data, aggregation_bits)) {
            Entry::Vacant(entry) => {
                entry.insert(signature);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.aggregated.read().len() + self.unaggregated.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(map: &RwLock<AttestationMap<P>>) -> Vec<Attestation<P>> {
        map.read()
            .iter()
            .map(|((data, aggregation_bits), signature)| Attestation {
                aggregation_bits: aggregation_bits.clone(),
                data: *data,
                signature: *signature,
            })
            .collect()
    }

    fn delete(map: &RwLock<AttestationMap<P>>, attestation: &Attestation<P>) {
        let key = (attestation.data, attestation.aggregation_bits.clone());

        if map.write().remove(&key).is_none() {
            debug!(
                "attestation already absent from pool (slot: {}, index: {})",
                attestation.data.slot, attestation.data.index,
            );
        }
    }
}

impl<P: Preset> AttestationPool<P> for InMemoryAttestationPool<P> {
    fn aggregated_attestations(&self) -> Vec<Attestation<P>> {
        Self::snapshot(&self.aggregated)
    }

    fn unaggregated_attestations(&self) -> Result<Vec<Attestation<P>>> {
        Ok(Self::snapshot(&self.unaggregated))
    }

    fn delete_aggregated(&self, attestation: &Attestation<P>) -> Result<()> {
        Self::delete(&self.aggregated, attestation);
        Ok(())
    }

    fn delete_unaggregated(&self, attestation: &Attestation<P>) -> Result<()> {
        Self::delete(&self.unaggregated, attestation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use types::{phase0::primitives::H256, preset::Minimal};

    use super::*;

    fn attestation(slot: u64, bytes: &[u8], signature_byte: u8) -> Result<Attestation<Minimal>> {
        Ok(Attestation {
            aggregation_bits: BitList::from_ssz_bytes(bytes)?,
            data: AttestationData {
                slot,
                beacon_block_root: H256::repeat_byte(2),
                ..AttestationData::default()
            },
            signature: SignatureBytes::repeat_byte(signature_byte),
        })
    }

    #[test]
    fn pool_separates_aggregated_and_unaggregated_attestations() -> Result<()> {
        let pool = InMemoryAttestationPool::new();

        assert!(pool.insert(attestation(1, &[0b0000_0011, 0b1], 1)?));
        assert!(pool.insert(attestation(1, &[0b0000_0001, 0b1], 2)?));
        assert!(pool.insert(attestation(2, &[0b0000_0111, 0b1], 3)?));

        assert_eq!(pool.aggregated_attestations().len(), 2);
        assert_eq!(pool.unaggregated_attestations()?.len(), 1);
        assert_eq!(pool.len(), 3);

        Ok(())
    }

    #[test]
    fn pool_keys_attestations_by_data_and_bits() -> Result<()> {
        let pool = InMemoryAttestationPool::new();

        assert!(pool.insert(attestation(1, &[0b0000_0011, 0b1], 1)?));
        assert!(!pool.insert(attestation(1, &[0b0000_0011, 0b1], 2)?));
        assert!(pool.insert(attestation(2, &[0b0000_0011, 0b1], 1)?));

        assert_eq!(pool.len(), 2);

        let signatures = pool
            .aggregated_attestations()
            .into_iter()
            .map(|attestation| attestation.signature)
            .collect::<Vec<_>>();

        assert_eq!(
            signatures,
            [SignatureBytes::repeat_byte(1), SignatureBytes::repeat_byte(1)],
        );

        Ok(())
    }

    #[test]
    fn deletion_is_idempotent() -> Result<()> {
        let pool = InMemoryAttestationPool::new();
        let aggregated = attestation(1, &[0b0000_0011, 0b1], 1)?;
        let unaggregated = attestation(1, &[0b0000_0010, 0b1], 1)?;

        pool.insert(aggregated.clone());
        pool.insert(unaggregated.clone());

        for _ in 0..2 {
            pool.delete_aggregated(&aggregated)?;
            pool.delete_unaggregated(&unaggregated)?;
        }

        assert!(pool.is_empty());

        Ok(())
    }
}
