use crate::{phase0::containers::Attestation, preset::Preset};

impl<P: Preset> Attestation<P> {
    /// Attestations with a single bit set are gossiped individually and pooled separately.
    #[must_use]
    pub fn is_aggregated(&self) -> bool {
        self.aggregation_bits.count_ones() > 1
    }
}
