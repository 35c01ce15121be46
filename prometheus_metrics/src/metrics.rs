use anyhow::Result;
use log::warn;
use prometheus::{
    histogram_opts, opts, Histogram, HistogramVec, IntCounterVec, IntGauge, Registry,
};

#[derive(Debug)]
pub struct Metrics {
    // Build beacon block times
    pub build_beacon_block_times: Histogram,
    pub eth1_vote_times: Histogram,
    pub eth1_pending_deposits_times: Histogram,
    pub prepare_attester_slashings_times: Histogram,
    pub prepare_proposer_slashings_times: Histogram,
    pub prepare_voluntary_exits_times: Histogram,
    pub prepare_sync_aggregate_times: Histogram,

    // Attestation packing
    pub pack_attestations_times: Histogram,
    pub attestation_ranking_times: HistogramVec,
    packed_attestations: IntGauge,

    // Eth1
    eth1_vote_fallbacks: IntCounterVec,

    // Pools
    attestation_pool_deletions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Build beacon block times
            build_beacon_block_times: Histogram::with_opts(histogram_opts!(
                "BUILD_BEACON_BLOCK_TIMES",
                "Build beacon block times",
            ))?,

            eth1_vote_times: Histogram::with_opts(histogram_opts!(
                "ETH1_VOTE_TIMES",
                "Eth1 vote times",
            ))?,

            eth1_pending_deposits_times: Histogram::with_opts(histogram_opts!(
                "ETH1_PENDING_DEPOSITS_TIMES",
                "Eth1 pending deposits times",
            ))?,

            prepare_attester_slashings_times: Histogram::with_opts(histogram_opts!(
                "PREPARE_ATTESTER_SLASHINGS_TIMES",
                "Prepare attester slashing times",
            ))?,

            prepare_proposer_slashings_times: Histogram::with_opts(histogram_opts!(
                "PREPARE_PROPOSER_SLASHINGS_TIMES",
                "Prepare proposer slashing times",
            ))?,

            prepare_voluntary_exits_times: Histogram::with_opts(histogram_opts!(
                "PREPARE_VOLUNTARY_EXIT_TIMES",
                "Prepare voluntary exit times",
            ))?,

            prepare_sync_aggregate_times: Histogram::with_opts(histogram_opts!(
                "PREPARE_SYNC_AGGREGATE_TIMES",
                "Prepare sync aggregate times",
            ))?,

            // Attestation packing
            pack_attestations_times: Histogram::with_opts(histogram_opts!(
                "PACK_ATTESTATIONS_TIMES",
                "Attestation packing times",
            ))?,

            attestation_ranking_times: HistogramVec::new(
                histogram_opts!(
                    "ATTESTATION_RANKING_TIMES",
                    "Attestation ranking times by ranking policy",
                ),
                &["policy"],
            )?,

            packed_attestations: IntGauge::new(
                "PACKED_ATTESTATIONS",
                "Number of attestations in the last produced block",
            )?,

            // Eth1
            eth1_vote_fallbacks: IntCounterVec::new(
                opts!(
                    "ETH1_VOTE_FALLBACKS",
                    "Number of Eth1 votes that were not resolved from the Eth1 chain",
                ),
                &["kind"],
            )?,

            // Pools
            attestation_pool_deletions: IntCounterVec::new(
                opts!(
                    "ATTESTATION_POOL_DELETIONS",
                    "Number of attestations deleted from the pool",
                ),
                &["reason"],
            )?,
        })
    }

    pub fn register_with_default_metrics(&self) -> Result<()> {
        self.register(prometheus::default_registry())
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.build_beacon_block_times.clone()))?;
        registry.register(Box::new(self.eth1_vote_times.clone()))?;
        registry.register(Box::new(self.eth1_pending_deposits_times.clone()))?;
        registry.register(Box::new(self.prepare_attester_slashings_times.clone()))?;
        registry.register(Box::new(self.prepare_proposer_slashings_times.clone()))?;
        registry.register(Box::new(self.prepare_voluntary_exits_times.clone()))?;
        registry.register(Box::new(self.prepare_sync_aggregate_times.clone()))?;
        registry.register(Box::new(self.pack_attestations_times.clone()))?;
        registry.register(Box::new(self.attestation_ranking_times.clone()))?;
        registry.register(Box::new(self.packed_attestations.clone()))?;
        registry.register(Box::new(self.eth1_vote_fallbacks.clone()))?;
        registry.register(Box::new(self.attestation_pool_deletions.clone()))?;

        Ok(())
    }

    pub fn register_eth1_vote_fallback(&self, kind: &str) {
        match self.eth1_vote_fallbacks.get_metric_with_label_values(&[kind]) {
            Ok(counter) => counter.inc(),
            Err(error) => {
                warn!("unable to track Eth1 vote fallback metric for {kind}: {error:?}")
            }
        }
    }

    pub fn register_attestation_pool_deletions(&self, reason: &str, count: usize) {
        match self
            .attestation_pool_deletions
            .get_metric_with_label_values(&[reason])
        {
            Ok(counter) => counter.inc_by(count.try_into().unwrap_or(u64::MAX)),
            Err(error) => {
                warn!("unable to track attestation pool deletion metric for {reason}: {error:?}")
            }
        }
    }

    pub fn set_packed_attestations(&self, attestation_count: usize) {
        match attestation_count.try_into() {
            Ok(count) => self.packed_attestations.set(count),
            Err(error) => warn!("unable to set packed attestation count: {error:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_track_labeled_values() -> Result<()> {
        let registry = Registry::new();
        let metrics = Metrics::new()?;

        metrics.register(&registry)?;
        metrics.register_eth1_vote_fallback("random");
        metrics.register_eth1_vote_fallback("random");
        metrics.register_attestation_pool_deletions("included", 3);
        metrics.set_packed_attestations(7);

        assert_eq!(
            metrics
                .eth1_vote_fallbacks
                .with_label_values(&["random"])
                .get(),
            2,
        );

        assert_eq!(
            metrics
                .attestation_pool_deletions
                .with_label_values(&["included"])
                .get(),
            3,
        );

        assert_eq!(metrics.packed_attestations.get(), 7);

        Ok(())
    }

    #[test]
    fn metrics_cannot_be_registered_twice() -> Result<()> {
        let registry = Registry::new();
        let metrics = Metrics::new()?;

        metrics.register(&registry)?;

        assert!(metrics.register(&registry).is_err());

        Ok(())
    }
}
