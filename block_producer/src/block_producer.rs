use core::{fmt::Display, time::Duration};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use itertools::{Either, Itertools as _};
use log::warn;
use operation_pools::{AttestationPool, RankingPolicy};
use prometheus_metrics::Metrics;
use ssz::ContiguousList;
use tap::Pipe as _;
use thiserror::Error;
use types::{
    altair::containers::{BeaconBlock, BeaconBlockBody, SyncAggregate},
    config::Config,
    phase0::{
        containers::{Attestation, AttesterSlashing, ProposerSlashing, SignedVoluntaryExit},
        primitives::{SignatureBytes, Slot, H256},
    },
    preset::Preset,
};

use crate::{
    eth1_vote::{DepositFetcher, Eth1BlockOracle, Eth1VoteResolver},
    traits::{
        AttestationVerifier, BeaconStateView, ChainReader, HeadState, OperationPool,
        StateRootComputer,
    },
};

const DEFAULT_ETH1_DATA_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug)]
pub struct Options {
    pub ranking_policy: RankingPolicy,
    /// Vote for deterministic fake `Eth1Data` instead of querying the Eth1 chain.
    /// Only useful for testnets without an Eth1 chain.
    pub mock_eth1_votes: bool,
    pub eth1_data_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ranking_policy: RankingPolicy::default(),
            mock_eth1_votes: false,
            eth1_data_timeout: DEFAULT_ETH1_DATA_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to obtain head state for block production")]
    HeadState,
    #[error("failed to obtain deposits for block production")]
    DepositIndex,
    #[error("failed to compute state root of produced block")]
    StateRoot,
}

pub struct BlockProducer<P: Preset> {
    chain: Arc<dyn ChainReader>,
    attestation_pool: Arc<dyn AttestationPool<P>>,
    attestation_verifier: Arc<dyn AttestationVerifier<P>>,
    operation_pool: Arc<dyn OperationPool<P>>,
    state_root_computer: Arc<dyn StateRootComputer<P>>,
    eth1_vote_resolver: Eth1VoteResolver<P>,
    metrics: Option<Arc<Metrics>>,
    ranking_policy: RankingPolicy,
}

impl<P: Preset> BlockProducer<P> {
    #[expect(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        options: Options,
        chain: Arc<dyn ChainReader>,
        attestation_pool: Arc<dyn AttestationPool<P>>,
        attestation_verifier: Arc<dyn AttestationVerifier<P>>,
        operation_pool: Arc<dyn OperationPool<P>>,
        state_root_computer: Arc<dyn StateRootComputer<P>>,
        eth1_block_oracle: Arc<dyn Eth1BlockOracle>,
        deposit_fetcher: Arc<dyn DepositFetcher>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let Options {
            ranking_policy,
            mock_eth1_votes,
            eth1_data_timeout,
        } = options;

        let eth1_vote_resolver = Eth1VoteResolver::new(
            config,
            eth1_block_oracle,
            deposit_fetcher,
            metrics.clone(),
            mock_eth1_votes,
            eth1_data_timeout,
        );

        Self {
            chain,
            attestation_pool,
            attestation_verifier,
            operation_pool,
            state_root_computer,
            eth1_vote_resolver,
            metrics,
            ranking_policy,
        }
    }

    pub async fn build_beacon_block(
        &self,
        slot: Slot,
        randao_reveal: SignatureBytes,
        graffiti: H256,
    ) -> Result<BeaconBlock<P>> {
        let _block_timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.build_beacon_block_times.start_timer());

        let HeadState { state, block_root } = self
            .chain
            .head_state_at_slot(slot)
            .await
            .context(Error::HeadState)?;

        let eth1_data = self.eth1_vote_resolver.eth1_vote(state.as_ref()).await;

        let deposits = self
            .eth1_vote_resolver
            .pending_deposits(state.as_ref(), eth1_data)
            .await?;

        let attestations = self.prepare_attestations(state.as_ref())?;
        let proposer_slashings = self.prepare_proposer_slashings().await;
        let attester_slashings = self.prepare_attester_slashings().await;
        let voluntary_exits = self.prepare_voluntary_exits().await;
        let sync_aggregate = self.prepare_sync_aggregate(slot, block_root).await?;
        let proposer_index = self.chain.proposer_index(state.as_ref()).await?;

        let mut block = BeaconBlock {
            slot,
            proposer_index,
            parent_root: block_root,
            state_root: H256::zero(),
            body: BeaconBlockBody {
                randao_reveal,
                eth1_data,
                graffiti,
                proposer_slashings,
                attester_slashings,
                attestations,
                deposits,
                voluntary_exits,
                sync_aggregate,
            },
        };

        block.state_root = self
            .state_root_computer
            .compute_state_root(state, &block)
            .await
            .context(Error::StateRoot)?;

        log_with_feature(format_args!(
            "built block at slot {slot} with {} attestations and {} deposits (state root: {:?})",
            block.body.attestations.len(),
            block.body.deposits.len(),
            block.state_root,
        ));

        Ok(block)
    }

    /// Removes attestations included in an accepted block from the pool.
    ///
    /// Can be retried if it fails partway through.
    pub fn on_block_accepted(&self, block: &BeaconBlock<P>) -> Result<()> {
        self.delete_attestations(&block.body.attestations, "included")
    }

    fn prepare_attestations(
        &self,
        state: &dyn BeaconStateView,
    ) -> Result<ContiguousList<Attestation<P>, P::MaxAttestations>> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.pack_attestations_times.start_timer());

        let aggregated =
            self.includable_attestations(state, self.attestation_pool.aggregated_attestations());

        let unaggregated =
            self.includable_attestations(state, self.attestation_pool.unaggregated_attestations()?);

        let candidates = operation_pools::dedup(aggregated.into_iter().chain(unaggregated));

        let ranking_timer = self.metrics.as_ref().and_then(|metrics| {
            prometheus_metrics::start_timer_vec(
                &metrics.attestation_ranking_times,
                self.ranking_policy.as_ref(),
            )
        });

        let ranked = operation_pools::rank(candidates, self.ranking_policy);

        prometheus_metrics::stop_and_record(ranking_timer);

        let attestations = operation_pools::limit_to_max_attestations(ranked);

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_packed_attestations(attestations.len());
        }

        features::log!(
            DebugAttestationPacker,
            "packed {} attestations for proposal at slot {} (ranking policy: {})",
            attestations.len(),
            state.slot(),
            self.ranking_policy,
        );

        Ok(attestations)
    }

    // Attestations that cannot be included in a block built on `state` are removed from the pool.
    fn includable_attestations(
        &self,
        state: &dyn BeaconStateView,
        attestations: Vec<Attestation<P>>,
    ) -> Vec<Attestation<P>> {
        let (valid, invalid): (Vec<_>, Vec<_>) =
            attestations.into_iter().partition_map(|attestation| {
                match self
                    .attestation_verifier
                    .validate_for_inclusion(state, &attestation)
                {
                    Ok(()) => Either::Left(attestation),
                    Err(error) => {
                        features::log!(
                            DebugAttestationPacker,
                            "attestation cannot be included: {error:?}",
                        );

                        Either::Right(attestation)
                    }
                }
            });

        if let Err(error) = self.delete_attestations(&invalid, "invalid") {
            warn!("failed to delete invalid attestations from pool: {error:?}");
        }

        valid
    }

    fn delete_attestations(&self, attestations: &[Attestation<P>], reason: &str) -> Result<()> {
        if attestations.is_empty() {
            return Ok(());
        }

        for attestation in attestations {
            if attestation.is_aggregated() {
                self.attestation_pool.delete_aggregated(attestation)?;
            } else {
                self.attestation_pool.delete_unaggregated(attestation)?;
            }
        }

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.register_attestation_pool_deletions(reason, attestations.len());
        }

        Ok(())
    }

    async fn prepare_proposer_slashings(
        &self,
    ) -> ContiguousList<ProposerSlashing, P::MaxProposerSlashings> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.prepare_proposer_slashings_times.start_timer());

        let slashings = self
            .operation_pool
            .proposer_slashings()
            .await
            .pipe(ContiguousList::truncating_from_iter);

        log_with_feature(format_args!(
            "proposer slashings for proposal: {slashings:?}"
        ));

        slashings
    }

    async fn prepare_attester_slashings(
        &self,
    ) -> ContiguousList<AttesterSlashing<P>, P::MaxAttesterSlashings> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.prepare_attester_slashings_times.start_timer());

        let slashings = self
            .operation_pool
            .attester_slashings()
            .await
            .pipe(ContiguousList::truncating_from_iter);

        log_with_feature(format_args!(
            "attester slashings for proposal: {slashings:?}"
        ));

        slashings
    }

    async fn prepare_voluntary_exits(
        &self,
    ) -> ContiguousList<SignedVoluntaryExit, P::MaxVoluntaryExits> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.prepare_voluntary_exits_times.start_timer());

        let exits = self
            .operation_pool
            .voluntary_exits()
            .await
            .pipe(ContiguousList::truncating_from_iter);

        log_with_feature(format_args!("voluntary exits for proposal: {exits:?}"));

        exits
    }

    async fn prepare_sync_aggregate(
        &self,
        slot: Slot,
        beacon_block_root: H256,
    ) -> Result<SyncAggregate<P>> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.prepare_sync_aggregate_times.start_timer());

        // Sync committee members sign the head block in the slot before the proposal.
        let message_slot = slot.saturating_sub(1);

        let contributions = self
            .operation_pool
            .sync_committee_contributions(message_slot)
            .await;

        let selected = operation_pools::select_sync_contributions(&contributions, beacon_block_root);

        if selected.is_empty() {
            return Ok(SyncAggregate::empty());
        }

        let sync_committee_bits = operation_pools::sync_committee_bits(selected.iter().copied())?;

        let signatures = selected
            .iter()
            .map(|contribution| contribution.signature)
            .collect_vec();

        let sync_committee_signature = self.operation_pool.aggregate_signatures(&signatures)?;

        log_with_feature(format_args!(
            "sync aggregate for proposal has {} participants from {} contributions",
            sync_committee_bits.count_ones(),
            selected.len(),
        ));

        Ok(SyncAggregate {
            sync_committee_bits,
            sync_committee_signature,
        })
    }
}

fn log_with_feature(message: impl Display) {
    features::log!(DebugBlockProducer, "{message}");
}
