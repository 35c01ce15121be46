use core::{
    cmp::Reverse,
    marker::PhantomData,
    ops::{Range, RangeInclusive},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use log::{error, warn};
use prometheus_metrics::Metrics;
use ssz::ContiguousList;
use typenum::Unsigned as _;
use types::{
    config::Config,
    phase0::{
        containers::{Deposit, Eth1Data},
        primitives::{
            DepositIndex, ExecutionBlockHash, ExecutionBlockNumber, UnixSeconds, H256,
        },
    },
    preset::{Preset, SlotsPerEth1VotingPeriod},
};

use crate::{block_producer::Error, traits::BeaconStateView};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Eth1BlockInfo {
    pub number: ExecutionBlockNumber,
    pub timestamp: UnixSeconds,
}

#[async_trait]
pub trait Eth1BlockOracle: Send + Sync {
    fn is_connected_to_eth1(&self) -> bool;

    /// Returns the last block with a timestamp at or before `timestamp`.
    async fn block_by_timestamp(&self, timestamp: UnixSeconds) -> Result<Eth1BlockInfo>;

    async fn block_hash_by_height(&self, height: ExecutionBlockNumber)
        -> Result<ExecutionBlockHash>;

    /// Returns the height of the block or `None` if the block is not known.
    async fn block_exists(&self, hash: ExecutionBlockHash)
        -> Result<Option<ExecutionBlockNumber>>;

    fn chain_start_eth1_data(&self) -> Eth1Data;

    fn genesis_eth1_block(&self) -> ExecutionBlockNumber;
}

#[async_trait]
pub trait DepositFetcher: Send + Sync {
    async fn deposits_number_and_root_at_height(
        &self,
        height: ExecutionBlockNumber,
    ) -> (DepositIndex, H256);

    /// Returns at most `limit` deposits with indices in `indices` along with their proofs
    /// against the deposit tree at `height`.
    async fn pending_deposits(
        &self,
        height: ExecutionBlockNumber,
        indices: Range<DepositIndex>,
        limit: usize,
    ) -> Result<Vec<Deposit>>;
}

#[derive(Clone, Copy, Debug)]
enum Fallback {
    Mock,
    Random,
}

impl Fallback {
    const fn label(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Random => "random",
        }
    }
}

struct Tally {
    eth1_data: Eth1Data,
    height: ExecutionBlockNumber,
    count: usize,
}

pub struct Eth1VoteResolver<P: Preset> {
    config: Arc<Config>,
    eth1_block_oracle: Arc<dyn Eth1BlockOracle>,
    deposit_fetcher: Arc<dyn DepositFetcher>,
    metrics: Option<Arc<Metrics>>,
    mock_eth1_votes: bool,
    eth1_data_timeout: Duration,
    already_warned: AtomicBool,
    phantom: PhantomData<P>,
}

impl<P: Preset> Eth1VoteResolver<P> {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        eth1_block_oracle: Arc<dyn Eth1BlockOracle>,
        deposit_fetcher: Arc<dyn DepositFetcher>,
        metrics: Option<Arc<Metrics>>,
        mock_eth1_votes: bool,
        eth1_data_timeout: Duration,
    ) -> Self {
        Self {
            config,
            eth1_block_oracle,
            deposit_fetcher,
            metrics,
            mock_eth1_votes,
            eth1_data_timeout,
            already_warned: AtomicBool::new(false),
            phantom: PhantomData,
        }
    }

    /// Returns the `Eth1Data` to vote for in a block built on `state_at_slot`.
    ///
    /// Never fails. Problems with the Eth1 node result in a random vote that cannot form a
    /// majority with votes of other proposers.
    pub async fn eth1_vote(&self, state_at_slot: &dyn BeaconStateView) -> Eth1Data {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.eth1_vote_times.start_timer());

        if self.mock_eth1_votes {
            return self.fallback_vote(state_at_slot, Fallback::Mock);
        }

        if !self.eth1_block_oracle.is_connected_to_eth1() {
            return self.fallback_vote(state_at_slot, Fallback::Random);
        }

        self.already_warned.store(false, Ordering::SeqCst);

        match tokio::time::timeout(self.eth1_data_timeout, self.majority_vote(state_at_slot)).await
        {
            Ok(Ok(eth1_data)) => {
                features::log!(DebugEth1, "Eth1 vote: {eth1_data:?}");
                eth1_data
            }
            Ok(Err(error)) => {
                error!("failed to compute Eth1 vote: {error:?}");
                self.fallback_vote(state_at_slot, Fallback::Random)
            }
            Err(_) => {
                error!(
                    "computing Eth1 vote took longer than {:?}",
                    self.eth1_data_timeout,
                );
                self.fallback_vote(state_at_slot, Fallback::Random)
            }
        }
    }

    /// Returns deposits to include in a block that votes for `eth1_vote`.
    ///
    /// Deposits are taken from the `Eth1Data` that will be canonical after the block is applied.
    pub async fn pending_deposits(
        &self,
        state_at_slot: &dyn BeaconStateView,
        eth1_vote: Eth1Data,
    ) -> Result<ContiguousList<Deposit, P::MaxDeposits>> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.eth1_pending_deposits_times.start_timer());

        if self.mock_eth1_votes || !self.eth1_block_oracle.is_connected_to_eth1() {
            return Ok(ContiguousList::default());
        }

        let existing_vote_count = state_at_slot
            .eth1_data_votes()
            .iter()
            .filter(|vote| **vote == eth1_vote)
            .count();

        let canonical_eth1_data =
            if (existing_vote_count + 1) * 2 > SlotsPerEth1VotingPeriod::<P>::USIZE {
                eth1_vote
            } else {
                state_at_slot.eth1_data()
            };

        let Some(height) = self
            .eth1_block_oracle
            .block_exists(canonical_eth1_data.block_hash)
            .await
            .context(Error::DepositIndex)?
        else {
            features::log!(
                DebugEth1,
                "canonical Eth1 block {:?} is not known",
                canonical_eth1_data.block_hash,
            );

            return Ok(ContiguousList::default());
        };

        if height == self.eth1_block_oracle.genesis_eth1_block() {
            return Ok(ContiguousList::default());
        }

        let deposit_indices =
            state_at_slot.eth1_deposit_index()..canonical_eth1_data.deposit_count;

        features::log!(DebugEth1, "deposit indices: {deposit_indices:?} at height {height}");

        if deposit_indices.is_empty() {
            return Ok(ContiguousList::default());
        }

        let deposits = self
            .deposit_fetcher
            .pending_deposits(height, deposit_indices, P::MaxDeposits::USIZE)
            .await
            .context(Error::DepositIndex)?;

        Ok(ContiguousList::truncating_from_iter(deposits))
    }

    /// [`get_eth1_vote`](https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/validator.md#eth1-data)
    /// with block ranges resolved by timestamp.
    async fn majority_vote(&self, state_at_slot: &dyn BeaconStateView) -> Result<Eth1Data> {
        let eth1_data = state_at_slot.eth1_data();
        let period_start = voting_period_start_time::<P>(&self.config, state_at_slot);
        let follow_duration = self.config.eth1_follow_duration();
        let earliest_valid_time = period_start.saturating_sub(follow_duration.saturating_mul(2));
        let latest_valid_time = period_start.saturating_sub(follow_duration);

        features::log!(
            DebugEth1,
            "valid Eth1 block times: {earliest_valid_time}..={latest_valid_time}",
        );

        let earliest_block = self
            .eth1_block_oracle
            .block_by_timestamp(earliest_valid_time)
            .await?;

        let latest_block = self
            .eth1_block_oracle
            .block_by_timestamp(latest_valid_time)
            .await?;

        // The oracle returns the last block at or before the time.
        // That block is outside the range if it is strictly before it.
        let earliest_valid_height = if earliest_block.timestamp < earliest_valid_time {
            earliest_block.number.saturating_add(1)
        } else {
            earliest_block.number
        };

        if latest_block.timestamp < earliest_valid_time {
            features::log!(DebugEth1, "no Eth1 blocks in voting range");
            return Ok(eth1_data);
        }

        let (deposit_count, deposit_root) = self
            .deposit_fetcher
            .deposits_number_and_root_at_height(latest_block.number)
            .await;

        if deposit_count == 0 {
            return Ok(self.eth1_block_oracle.chain_start_eth1_data());
        }

        let valid_heights = earliest_valid_height..=latest_block.number;
        let tallies = self
            .tally_votes(state_at_slot, eth1_data, valid_heights)
            .await;

        if let Some(winner) = tallies
            .into_iter()
            .min_by_key(|tally| (Reverse(tally.count), Reverse(tally.height)))
        {
            return Ok(winner.eth1_data);
        }

        if deposit_count < eth1_data.deposit_count {
            return Ok(eth1_data);
        }

        let block_hash = self
            .eth1_block_oracle
            .block_hash_by_height(latest_block.number)
            .await?;

        Ok(Eth1Data {
            deposit_root,
            deposit_count,
            block_hash,
        })
    }

    // Tallies are kept in order of first appearance.
    async fn tally_votes(
        &self,
        state_at_slot: &dyn BeaconStateView,
        eth1_data: Eth1Data,
        valid_heights: RangeInclusive<ExecutionBlockNumber>,
    ) -> Vec<Tally> {
        let mut tallies = Vec::<Tally>::new();

        for vote in state_at_slot.eth1_data_votes() {
            if let Some(tally) = tallies.iter_mut().find(|tally| tally.eth1_data == *vote) {
                tally.count += 1;
                continue;
            }

            // Ensure proposers cannot move back to earlier deposit contract states.
            if vote.deposit_count < eth1_data.deposit_count {
                continue;
            }

            let height = match self.eth1_block_oracle.block_exists(vote.block_hash).await {
                Ok(Some(height)) => height,
                Ok(None) => continue,
                Err(error) => {
                    warn!(
                        "failed to look up Eth1 block {:?} referenced by vote: {error:?}",
                        vote.block_hash,
                    );
                    continue;
                }
            };

            if !valid_heights.contains(&height) {
                continue;
            }

            tallies.push(Tally {
                eth1_data: *vote,
                height,
                count: 1,
            });
        }

        tallies
    }

    fn fallback_vote(&self, state_at_slot: &dyn BeaconStateView, fallback: Fallback) -> Eth1Data {
        if !self.already_warned.swap(true, Ordering::SeqCst) {
            match fallback {
                Fallback::Mock => warn!("Eth1 votes are mocked; this must not be used in production"),
                Fallback::Random => {
                    warn!("beacon node is not connected to an Eth1 chain; Eth1 votes are now random")
                }
            }
        }

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.register_eth1_vote_fallback(fallback.label());
        }

        let deposit_count = state_at_slot.eth1_deposit_index();

        match fallback {
            Fallback::Mock => {
                let slot = state_at_slot.slot();
                let epoch = slot / P::SlotsPerEpoch::U64;
                let period_position = slot % SlotsPerEth1VotingPeriod::<P>::U64;
                let deposit_root = hashing::hash_64(epoch.saturating_add(period_position));

                Eth1Data {
                    deposit_root,
                    deposit_count,
                    block_hash: hashing::hash_256(deposit_root),
                }
            }
            Fallback::Random => Eth1Data {
                deposit_root: hashing::hash_64_padded_to_256(rand::random()),
                deposit_count,
                block_hash: hashing::hash_64_padded_to_256(rand::random()),
            },
        }
    }
}

/// [`voting_period_start_time`](https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/validator.md#eth1-data)
fn voting_period_start_time<P: Preset>(
    config: &Config,
    state_at_slot: &dyn BeaconStateView,
) -> UnixSeconds {
    let slot = state_at_slot.slot();
    let period_start_slot = slot - slot % SlotsPerEth1VotingPeriod::<P>::U64;

    config.slot_timestamp(state_at_slot.genesis_time(), period_start_slot)
}
