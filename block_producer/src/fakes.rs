use core::{ops::Range, time::Duration};
use std::sync::Arc;

use anyhow::{bail, ensure, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use types::{
    altair::containers::{BeaconBlock, SyncCommitteeContribution},
    phase0::{
        containers::{
            Attestation, AttesterSlashing, Deposit, DepositData, Eth1Data, ProposerSlashing,
            SignedVoluntaryExit,
        },
        primitives::{
            DepositIndex, ExecutionBlockHash, ExecutionBlockNumber, SignatureBytes, Slot,
            UnixSeconds, ValidatorIndex, H256,
        },
    },
    preset::Preset,
};

use crate::{
    eth1_vote::{DepositFetcher, Eth1BlockInfo, Eth1BlockOracle},
    traits::{
        AttestationVerifier, BeaconStateView, ChainReader, HeadState, OperationPool,
        StateRootComputer,
    },
};

pub const GENESIS_TIME: UnixSeconds = 1000;
pub const SECONDS_PER_ETH1_BLOCK: UnixSeconds = 14;

#[derive(Clone, Default, Debug)]
pub struct TestState {
    pub slot: Slot,
    pub genesis_time: UnixSeconds,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: Vec<Eth1Data>,
    pub eth1_deposit_index: DepositIndex,
}

impl BeaconStateView for TestState {
    fn slot(&self) -> Slot {
        self.slot
    }

    fn genesis_time(&self) -> UnixSeconds {
        self.genesis_time
    }

    fn eth1_data(&self) -> Eth1Data {
        self.eth1_data
    }

    fn eth1_data_votes(&self) -> &[Eth1Data] {
        &self.eth1_data_votes
    }

    fn eth1_deposit_index(&self) -> DepositIndex {
        self.eth1_deposit_index
    }
}

impl TestState {
    /// A state at `slot` whose canonical `Eth1Data` and deposit index come from `eth1_data`.
    pub fn new(slot: Slot, eth1_data: Eth1Data) -> Self {
        Self {
            slot,
            genesis_time: GENESIS_TIME,
            eth1_data,
            eth1_data_votes: vec![],
            eth1_deposit_index: eth1_data.deposit_count,
        }
    }

    pub fn with_votes(self, eth1_data_votes: impl IntoIterator<Item = Eth1Data>) -> Self {
        Self {
            eth1_data_votes: eth1_data_votes.into_iter().collect(),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TestEth1Block {
    pub number: ExecutionBlockNumber,
    pub timestamp: UnixSeconds,
    pub eth1_data: Eth1Data,
}

/// An Eth1 chain where block `n` has timestamp `n * SECONDS_PER_ETH1_BLOCK`.
pub struct TestEth1Chain {
    pub connected: bool,
    pub blocks: Vec<TestEth1Block>,
    pub chain_start_eth1_data: Eth1Data,
    pub genesis_eth1_block: ExecutionBlockNumber,
    pub delay: Option<Duration>,
    pub fail_lookups: bool,
    pub extra_deposits: usize,
    pub deposit_requests: Mutex<Vec<(ExecutionBlockNumber, Range<DepositIndex>, usize)>>,
}

impl TestEth1Chain {
    /// Blocks `0..=last_number` where block `n` contains `deposit_count(n)` deposits.
    pub fn new(
        last_number: ExecutionBlockNumber,
        deposit_count: impl Fn(ExecutionBlockNumber) -> DepositIndex,
    ) -> Self {
        let blocks = (0..=last_number)
            .map(|number| TestEth1Block {
                number,
                timestamp: number * SECONDS_PER_ETH1_BLOCK,
                eth1_data: Eth1Data {
                    deposit_root: H256::from_low_u64_be(number + 1000),
                    deposit_count: deposit_count(number),
                    block_hash: H256::from_low_u64_be(number + 1),
                },
            })
            .collect();

        Self {
            connected: true,
            blocks,
            chain_start_eth1_data: Eth1Data {
                deposit_root: H256::repeat_byte(0xcc),
                deposit_count: 0,
                block_hash: H256::repeat_byte(0xdd),
            },
            genesis_eth1_block: 0,
            delay: None,
            fail_lookups: false,
            extra_deposits: 0,
            deposit_requests: Mutex::default(),
        }
    }

    pub fn vote(&self, number: ExecutionBlockNumber) -> Eth1Data {
        self.blocks
            .iter()
            .find(|block| block.number == number)
            .map(|block| block.eth1_data)
            .unwrap_or_default()
    }

    async fn simulate_latency(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        ensure!(!self.fail_lookups, "Eth1 node is unreachable");

        Ok(())
    }
}

#[async_trait]
impl Eth1BlockOracle for TestEth1Chain {
    fn is_connected_to_eth1(&self) -> bool {
        self.connected
    }

    async fn block_by_timestamp(&self, timestamp: UnixSeconds) -> Result<Eth1BlockInfo> {
        self.simulate_latency().await?;

        let Some(block) = self
            .blocks
            .iter()
            .rev()
            .find(|block| block.timestamp <= timestamp)
        else {
            bail!("no Eth1 block at or before {timestamp}");
        };

        Ok(Eth1BlockInfo {
            number: block.number,
            timestamp: block.timestamp,
        })
    }

    async fn block_hash_by_height(
        &self,
        height: ExecutionBlockNumber,
    ) -> Result<ExecutionBlockHash> {
        self.simulate_latency().await?;

        let Some(block) = self.blocks.iter().find(|block| block.number == height) else {
            bail!("no Eth1 block at height {height}");
        };

        Ok(block.eth1_data.block_hash)
    }

    async fn block_exists(
        &self,
        hash: ExecutionBlockHash,
    ) -> Result<Option<ExecutionBlockNumber>> {
        self.simulate_latency().await?;

        Ok(self
            .blocks
            .iter()
            .find(|block| block.eth1_data.block_hash == hash)
            .map(|block| block.number))
    }

    fn chain_start_eth1_data(&self) -> Eth1Data {
        self.chain_start_eth1_data
    }

    fn genesis_eth1_block(&self) -> ExecutionBlockNumber {
        self.genesis_eth1_block
    }
}

#[async_trait]
impl DepositFetcher for TestEth1Chain {
    async fn deposits_number_and_root_at_height(
        &self,
        height: ExecutionBlockNumber,
    ) -> (DepositIndex, H256) {
        let eth1_data = self.vote(height);
        (eth1_data.deposit_count, eth1_data.deposit_root)
    }

    async fn pending_deposits(
        &self,
        height: ExecutionBlockNumber,
        indices: Range<DepositIndex>,
        limit: usize,
    ) -> Result<Vec<Deposit>> {
        self.deposit_requests
            .lock()
            .push((height, indices.clone(), limit));

        let deposits = indices
            .take(limit + self.extra_deposits)
            .map(|index| Deposit {
                data: DepositData {
                    amount: index,
                    ..DepositData::default()
                },
                ..Deposit::default()
            })
            .collect();

        Ok(deposits)
    }
}

pub struct TestChain {
    pub head_state: Option<Arc<TestState>>,
    pub head_block_root: H256,
    pub proposer_index: ValidatorIndex,
}

#[async_trait]
impl ChainReader for TestChain {
    async fn head_state_at_slot(&self, slot: Slot) -> Result<HeadState> {
        let Some(state) = self.head_state.clone() else {
            bail!("head state is not available for slot {slot}");
        };

        Ok(HeadState {
            state,
            block_root: self.head_block_root,
        })
    }

    async fn proposer_index(&self, _state: &dyn BeaconStateView) -> Result<ValidatorIndex> {
        Ok(self.proposer_index)
    }
}

/// Rejects attestations from slots listed in `invalid_slots`.
#[derive(Default)]
pub struct TestAttestationVerifier {
    pub invalid_slots: Vec<Slot>,
}

impl<P: Preset> AttestationVerifier<P> for TestAttestationVerifier {
    fn validate_for_inclusion(
        &self,
        state: &dyn BeaconStateView,
        attestation: &Attestation<P>,
    ) -> Result<()> {
        let slot = attestation.data.slot;

        ensure!(
            !self.invalid_slots.contains(&slot),
            "attestation from slot {slot} cannot be included at slot {}",
            state.slot(),
        );

        Ok(())
    }
}

#[derive(Default)]
pub struct TestOperationPool<P: Preset> {
    pub proposer_slashings: Vec<ProposerSlashing>,
    pub attester_slashings: Vec<AttesterSlashing<P>>,
    pub voluntary_exits: Vec<SignedVoluntaryExit>,
    pub sync_committee_contributions: Vec<SyncCommitteeContribution<P>>,
}

#[async_trait]
impl<P: Preset> OperationPool<P> for TestOperationPool<P> {
    async fn proposer_slashings(&self) -> Vec<ProposerSlashing> {
        self.proposer_slashings.clone()
    }

    async fn attester_slashings(&self) -> Vec<AttesterSlashing<P>> {
        self.attester_slashings.clone()
    }

    async fn voluntary_exits(&self) -> Vec<SignedVoluntaryExit> {
        self.voluntary_exits.clone()
    }

    async fn sync_committee_contributions(&self, slot: Slot) -> Vec<SyncCommitteeContribution<P>> {
        self.sync_committee_contributions
            .iter()
            .filter(|contribution| contribution.slot == slot)
            .cloned()
            .collect()
    }

    // Stands in for BLS aggregation by XORing signature bytes.
    fn aggregate_signatures(&self, signatures: &[SignatureBytes]) -> Result<SignatureBytes> {
        let mut aggregate = SignatureBytes::zero();

        for signature in signatures {
            let bytes = aggregate.as_bytes_mut().iter_mut().zip(signature.as_bytes());

            for (aggregate_byte, byte) in bytes {
                *aggregate_byte ^= byte;
            }
        }

        Ok(aggregate)
    }
}

/// Returns a state root derived from the block or fails when `fail` is set.
#[derive(Default)]
pub struct TestStateRootComputer {
    pub fail: bool,
}

#[async_trait]
impl<P: Preset> StateRootComputer<P> for TestStateRootComputer {
    async fn compute_state_root(
        &self,
        state: Arc<dyn BeaconStateView>,
        block: &BeaconBlock<P>,
    ) -> Result<H256> {
        ensure!(!self.fail, "state transition failed");
        ensure!(
            block.state_root.is_zero(),
            "state root should not be set before the state transition",
        );

        Ok(H256::from_low_u64_be(
            block.slot + state.eth1_deposit_index(),
        ))
    }
}
