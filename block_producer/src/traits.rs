// Dependency injection for the parts of the node that block production only reads from.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use types::{
    altair::containers::{BeaconBlock, SyncCommitteeContribution},
    phase0::{
        containers::{
            Attestation, AttesterSlashing, Eth1Data, ProposerSlashing, SignedVoluntaryExit,
        },
        primitives::{DepositIndex, SignatureBytes, Slot, UnixSeconds, ValidatorIndex, H256},
    },
    preset::Preset,
};

/// The parts of a beacon state needed to vote on `Eth1Data` and include deposits.
pub trait BeaconStateView: Send + Sync {
    fn slot(&self) -> Slot;

    fn genesis_time(&self) -> UnixSeconds;

    fn eth1_data(&self) -> Eth1Data;

    fn eth1_data_votes(&self) -> &[Eth1Data];

    fn eth1_deposit_index(&self) -> DepositIndex;
}

#[derive(Clone)]
pub struct HeadState {
    /// Head state advanced to the slot of the block being produced.
    pub state: Arc<dyn BeaconStateView>,
    pub block_root: H256,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn head_state_at_slot(&self, slot: Slot) -> Result<HeadState>;

    async fn proposer_index(&self, state: &dyn BeaconStateView) -> Result<ValidatorIndex>;
}

pub trait AttestationVerifier<P: Preset>: Send + Sync {
    /// Checks whether `attestation` can be included in a block built on `state`.
    /// Signatures are not verified.
    fn validate_for_inclusion(
        &self,
        state: &dyn BeaconStateView,
        attestation: &Attestation<P>,
    ) -> Result<()>;
}

#[async_trait]
pub trait OperationPool<P: Preset>: Send + Sync {
    async fn proposer_slashings(&self) -> Vec<ProposerSlashing>;

    async fn attester_slashings(&self) -> Vec<AttesterSlashing<P>>;

    async fn voluntary_exits(&self) -> Vec<SignedVoluntaryExit>;

    async fn sync_committee_contributions(&self, slot: Slot) -> Vec<SyncCommitteeContribution<P>>;

    fn aggregate_signatures(&self, signatures: &[SignatureBytes]) -> Result<SignatureBytes>;
}

#[async_trait]
pub trait StateRootComputer<P: Preset>: Send + Sync {
    /// Applies `block` to `state` and returns the root of the resulting state.
    async fn compute_state_root(
        &self,
        state: Arc<dyn BeaconStateView>,
        block: &BeaconBlock<P>,
    ) -> Result<H256>;
}
