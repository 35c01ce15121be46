pub use block_producer::{BlockProducer, Error, Options};
pub use eth1_vote::{DepositFetcher, Eth1BlockInfo, Eth1BlockOracle, Eth1VoteResolver};
pub use traits::{
    AttestationVerifier, BeaconStateView, ChainReader, HeadState, OperationPool,
    StateRootComputer,
};

mod block_producer;
mod eth1_vote;
mod traits;

#[cfg(test)]
mod fakes;
