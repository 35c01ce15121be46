use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

pub use ethereum_types::H256;

pub type CommitteeIndex = u64;
pub type DepositIndex = u64;
pub type Epoch = u64;
pub type ExecutionBlockHash = H256;
pub type ExecutionBlockNumber = u64;
pub type Gwei = u64;
pub type Slot = u64;
pub type UnixSeconds = u64;
pub type ValidatorIndex = u64;

construct_fixed_hash! {
    pub struct PublicKeyBytes(48);
}

construct_fixed_hash! {
    pub struct SignatureBytes(96);
}

impl_fixed_hash_serde!(PublicKeyBytes, 48);
impl_fixed_hash_serde!(SignatureBytes, 96);

impl SignatureBytes {
    /// The compressed point at infinity. Aggregating no signatures results in it.
    #[must_use]
    pub fn empty() -> Self {
        let mut bytes = Self::zero();
        bytes.0[0] = 0xc0;
        bytes
    }
}
