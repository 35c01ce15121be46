use typenum::{Add1, U32};

pub type DepositContractTreeDepth = U32;

// The extra element is the mixed in deposit count.
pub type DepositProofLength = Add1<DepositContractTreeDepth>;
