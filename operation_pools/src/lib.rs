pub use crate::{
    attestation_agg_pool::{
        dedup, limit_to_max_attestations, rank, select_attestations, AttestationPool,
        InMemoryAttestationPool, RankingPolicy,
    },
    sync_committee_agg_pool::{
        dedup_contributions, filter_by_block_root, filter_by_subcommittee_index,
        most_profitable_contribution, select_sync_contributions, sync_committee_bits,
    },
};

mod attestation_agg_pool {
    pub use attestation_packer::{
        dedup, limit_to_max_attestations, rank, select_attestations, RankingPolicy,
    };
    pub use pool::{AttestationPool, InMemoryAttestationPool};

    mod attestation_packer;
    mod max_cover;
    mod pool;
}

mod misc;

mod sync_committee_agg_pool {
    pub use contributions::{
        dedup_contributions, filter_by_block_root, filter_by_subcommittee_index,
        most_profitable_contribution, select_sync_contributions, sync_committee_bits,
    };

    mod contributions;
}
