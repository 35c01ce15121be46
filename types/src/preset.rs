#![expect(clippy::module_name_repetitions)]

use core::{fmt::Debug, hash::Hash};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{Display, EnumString};
use typenum::{NonZero, Prod, Quot, Unsigned, U128, U16, U2, U2048, U32, U4, U512, U64, U8};

use crate::{altair::consts::SyncCommitteeSubnetCount, config::Config};

#[cfg(test)]
use ::{enum_iterator::Sequence, strum::VariantNames};

pub type SlotsPerEth1VotingPeriod<P> = <P as Preset>::SlotsPerEth1VotingPeriod;
pub type SyncSubcommitteeSize<P> = <P as Preset>::SyncSubcommitteeSize;

/// Compile-time configuration variables.
///
/// See [presets in `consensus-specs`](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/presets).
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    // Phase 0
    type EpochsPerEth1VotingPeriod: Unsigned + NonZero;
    type MaxAttestations: Unsigned + Eq + Debug + Send + Sync;
    type MaxAttesterSlashings: Unsigned + Eq + Debug + Send + Sync;
    type MaxDeposits: Unsigned + Eq + Debug + Send + Sync;
    type MaxProposerSlashings: Unsigned + Eq + Debug + Send + Sync;
    type MaxValidatorsPerCommittee: Unsigned + NonZero + Eq + Ord + Debug + Send + Sync;
    type MaxVoluntaryExits: Unsigned + Eq + Debug + Send + Sync;
    type SlotsPerEpoch: Unsigned + NonZero;

    // Altair
    type SyncCommitteeSize: Unsigned + NonZero + Eq + Debug + Send + Sync;

    // Derived type-level variables
    type SlotsPerEth1VotingPeriod: Unsigned + NonZero + Debug + Send + Sync;
    // This variable no longer exists in `consensus-specs`,
    // but contributions are still sized with it.
    type SyncSubcommitteeSize: Unsigned + NonZero + Eq + Hash + Debug + Send + Sync;

    // Meta
    const NAME: PresetName;

    /// Returns the default configuration associated with a preset.
    ///
    /// This should only be used in tests and benchmarks.
    #[must_use]
    fn default_config() -> Config {
        Self::NAME.default_config()
    }
}

/// [Mainnet preset](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/presets/mainnet).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    // Phase 0
    type EpochsPerEth1VotingPeriod = U64;
    type MaxAttestations = U128;
    type MaxAttesterSlashings = U2;
    type MaxDeposits = U16;
    type MaxProposerSlashings = U16;
    type MaxValidatorsPerCommittee = U2048;
    type MaxVoluntaryExits = U16;
    type SlotsPerEpoch = U32;

    // Altair
    type SyncCommitteeSize = U512;

    // Derived type-level variables
    type SlotsPerEth1VotingPeriod = Prod<Self::EpochsPerEth1VotingPeriod, Self::SlotsPerEpoch>;
    type SyncSubcommitteeSize = Quot<Self::SyncCommitteeSize, SyncCommitteeSubnetCount>;

    // Meta
    const NAME: PresetName = PresetName::Mainnet;
}

macro_rules! delegate_preset_items {
    (
        super $base_preset: ident;
        $(type $associated_type: ident;)*
    ) => {
        $(type $associated_type = <$base_preset as Preset>::$associated_type;)*
    };
}

/// [Minimal preset](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/presets/minimal).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    delegate_preset_items! {
        super Mainnet;

        // Phase 0
        type MaxAttestations;
        type MaxAttesterSlashings;
        type MaxDeposits;
        type MaxProposerSlashings;
        type MaxValidatorsPerCommittee;
        type MaxVoluntaryExits;
    }

    // Phase 0
    type EpochsPerEth1VotingPeriod = U4;
    type SlotsPerEpoch = U8;

    // Altair
    type SyncCommitteeSize = U32;

    // Derived type-level variables
    type SlotsPerEth1VotingPeriod = Prod<Self::EpochsPerEth1VotingPeriod, Self::SlotsPerEpoch>;
    type SyncSubcommitteeSize = Quot<Self::SyncCommitteeSize, SyncCommitteeSubnetCount>;

    // Meta
    const NAME: PresetName = PresetName::Minimal;
}

#[derive(Clone, Copy, Debug, Display, EnumString, DeserializeFromStr, SerializeDisplay)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(test, derive(PartialEq, Eq, Sequence, VariantNames))]
pub enum PresetName {
    Mainnet,
    Minimal,
}

impl PresetName {
    fn default_config(self) -> Config {
        match self {
            Self::Mainnet => Config::mainnet(),
            Self::Minimal => Config::minimal(),
        }
    }
}
