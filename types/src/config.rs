use core::num::NonZeroU64;
use std::borrow::Cow;

use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use thiserror::Error;

use crate::{
    phase0::primitives::{Slot, UnixSeconds},
    preset::PresetName,
};

/// Configuration variables customizable at runtime.
///
/// See [configurations in `consensus-specs`](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/configs).
///
/// Only the variables used to produce blocks are included.
/// Unknown variables in configuration files are ignored.
#[expect(
    clippy::unsafe_derive_deserialize,
    reason = "A false positive triggered by `nonzero!`. \
              `Config` has no invariants. It is intended to be deserialized from user input. \
              The `unsafe` block in `nonzero!` only operates on the literal passed to it."
)]
#[expect(
    clippy::struct_field_names,
    reason = "struct_field_name is allowed to have config_name, as it starts with the same name as struct"
)]
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,
    pub preset_base: PresetName,

    // Time parameters
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub eth1_follow_distance: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub seconds_per_eth1_block: NonZeroU64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub seconds_per_slot: NonZeroU64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Meta
            //
            // Use `default` as the default `config_name` and override it in `Config::mainnet`.
            // This way custom network data will be kept separate from mainnet data if a user
            // forgets to specify a custom `CONFIG_NAME`.
            config_name: Cow::Borrowed("default"),
            preset_base: PresetName::Mainnet,

            // Time parameters
            eth1_follow_distance: 2048,
            seconds_per_eth1_block: nonzero!(14_u64),
            seconds_per_slot: nonzero!(12_u64),
        }
    }
}

impl Config {
    /// [Mainnet configuration](https://github.com/eth-clients/mainnet/blob/978f1794eada6f85bee76e4d2d5959a5fb8e0cc5/metadata/config.yaml).
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("mainnet"),

            ..Self::default()
        }
    }

    /// [Minimal configuration](https://github.com/ethereum/consensus-specs/blob/aac851f860fa384916f62027b2dbe3318a354c5b/configs/minimal.yaml).
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("minimal"),
            preset_base: PresetName::Minimal,

            // Time parameters
            eth1_follow_distance: 16,
            seconds_per_slot: nonzero!(6_u64),

            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.config_name.is_empty() {
            return Err(Error::NameEmpty);
        }

        // See <https://github.com/ethereum/consensus-specs/blob/aac851f860fa384916f62027b2dbe3318a354c5b/configs/mainnet.yaml#L10>.
        for character in self.config_name.chars() {
            if !matches!(character, 'a'..='z' | '0'..='9' | '-') {
                return Err(Error::NameContainsIllegalCharacters);
            }
        }

        if self.eth1_follow_distance == 0 {
            return Err(Error::Eth1FollowDistanceZero);
        }

        Ok(())
    }

    /// Start of the slot in Unix time.
    ///
    /// Saturates instead of overflowing for slots far in the future.
    #[must_use]
    pub const fn slot_timestamp(&self, genesis_time: UnixSeconds, slot: Slot) -> UnixSeconds {
        genesis_time.saturating_add(slot.saturating_mul(self.seconds_per_slot.get()))
    }

    /// How far back in time the eth1 chain is followed.
    #[must_use]
    pub const fn eth1_follow_duration(&self) -> u64 {
        self.seconds_per_eth1_block
            .get()
            .saturating_mul(self.eth1_follow_distance)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration name is empty")]
    NameEmpty,
    #[error("configuration name contains illegal characters")]
    NameContainsIllegalCharacters,
    #[error("ETH1_FOLLOW_DISTANCE must be positive")]
    Eth1FollowDistanceZero,
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "Refactoring worsens readability, which is more important in tests."
)]
