//! Chain Parameters
//!
//! Fork heights are consensus-critical constants. A node disagreeing on any
//! of these values forks off the network deterministically; they are only
//! ever changed together with a coordinated upgrade.

use serde::{Deserialize, Serialize};

use lib_types::BlockHeight;

/// Heights at which rule variants activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkHeights {
    /// Gates existence of all access-group transactions.
    pub v3_messages_block_height: BlockHeight,

    /// Switches membership storage from embedded member lists to the
    /// membership index, enables mute/unmute, enables the dedicated
    /// member and attribute transactions, and drops the default-name
    /// signature requirement.
    pub access_groups_block_height: BlockHeight,

    /// Enables per-entry extra-data merge.
    pub extra_data_on_entries_block_height: BlockHeight,

    /// Enables the rotating-version scalar inside entry extra-data.
    pub access_groups_migration_height: BlockHeight,
}

/// Consensus parameters for one chain deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub fork_heights: ForkHeights,
}

impl ChainParams {
    /// Mainnet fork schedule.
    pub const fn mainnet() -> Self {
        Self {
            fork_heights: ForkHeights {
                v3_messages_block_height: 120_000,
                extra_data_on_entries_block_height: 148_500,
                access_groups_block_height: 172_800,
                access_groups_migration_height: 180_000,
            },
        }
    }

    /// Testnet fork schedule.
    pub const fn testnet() -> Self {
        Self {
            fork_heights: ForkHeights {
                v3_messages_block_height: 4_000,
                extra_data_on_entries_block_height: 6_500,
                access_groups_block_height: 9_000,
                access_groups_migration_height: 9_500,
            },
        }
    }

    /// Every rule variant active from genesis. For local regtest and tests.
    pub const fn all_forks_at_genesis() -> Self {
        Self {
            fork_heights: ForkHeights {
                v3_messages_block_height: 0,
                extra_data_on_entries_block_height: 0,
                access_groups_block_height: 0,
                access_groups_migration_height: 0,
            },
        }
    }
}

/// Whether a migration keyed at `migration_height` has triggered at `height`.
pub fn migration_triggered(height: BlockHeight, migration_height: BlockHeight) -> bool {
    height >= migration_height
}
