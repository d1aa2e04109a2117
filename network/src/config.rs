use std::path::Path;

use snb_rewards::BATCHING_HF_VERSION;

use crate::types::*;

/// Batching parameters and hard-fork schedule of one network.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NetworkConfig {
    /// Which chain these parameters belong to.
    pub network: NetworkType,
    /// Number of blocks over which payout slots are spread. Every address
    /// gets paid at most once per interval.
    pub batching_interval: u64,
    /// Smallest accrued balance worth a coinbase output.
    pub min_batch_payment: u64,
    /// Hard fork activations, ascending in both version and height.
    pub hard_forks: Vec<HardFork>,
}

impl NetworkConfig {
    pub fn mainnet() -> Self {
        Self {
            network: NetworkType::Mainnet,
            batching_interval: 2520,
            min_batch_payment: 1_000_000_000,
            hard_forks: vec![
                HardFork { version: 18, height: 839_009 },
                HardFork { version: 19, height: 1_090_000 },
                HardFork { version: 21, height: 1_530_000 },
            ],
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: NetworkType::Testnet,
            batching_interval: 20,
            min_batch_payment: 1_000_000,
            hard_forks: vec![
                HardFork { version: 18, height: 1 },
                HardFork { version: 19, height: 10 },
                HardFork { version: 21, height: 1_000 },
            ],
        }
    }

    pub fn devnet() -> Self {
        Self {
            network: NetworkType::Devnet,
            batching_interval: 20,
            min_batch_payment: 1_000_000,
            hard_forks: vec![
                HardFork { version: 19, height: 2 },
                HardFork { version: 21, height: 100 },
            ],
        }
    }

    pub fn fakechain() -> Self {
        Self {
            network: NetworkType::Fakechain,
            batching_interval: 20,
            min_batch_payment: 1_000,
            hard_forks: vec![
                HardFork { version: 19, height: 1 },
                HardFork { version: 21, height: 1_000_000 },
            ],
        }
    }

    /// Built-in parameters for `network`.
    pub fn preset(network: NetworkType) -> Self {
        match network {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Testnet => Self::testnet(),
            NetworkType::Devnet => Self::devnet(),
            NetworkType::Fakechain => Self::fakechain(),
        }
    }

    /// Load a config from a JSON file, or TOML when the extension is `.toml`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: NetworkConfig = match extension(path)?.as_str() {
            "toml" => toml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };
        tracing::debug!(path = %path.display(), network = %config.network, "network config loaded");
        Ok(config)
    }

    /// Save the config; format follows the file extension as in `from_file`.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), NetworkError> {
        let path = path.as_ref();
        let contents = match extension(path)?.as_str() {
            "toml" => toml::to_string_pretty(self)?,
            _ => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate all invariants of the configuration.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.batching_interval == 0 {
            return Err(NetworkError::ZeroBatchingInterval);
        }
        if self.min_batch_payment == 0 {
            return Err(NetworkError::ZeroMinPayment);
        }
        for (index, pair) in self.hard_forks.windows(2).enumerate() {
            if pair[1].version <= pair[0].version || pair[1].height <= pair[0].height {
                return Err(NetworkError::UnorderedHardForks { index: index + 1 });
            }
        }
        if self.batching_fork_height() == Some(0) {
            return Err(NetworkError::BatchingAtGenesis);
        }
        Ok(())
    }

    /// Hard fork version in force at `height`, if any fork has activated yet.
    pub fn hf_version_at(&self, height: u64) -> Option<u8> {
        self.hard_forks
            .iter()
            .take_while(|fork| fork.height <= height)
            .last()
            .map(|fork| fork.version)
    }

    /// Height of the first block whose rewards accrue in the batching ledger.
    pub fn batching_fork_height(&self) -> Option<u64> {
        self.hard_forks
            .iter()
            .find(|fork| fork.version >= BATCHING_HF_VERSION)
            .map(|fork| fork.height)
    }

    /// Whether rewards at `height` are batched.
    pub fn is_batching_height(&self, height: u64) -> bool {
        self.batching_fork_height()
            .is_some_and(|fork_height| height >= fork_height)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

fn extension(path: &Path) -> Result<String, NetworkError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        None => Ok("json".to_string()),
        Some(ext) => match ext.to_ascii_lowercase().as_str() {
            "json" => Ok("json".to_string()),
            "toml" => Ok("toml".to_string()),
            other => Err(NetworkError::UnknownFormat(other.to_string())),
        },
    }
}
