use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which chain the ledger follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Devnet,
    /// Local regression-test chain.
    Fakechain,
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::Mainnet => write!(f, "mainnet"),
            NetworkType::Testnet => write!(f, "testnet"),
            NetworkType::Devnet => write!(f, "devnet"),
            NetworkType::Fakechain => write!(f, "fakechain"),
        }
    }
}

impl FromStr for NetworkType {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(NetworkType::Mainnet),
            "testnet" => Ok(NetworkType::Testnet),
            "devnet" => Ok(NetworkType::Devnet),
            "fakechain" => Ok(NetworkType::Fakechain),
            other => Err(NetworkError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A hard fork activation: blocks at or above `height` use `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardFork {
    pub version: u8,
    pub height: u64,
}

/// Network configuration error.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("batching interval must be > 0")]
    ZeroBatchingInterval,

    #[error("minimum batch payment must be > 0")]
    ZeroMinPayment,

    #[error("hard fork at index {index} is not above its predecessor")]
    UnorderedHardForks { index: usize },

    #[error("reward batching cannot activate at the genesis block")]
    BatchingAtGenesis,

    #[error("unsupported config file format: {0}")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}
