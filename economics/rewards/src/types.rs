use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A canonical payee address.
///
/// Addresses compare by their UTF-8 bytes; that order is the canonical
/// order for payout selection and for storage iteration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a service node: its 32-byte public key, hex in JSON.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceNodeKey(pub [u8; 32]);

impl ServiceNodeKey {
    pub fn from_hex(s: &str) -> Result<Self, RewardsError> {
        let bytes = hex::decode(s).map_err(|_| RewardsError::InvalidKey(s.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RewardsError::InvalidKey(s.to_string()))?;
        Ok(Self(key))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ServiceNodeKey {
    type Err = RewardsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ServiceNodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ServiceNodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceNodeKey({})", self.to_hex())
    }
}

impl Serialize for ServiceNodeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ServiceNodeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An `(address, amount)` pair in atomic currency units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchPayment {
    pub address: Address,
    pub amount: u64,
}

impl BatchPayment {
    pub fn new(address: impl Into<Address>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// Sum of a payment list, or `None` on overflow.
pub fn payments_total(payments: &[BatchPayment]) -> Option<u64> {
    payments
        .iter()
        .try_fold(0u64, |acc, p| acc.checked_add(p.amount))
}

/// A staker in a service node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub address: Address,
    /// Staked amount in atomic units.
    pub amount: u64,
}

/// Operator and contributor composition of one service node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNodeInfo {
    /// Address receiving the operator fee.
    pub operator: Address,
    /// Operator fee numerator. The denominator depends on the reward rule
    /// in force (portions before hard fork 21, basis points after).
    pub fee: u64,
    /// Contributors in registration order. The operator's own stake is
    /// listed here as well.
    pub contributors: Vec<Contributor>,
}

impl ServiceNodeInfo {
    /// Total stake across all contributors.
    pub fn total_contributed(&self) -> Result<u64, RewardsError> {
        self.contributors
            .iter()
            .try_fold(0u64, |acc, c| acc.checked_add(c.amount))
            .ok_or(RewardsError::Overflow)
    }
}

/// Read-only view of the service-node list the ledger consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceNodeSnapshot {
    nodes: BTreeMap<ServiceNodeKey, ServiceNodeInfo>,
}

impl ServiceNodeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ServiceNodeKey, info: ServiceNodeInfo) -> Option<ServiceNodeInfo> {
        self.nodes.insert(key, info)
    }

    pub fn get(&self, key: &ServiceNodeKey) -> Option<&ServiceNodeInfo> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Errors produced while splitting a reward.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RewardsError {
    #[error("hard fork {0} predates reward batching")]
    UnsupportedHardFork(u8),

    #[error("operator fee {fee} exceeds denominator {denominator}")]
    InvalidFee { fee: u64, denominator: u64 },

    #[error("invalid service node key: {0}")]
    InvalidKey(String),

    #[error("arithmetic overflow")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_orders_lexically() {
        let mut addrs = vec![Address::from("T6b"), Address::from("T6a"), Address::from("L9")];
        addrs.sort();
        assert_eq!(addrs[0].as_str(), "L9");
        assert_eq!(addrs[2].as_str(), "T6b");
    }

    #[test]
    fn service_node_key_hex_roundtrip() {
        let key = ServiceNodeKey([0xab; 32]);
        let parsed: ServiceNodeKey = key.to_hex().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn service_node_key_rejects_short_hex() {
        assert!(matches!(
            ServiceNodeKey::from_hex("abcd"),
            Err(RewardsError::InvalidKey(_))
        ));
        assert!(ServiceNodeKey::from_hex("zz").is_err());
    }

    #[test]
    fn snapshot_json_uses_hex_keys() {
        let mut snapshot = ServiceNodeSnapshot::new();
        snapshot.insert(
            ServiceNodeKey([1; 32]),
            ServiceNodeInfo {
                operator: Address::from("op"),
                fee: 0,
                contributors: vec![Contributor {
                    address: Address::from("op"),
                    amount: 100,
                }],
            },
        );
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(&"01".repeat(32)));
        let back: ServiceNodeSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn total_contributed_detects_overflow() {
        let info = ServiceNodeInfo {
            operator: Address::from("op"),
            fee: 0,
            contributors: vec![
                Contributor { address: Address::from("a"), amount: u64::MAX },
                Contributor { address: Address::from("b"), amount: 1 },
            ],
        };
        assert_eq!(info.total_contributed(), Err(RewardsError::Overflow));
    }

    #[test]
    fn payments_total_sums_and_detects_overflow() {
        let ok = vec![BatchPayment::new("a", 5), BatchPayment::new("b", 7)];
        assert_eq!(payments_total(&ok), Some(12));
        let overflow = vec![BatchPayment::new("a", u64::MAX), BatchPayment::new("b", 1)];
        assert_eq!(payments_total(&overflow), None);
    }
}
