//! Shared types used across satlink crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("missing 0x prefix: {0}")]
    MissingPrefix(String),
    #[error("invalid hex in {input}: {reason}")]
    InvalidHex { input: String, reason: String },
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Fixed-length identifiers rendered as `0x`-prefixed lowercase hex.
macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Take the trailing `LEN` bytes of a longer digest.
            pub fn from_digest_tail(digest: &[u8]) -> Self {
                let mut out = [0u8; $len];
                let start = digest.len().saturating_sub($len);
                let tail = &digest[start..];
                out[$len - tail.len()..].copy_from_slice(tail);
                Self(out)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .ok_or_else(|| IdParseError::MissingPrefix(s.to_string()))?;
                let bytes = hex::decode(digits).map_err(|e| IdParseError::InvalidHex {
                    input: s.to_string(),
                    reason: e.to_string(),
                })?;
                let bytes: [u8; $len] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| IdParseError::WrongLength {
                            expected: $len,
                            actual: bytes.len(),
                        })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// 20-byte on-chain account or contract address.
    Address,
    20
);

hex_id!(
    /// 32-byte transaction identifier.
    TxHash,
    32
);

/// Which side of the topology a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Satellite,
    Hub,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Satellite => "satellite",
            Role::Hub => "hub",
        }
    }
}

/// A contract template to deploy, plus how the operator refers to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployableUnit {
    pub role: Role,
    /// Template identifier handed to the artifact resolver.
    pub template: String,
    /// Human-readable label, e.g. "Game 1".
    pub label: String,
    /// Name of the `KEY=VALUE` line this unit's address is printed under.
    pub env_key: String,
}

impl DeployableUnit {
    pub fn satellite(template: &str, label: &str, env_key: &str) -> Self {
        Self {
            role: Role::Satellite,
            template: template.to_string(),
            label: label.to_string(),
            env_key: env_key.to_string(),
        }
    }

    pub fn hub(template: &str, label: &str, env_key: &str) -> Self {
        Self {
            role: Role::Hub,
            template: template.to_string(),
            label: label.to_string(),
            env_key: env_key.to_string(),
        }
    }
}

/// A unit whose creation transaction has been confirmed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedInstance {
    pub role: Role,
    pub label: String,
    pub env_key: String,
    pub address: Address,
    pub tx: TxHash,
}

impl DeployedInstance {
    pub fn new(unit: &DeployableUnit, address: Address, tx: TxHash) -> Self {
        Self {
            role: unit.role,
            label: unit.label.clone(),
            env_key: unit.env_key.clone(),
            address,
            tx,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Outcome of linking one satellite to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub label: String,
    pub satellite: Address,
    /// Absent when the ledger rejected the call before assigning an id.
    pub tx: Option<TxHash>,
    pub status: RegistrationStatus,
}

impl RegistrationRecord {
    pub fn pending(satellite: &DeployedInstance, tx: Option<TxHash>) -> Self {
        Self {
            label: satellite.label.clone(),
            satellite: satellite.address,
            tx,
            status: RegistrationStatus::Pending,
        }
    }

    /// Pending → Confirmed. Terminal states are left alone.
    pub fn confirm(&mut self) {
        if self.status == RegistrationStatus::Pending {
            self.status = RegistrationStatus::Confirmed;
        }
    }

    /// Pending → Failed. Terminal states are left alone.
    pub fn fail(&mut self) {
        if self.status == RegistrationStatus::Pending {
            self.status = RegistrationStatus::Failed;
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == RegistrationStatus::Confirmed
    }
}

/// Everything a fully successful run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub deployer: Address,
    pub hub: DeployedInstance,
    pub satellites: Vec<DeployedInstance>,
    pub registrations: Vec<RegistrationRecord>,
}

impl DeploymentSummary {
    /// `KEY=VALUE` lines, hub first, then satellites in deployment order.
    pub fn env_lines(&self) -> Vec<String> {
        std::iter::once(&self.hub)
            .chain(self.satellites.iter())
            .map(|i| format!("{}={}", i.env_key, i.address))
            .collect()
    }

    pub fn all_registered(&self) -> bool {
        self.registrations.len() == self.satellites.len()
            && self.registrations.iter().all(RegistrationRecord::is_confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(role: Role, label: &str, key: &str, byte: u8) -> DeployedInstance {
        DeployedInstance {
            role,
            label: label.to_string(),
            env_key: key.to_string(),
            address: Address::from_bytes([byte; 20]),
            tx: TxHash::from_bytes([byte; 32]),
        }
    }

    #[test]
    fn address_display_and_parse() {
        let addr = Address::from_bytes([0xab; 20]);
        let text = addr.to_string();
        assert_eq!(text.len(), 42);
        assert!(text.starts_with("0xabab"));
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn address_parse_rejects_bad_input() {
        assert!(matches!(
            "abcd".parse::<Address>(),
            Err(IdParseError::MissingPrefix(_))
        ));
        assert!(matches!(
            "0xzz".parse::<Address>(),
            Err(IdParseError::InvalidHex { .. })
        ));
        assert_eq!(
            "0x0102".parse::<Address>(),
            Err(IdParseError::WrongLength {
                expected: 20,
                actual: 2
            })
        );
    }

    #[test]
    fn digest_tail_keeps_last_bytes() {
        let digest: Vec<u8> = (0u8..32).collect();
        let addr = Address::from_digest_tail(&digest);
        assert_eq!(addr.as_bytes()[0], 12);
        assert_eq!(addr.as_bytes()[19], 31);
    }

    #[test]
    fn registration_transitions_once() {
        let sat = instance(Role::Satellite, "Game 1", "G1", 1);
        let mut rec = RegistrationRecord::pending(&sat, None);
        assert_eq!(rec.status, RegistrationStatus::Pending);
        rec.confirm();
        rec.fail();
        assert_eq!(rec.status, RegistrationStatus::Confirmed);

        let mut rec = RegistrationRecord::pending(&sat, None);
        rec.fail();
        rec.confirm();
        assert_eq!(rec.status, RegistrationStatus::Failed);
    }

    #[test]
    fn summary_env_lines_hub_first() {
        let hub = instance(Role::Hub, "Market", "HUB_ADDR", 9);
        let sats = vec![
            instance(Role::Satellite, "A", "SAT_A", 1),
            instance(Role::Satellite, "B", "SAT_B", 2),
        ];
        let registrations = sats
            .iter()
            .map(|s| {
                let mut r = RegistrationRecord::pending(s, Some(TxHash::from_bytes([7; 32])));
                r.confirm();
                r
            })
            .collect();
        let summary = DeploymentSummary {
            deployer: Address::from_bytes([0; 20]),
            hub,
            satellites: sats,
            registrations,
        };

        let lines = summary.env_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("HUB_ADDR=0x0909"));
        assert!(lines[2].starts_with("SAT_B=0x0202"));
        assert!(summary.all_registered());
    }

    #[test]
    fn summary_serializes_addresses_as_hex() {
        let inst = instance(Role::Hub, "Market", "HUB", 0x11);
        let json = serde_json::to_value(&inst).unwrap();
        assert_eq!(json["role"], "hub");
        assert_eq!(
            json["address"],
            "0x1111111111111111111111111111111111111111"
        );
        let back: DeployedInstance = serde_json::from_value(json).unwrap();
        assert_eq!(back, inst);
    }
}
