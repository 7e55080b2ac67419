//! Identifiers used throughout the escrow ledgers.
//!
//! Account identities use UUIDv7, deal identifiers are a sequential counter,
//! and offering identifiers are the SHA-256 hash of the offering's name.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{AccrualError, Result};

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Identity of a buyer, seller or escrow holder.
///
/// Authenticated by the host environment; the ledgers only compare
/// identities for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DealId
// ---------------------------------------------------------------------------

/// Sequential deal identifier. The first deal is `DealId(1)`; ids are
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DealId(pub u64);

impl DealId {
    /// The id handed to the first deal a ledger creates.
    pub const FIRST: Self = Self(1);

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deal:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// OfferingId
// ---------------------------------------------------------------------------

/// Name-hash identifying one of a seller's offerings.
///
/// The same name always hashes to the same id, so two sellers may publish
/// offerings with the same name; offerings are keyed by `(seller, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OfferingId(pub [u8; 32]);

impl OfferingId {
    /// Hash an offering name into its identifier.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the name is empty or only whitespace.
    pub fn from_name(name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(AccrualError::InvalidArgument {
                reason: "offering name must not be empty".into(),
            });
        }
        let mut hasher = Sha256::new();
        hasher.update(b"accrual:offering:v1:");
        hasher.update(name.as_bytes());
        Ok(Self(hasher.finalize().into()))
    }

    /// Parse a 64-character hex string into an identifier.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for non-hex input or the wrong length.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| AccrualError::InvalidArgument {
            reason: format!("offering id is not valid hex: {e}"),
        })?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AccrualError::InvalidArgument {
                reason: format!("offering id must be 32 bytes, got {}", b.len()),
            })?;
        Ok(Self(arr))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for OfferingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offering:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_uniqueness() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn deal_id_next() {
        assert_eq!(DealId::FIRST.next(), DealId(2));
        assert_eq!(DealId(41).next(), DealId(42));
    }

    #[test]
    fn offering_id_is_stable_per_name() {
        let a = OfferingId::from_name("gpu-hours").unwrap();
        let b = OfferingId::from_name("gpu-hours").unwrap();
        let c = OfferingId::from_name("storage").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_offering_name_rejected() {
        let err = OfferingId::from_name("   ").unwrap_err();
        assert!(matches!(err, AccrualError::InvalidArgument { .. }));
    }

    #[test]
    fn offering_id_hex_parse() {
        let id = OfferingId::from_name("relay").unwrap();
        assert_eq!(OfferingId::from_hex(&id.to_hex()).unwrap(), id);

        let err = OfferingId::from_hex("zz").unwrap_err();
        assert!(matches!(err, AccrualError::InvalidArgument { .. }));
        let err = OfferingId::from_hex("abcd").unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn display_formats() {
        assert_eq!(DealId(7).to_string(), "deal:7");
        let id = OfferingId([0xab; 32]);
        assert_eq!(id.to_string(), "offering:abababababababab");
    }

    #[test]
    fn serde_roundtrips() {
        let acct = AccountId::new();
        let json = serde_json::to_string(&acct).unwrap();
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(acct, back);

        let id = OfferingId::from_name("relay").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let back: OfferingId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
