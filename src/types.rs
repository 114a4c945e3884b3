//! Core types for the ACP ledger.

/// RecordHash: hash of a record header, the identity handed back to callers
pub type RecordHash = [u8; 32];

/// EntryHash: content hash of an entry's fields
pub type EntryHash = [u8; 32];

/// Hash: Generic 256-bit hash value (anchors, caller identities, link bases)
pub type Hash = [u8; 32];

/// RequestId: bridge correlation identifier, unique per process lifetime
pub type RequestId = u64;

/// Render a hash the way it crosses the tool surface.
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parse a hex-encoded hash, with or without a `0x` prefix.
pub fn hash_from_hex(value: &str) -> Option<Hash> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).ok()?;
    bytes.try_into().ok()
}

/// Serde adapter rendering hashes as hex strings on the wire.
pub mod hex_hash {
    use super::{hash_from_hex, hash_to_hex, Hash};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hash_to_hex(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hash_from_hex(&raw).ok_or_else(|| de::Error::custom(format!("invalid hash: {}", raw)))
    }

    /// Same as the parent module, for `Option<Hash>` fields.
    pub mod option {
        use super::super::{hash_from_hex, hash_to_hex, Hash};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            hash: &Option<Hash>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match hash {
                Some(h) => serializer.serialize_some(&hash_to_hex(h)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Hash>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => hash_from_hex(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid hash: {}", raw))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_accepts_prefix() {
        let hash = [7u8; 32];
        let encoded = hash_to_hex(&hash);
        assert_eq!(hash_from_hex(&encoded), Some(hash));
        assert_eq!(hash_from_hex(&format!("0x{}", encoded)), Some(hash));
        assert_eq!(hash_from_hex("abcd"), None);
        assert_eq!(hash_from_hex("zz"), None);
    }
}
