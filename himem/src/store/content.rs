//! Content addressing.
//!
//! A tile's id is a BLAKE3 digest over its coordinate and its bytes, so the
//! same payload written to the same place always gets the same id. The
//! checksum is an independent SHA-256 over the payload alone.

use sha2::{Digest, Sha256};

/// Deterministic id for a tile: `BLAKE3(stream ‖ snapshot ‖ level ‖ x ‖ y ‖ payload)`.
///
/// Numeric parts are fed in as decimal text. Returns 64 lowercase hex chars.
pub fn tile_id(stream: &str, snapshot_id: &str, level: u32, x: u32, y: u32, payload: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(stream.as_bytes());
    hasher.update(snapshot_id.as_bytes());
    hasher.update(level.to_string().as_bytes());
    hasher.update(x.to_string().as_bytes());
    hasher.update(y.to_string().as_bytes());
    hasher.update(payload);
    hasher.finalize().to_hex().to_string()
}

/// Lowercase hex SHA-256 of the payload.
pub fn checksum(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tile_id_shape() {
        let id = tile_id("vision", "snp", 0, 1, 2, b"abc");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_tile_id_depends_on_every_part() {
        let base = tile_id("v", "s", 0, 1, 2, b"abc");
        assert_ne!(base, tile_id("w", "s", 0, 1, 2, b"abc"));
        assert_ne!(base, tile_id("v", "t", 0, 1, 2, b"abc"));
        assert_ne!(base, tile_id("v", "s", 1, 1, 2, b"abc"));
        assert_ne!(base, tile_id("v", "s", 0, 2, 2, b"abc"));
        assert_ne!(base, tile_id("v", "s", 0, 1, 3, b"abc"));
        assert_ne!(base, tile_id("v", "s", 0, 1, 2, b"abd"));
    }

    #[test]
    fn test_checksum_known_value() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_checksum_independent_of_coordinates() {
        let id_a = tile_id("v", "s", 0, 0, 0, b"same");
        let id_b = tile_id("v", "s", 0, 5, 5, b"same");
        assert_ne!(id_a, id_b);
        assert_eq!(checksum(b"same"), checksum(b"same"));
    }

    proptest! {
        #[test]
        fn prop_tile_id_is_deterministic(
            stream in "[a-z]{1,8}",
            snapshot in "[a-z0-9_]{1,12}",
            level in 0u32..8,
            x in any::<u32>(),
            y in any::<u32>(),
            payload in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let first = tile_id(&stream, &snapshot, level, x, y, &payload);
            let second = tile_id(&stream, &snapshot, level, x, y, &payload);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_one_byte_changes_id(
            payload in proptest::collection::vec(any::<u8>(), 1..128),
            index in any::<prop::sample::Index>(),
        ) {
            let mut changed = payload.clone();
            let i = index.index(changed.len());
            changed[i] = changed[i].wrapping_add(1);
            prop_assert_ne!(
                tile_id("v", "s", 0, 0, 0, &payload),
                tile_id("v", "s", 0, 0, 0, &changed)
            );
        }
    }
}
