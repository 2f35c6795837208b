//! Ledger Digests
//!
//! SHA-256 digests over the transaction log, used to seal ledger
//! snapshots and to spot a log that was edited after the fact.
//! Order of updates is part of the digest.

use sha2::{Digest, Sha256};

use super::money::Coins;

/// Digest output type (256 bits / 32 bytes).
pub type LedgerDigest = [u8; 32];

/// Domain-separated SHA-256 builder.
pub struct LedgerHasher {
    hasher: Sha256,
}

impl LedgerHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for a full transaction log.
    pub fn for_ledger() -> Self {
        Self::new(b"ARENA_WALLET_LEDGER_V1")
    }

    /// Hasher sealing a ledger digest together with memberships.
    pub fn for_session() -> Self {
        Self::new(b"ARENA_WALLET_SESSION_V1")
    }

    /// Hasher for viewer id derivation.
    pub fn for_viewer_id() -> Self {
        Self::new(b"arena-wallet-viewer:")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a UUID (16 bytes).
    #[inline]
    pub fn update_uuid(&mut self, uuid: &[u8; 16]) {
        self.hasher.update(uuid);
    }

    /// Update with a length-prefixed string.
    pub fn update_str(&mut self, value: &str) {
        self.update_u64(value.len() as u64);
        self.hasher.update(value.as_bytes());
    }

    /// Update with an amount. Scale is normalized first so `1.50` and `1.5`
    /// hash identically.
    pub fn update_coins(&mut self, value: Coins) {
        self.hasher.update(value.normalize().as_decimal().serialize());
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> LedgerDigest {
        self.hasher.finalize().into()
    }
}

/// Digest a ledger of `entries` items. The closure feeds each entry in
/// append order.
pub fn compute_ledger_digest<F>(entries: u64, add_entries: F) -> LedgerDigest
where
    F: FnOnce(&mut LedgerHasher),
{
    let mut hasher = LedgerHasher::for_ledger();
    hasher.update_u64(entries);
    add_entries(&mut hasher);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = LedgerHasher::new(b"test");
            h.update_i64(1);
            h.update_i64(2);
            h.finalize()
        };
        let hash2 = {
            let mut h = LedgerHasher::new(b"test");
            h.update_i64(2);
            h.update_i64(1);
            h.finalize()
        };
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let mut a = LedgerHasher::new(b"DOMAIN_A");
        let mut b = LedgerHasher::new(b"DOMAIN_B");
        a.update_str("same");
        b.update_str("same");
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_coin_scale_does_not_change_digest() {
        let digest = |c: Coins| {
            let mut h = LedgerHasher::for_ledger();
            h.update_coins(c);
            h.finalize()
        };
        assert_eq!(digest(Coins::new(dec!(1.50))), digest(Coins::new(dec!(1.5))));
        assert_ne!(digest(Coins::new(dec!(1.5))), digest(Coins::new(dec!(-1.5))));
    }

    #[test]
    fn test_string_prefix_prevents_ambiguity() {
        let one = {
            let mut h = LedgerHasher::for_ledger();
            h.update_str("ab");
            h.update_str("c");
            h.finalize()
        };
        let two = {
            let mut h = LedgerHasher::for_ledger();
            h.update_str("a");
            h.update_str("bc");
            h.finalize()
        };
        assert_ne!(one, two);
    }

    #[test]
    fn test_entry_count_is_committed() {
        let a = compute_ledger_digest(0, |_| {});
        let b = compute_ledger_digest(1, |_| {});
        assert_ne!(a, b);
    }
}
