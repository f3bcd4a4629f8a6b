//! Core type definitions for revdb.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Sequence number for ordering committed mutations.
///
/// Every log record carries one. Sequence numbers are strictly increasing
/// for the lifetime of a store, across restarts and compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Length of the hex digest part of a generated revision.
const DIGEST_HEX_LEN: usize = 32;

/// Longest revision string that fits a log record.
pub const MAX_REV_LEN: usize = 255;

/// An opaque revision token.
///
/// Tokens produced by the store have the form `<generation>-<32 hex>`.
/// Tokens arriving from callers or remote peers are kept verbatim and only
/// ever compared for equality, so any string can be held here;
/// [`Revision::is_well_formed`] tells whether it follows the
/// `<generation>-<suffix>` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// First revision of a new lineage.
    #[must_use]
    pub fn first(id: &str, body: &[u8]) -> Self {
        Self::generate(1, None, id, body)
    }

    /// Successor of `self` for an update carrying `body`.
    ///
    /// A predecessor without a readable generation is treated as
    /// generation 0.
    ///
    /// # Errors
    ///
    /// `InvalidDocument` when the predecessor is at `u64::MAX`, since no
    /// greater generation exists.
    pub fn next(&self, id: &str, body: &[u8]) -> CoreResult<Self> {
        let generation = self
            .generation()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| CoreError::invalid_document("revision generation exhausted"))?;
        Ok(Self::generate(generation, Some(self), id, body))
    }

    fn generate(generation: u64, prev: Option<&Revision>, id: &str, body: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        if let Some(prev) = prev {
            hasher.update(prev.as_str().as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
        hasher.update(body);
        hasher.update(Uuid::new_v4().as_bytes());
        let digest = hasher.finalize();

        let mut text = format!("{generation}-");
        for byte in &digest[..DIGEST_HEX_LEN / 2] {
            text.push_str(&format!("{byte:02x}"));
        }
        Self(text)
    }

    /// Generation counter, if the token has the `<n>-<suffix>` shape.
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        let (head, suffix) = self.0.split_once('-')?;
        if suffix.is_empty() || head.is_empty() || !head.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        head.parse().ok().filter(|generation| *generation > 0)
    }

    /// Whether the token can be stored as a remote revision.
    ///
    /// The generation must leave room for a local successor.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.0.len() <= MAX_REV_LEN
            && !self.0.chars().any(|c| c.is_whitespace() || c.is_control())
            && self.generation().is_some_and(|generation| generation < u64::MAX)
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token, returning its text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Revision {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for Revision {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl PartialEq<str> for Revision {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Revision {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_ordering() {
        let s1 = SequenceNumber::new(1);
        let s2 = SequenceNumber::new(2);
        assert!(s1 < s2);
        assert_eq!(s1.next(), s2);
        assert_eq!(s2.to_string(), "seq:2");
    }

    #[test]
    fn first_revision_shape() {
        let rev = Revision::first("note/1", b"body");
        assert_eq!(rev.generation(), Some(1));
        let (head, hex) = rev.as_str().split_once('-').unwrap();
        assert_eq!(head, "1");
        assert_eq!(hex.len(), 32);
        assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert!(rev.is_well_formed());
    }

    #[test]
    fn next_increments_generation() {
        let first = Revision::first("a", b"x");
        let second = first.next("a", b"y").unwrap();
        let third = second.next("a", b"y").unwrap();
        assert_eq!(second.generation(), Some(2));
        assert_eq!(third.generation(), Some(3));
        assert_ne!(second, third);
    }

    #[test]
    fn identical_content_gives_distinct_tokens() {
        let a = Revision::first("a", b"same");
        let b = Revision::first("a", b"same");
        assert_ne!(a, b);
    }

    #[test]
    fn generation_parsing() {
        assert_eq!(Revision::from("7-abc").generation(), Some(7));
        assert_eq!(Revision::from("0-abc").generation(), None);
        assert_eq!(Revision::from("x-abc").generation(), None);
        assert_eq!(Revision::from("+1-abc").generation(), None);
        assert_eq!(Revision::from("3-").generation(), None);
        assert_eq!(Revision::from("nodash").generation(), None);
    }

    #[test]
    fn well_formed_rejects_whitespace_and_length() {
        assert!(Revision::from("2-remote").is_well_formed());
        assert!(!Revision::from("2-has space").is_well_formed());
        assert!(!Revision::from("").is_well_formed());
        let long = format!("1-{}", "a".repeat(MAX_REV_LEN));
        assert!(!Revision::from(long).is_well_formed());
    }

    #[test]
    fn unreadable_predecessor_restarts_at_one() {
        let odd = Revision::from("legacy");
        assert_eq!(odd.next("a", b"").unwrap().generation(), Some(1));
    }

    #[test]
    fn last_generation_has_no_successor() {
        let top = Revision::from(format!("{}-x", u64::MAX));
        assert_eq!(top.generation(), Some(u64::MAX));
        assert!(!top.is_well_formed());
        assert!(matches!(
            top.next("a", b""),
            Err(CoreError::InvalidDocument { .. })
        ));

        let below = Revision::from(format!("{}-x", u64::MAX - 1));
        assert!(below.is_well_formed());
        assert_eq!(below.next("a", b"").unwrap().generation(), Some(u64::MAX));
    }

    #[test]
    fn compares_with_str() {
        let rev = Revision::from("1-abc");
        assert!(rev == "1-abc");
        assert_eq!(serde_json::to_string(&rev).unwrap(), "\"1-abc\"");
    }
}
