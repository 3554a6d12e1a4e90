//! Cache key derivation — a deterministic digest over every input that can change
//! the model's answer.
//!
//! Parts are length-prefixed before hashing, so `["ab", "c"]` and `["a", "bc"]`
//! never share a framed representation.

use sha2::{Digest, Sha256};
use tracing::warn;

/// Hex characters in every digest, whichever algorithm produced it.
pub const DIGEST_HEX_LEN: usize = 64;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const LANE_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Digest algorithm used for cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Digester {
    Sha256,
    /// Non-cryptographic FNV-1a digest. Keys it produces are namespaced separately.
    Fallback,
}

impl Digester {
    /// Resolves a configured algorithm name. Unknown names degrade to the fallback
    /// digest instead of failing startup.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Digester::Sha256,
            "fnv" | "fallback" => {
                warn!("Cache keys use the non-cryptographic fallback digest");
                Digester::Fallback
            }
            other => {
                warn!(
                    "Digest algorithm '{other}' is unavailable; degrading to the non-cryptographic \
                    fallback digest (collisions become more likely)"
                );
                Digester::Fallback
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Digester::Fallback)
    }

    /// Returns a `DIGEST_HEX_LEN`-char lowercase hex digest of the ordered parts.
    pub fn digest<S: AsRef<str>>(&self, parts: &[S]) -> String {
        let framed = frame_parts(parts);
        let digest = match self {
            Digester::Sha256 => hex::encode(Sha256::digest(&framed)),
            Digester::Fallback => fallback_hex(&framed),
        };
        debug_assert_eq!(digest.len(), DIGEST_HEX_LEN);
        digest
    }
}

/// `<count>\n` followed by `<byte-len>:<bytes>` for each part.
fn frame_parts<S: AsRef<str>>(parts: &[S]) -> Vec<u8> {
    let mut framed = format!("{}\n", parts.len()).into_bytes();
    for part in parts {
        let bytes = part.as_ref().as_bytes();
        framed.extend_from_slice(format!("{}:", bytes.len()).as_bytes());
        framed.extend_from_slice(bytes);
    }
    framed
}

/// Four seeded FNV-1a-64 lanes concatenated to the same width as SHA-256 hex.
fn fallback_hex(bytes: &[u8]) -> String {
    (0..4u64)
        .map(|lane| {
            let mut hash = FNV_OFFSET_BASIS ^ lane.wrapping_mul(LANE_SEED);
            for byte in bytes {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
            format!("{hash:016x}")
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Cache key material
// ────────────────────────────────────────────────────────────────────────────

/// Every value that can change the requested answer, in a fixed order.
#[derive(Debug, Clone)]
pub struct CacheKeyMaterial<'a> {
    pub candidate_name: &'a str,
    pub job_title: &'a str,
    pub candidate_text: &'a str,
    pub candidate_notes: Option<&'a str>,
    pub job_text: &'a str,
    pub job_notes: Option<&'a str>,
    pub retrieved_context: Option<&'a str>,
    pub language: &'a str,
    pub model_id: &'a str,
    /// Canonical JSON of the scoring settings snapshot.
    pub settings: String,
}

impl CacheKeyMaterial<'_> {
    pub fn parts(&self) -> Vec<&str> {
        vec![
            self.candidate_name,
            self.job_title,
            self.candidate_text,
            self.candidate_notes.unwrap_or_default(),
            self.job_text,
            self.job_notes.unwrap_or_default(),
            self.retrieved_context.unwrap_or_default(),
            self.language,
            self.model_id,
            &self.settings,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(candidate_text: &str) -> CacheKeyMaterial<'_> {
        CacheKeyMaterial {
            candidate_name: "Ada Lovelace",
            job_title: "Analytical Engineer",
            candidate_text,
            candidate_notes: None,
            job_text: "We need an engine designer.",
            job_notes: Some("Remote OK"),
            retrieved_context: None,
            language: "English",
            model_id: "claude-sonnet-4-5",
            settings: r#"{"schema_version":2}"#.to_string(),
        }
    }

    #[test]
    fn test_sha256_of_abc_matches_reference_vector() {
        assert_eq!(
            hex::encode(Sha256::digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        let m = material("Built the first program.");
        let parts = m.parts();
        assert_eq!(
            Digester::Sha256.digest(&parts),
            Digester::Sha256.digest(&parts)
        );
    }

    #[test]
    fn test_digest_is_fixed_length_lowercase_hex() {
        for digester in [Digester::Sha256, Digester::Fallback] {
            let digest = digester.digest(&["a", "b"]);
            assert_eq!(digest.len(), DIGEST_HEX_LEN);
            assert!(digest
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn test_whitespace_difference_changes_key() {
        let a = Digester::Sha256.digest(&material("Built the first program.").parts());
        let b = Digester::Sha256.digest(&material("Built the first program. ").parts());
        assert_ne!(a, b);
    }

    #[test]
    fn test_boundary_shift_does_not_collide() {
        for digester in [Digester::Sha256, Digester::Fallback] {
            assert_ne!(digester.digest(&["ab", "c"]), digester.digest(&["a", "bc"]));
            assert_ne!(digester.digest(&["a", ""]), digester.digest(&["", "a"]));
            assert_ne!(digester.digest(&["a"]), digester.digest(&["a", ""]));
        }
    }

    #[test]
    fn test_fallback_digest_differs_from_sha256() {
        let parts = ["candidate", "job"];
        assert_ne!(
            Digester::Sha256.digest(&parts),
            Digester::Fallback.digest(&parts)
        );
    }

    #[test]
    fn test_from_name_resolves_known_and_degrades_unknown() {
        assert_eq!(Digester::from_name("SHA256"), Digester::Sha256);
        assert_eq!(Digester::from_name("sha-256"), Digester::Sha256);
        assert!(Digester::from_name("md5").is_fallback());
        assert!(Digester::from_name("fnv").is_fallback());
    }

    #[test]
    fn test_every_material_field_is_part_of_the_key() {
        let base = Digester::Sha256.digest(&material("x").parts());

        let mut changed = material("x");
        changed.model_id = "claude-haiku";
        assert_ne!(base, Digester::Sha256.digest(&changed.parts()));

        let mut changed = material("x");
        changed.language = "German";
        assert_ne!(base, Digester::Sha256.digest(&changed.parts()));

        let mut changed = material("x");
        changed.retrieved_context = Some("similar past hires");
        assert_ne!(base, Digester::Sha256.digest(&changed.parts()));

        let mut changed = material("x");
        changed.settings.push(' ');
        assert_ne!(base, Digester::Sha256.digest(&changed.parts()));
    }
}
