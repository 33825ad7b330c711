//! Content-addressed cache keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of prompt characters folded into a fingerprint.
pub const PROMPT_PREFIX_CHARS: usize = 500;

/// Identifies one unit of inference work.
///
/// Two requests are the same work iff their fingerprints are equal. The usual
/// way to build one is [`Fingerprint::derive`]; callers with their own keying
/// scheme can wrap any string.
///
/// # Example
///
/// ```
/// use scrivener_cache::Fingerprint;
///
/// let a = Fingerprint::derive(b"%PDF-1.7 ...", "Extract the invoice total", "invoice");
/// let b = Fingerprint::derive(b"%PDF-1.7 ...", "Extract the invoice total", "invoice");
/// let c = Fingerprint::derive(b"%PDF-1.7 ...", "Extract the invoice total", "receipt");
///
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// assert!(a.as_str().starts_with("invoice:"));
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("{}", _0)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of (content, prompt prefix, operation kind).
    ///
    /// The prompt only contributes its first [`PROMPT_PREFIX_CHARS`]
    /// characters.
    pub fn derive(content: &[u8], prompt: &str, kind: &str) -> Self {
        let prompt_prefix = match prompt.char_indices().nth(PROMPT_PREFIX_CHARS) {
            Some((end, _)) => &prompt[..end],
            None => prompt,
        };

        Self(format!(
            "{}:{}:{}",
            kind,
            compute_hash(content),
            &compute_hash(prompt_prefix.as_bytes())[..16]
        ))
    }

    /// The fingerprint as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Fingerprint {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
