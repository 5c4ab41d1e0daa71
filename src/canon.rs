//! URL canonicalization.
//!
//! Merchants submit the same site under many literal spellings. All of them
//! collapse to one canonical form, which is the key StatusRecords are merged
//! under.
//!
//! # Rules
//!
//! - Surrounding whitespace is trimmed.
//! - The scheme is lower-cased; `https` becomes `http`; a missing scheme is
//!   taken to be `http`.
//! - Host and path are lower-cased.
//! - Leading `www.` labels are stripped from the host.
//! - Trailing `/` characters (and any whitespace before the query) are
//!   stripped from the path.
//! - Query string and fragment are kept verbatim.
//!
//! ```text
//! HTTP://WWW.Foo.com/      ──► http://foo.com
//! https://foo.com/Shop/    ──► http://foo.com/shop
//! foo.com/a?Q=1            ──► http://foo.com/a?Q=1
//! ```
//!
//! The function is total and idempotent: `canonicalize(canonicalize(u)) ==
//! canonicalize(u)` for every input, including garbage.

const SCHEME_SEPARATOR: &str = "://";
const HTTP_SCHEME: &str = "http";
const WWW_PREFIX: &str = "www.";

/// Returns the canonical form of `raw`.
pub fn canonicalize(raw: &str) -> String {
    let trimmed = raw.trim();

    let (scheme, rest) = match trimmed.find(SCHEME_SEPARATOR) {
        Some(idx) => {
            let scheme = trimmed[..idx].to_ascii_lowercase();
            let scheme = if scheme == "https" || scheme.is_empty() {
                HTTP_SCHEME.to_string()
            } else {
                scheme
            };
            (scheme, &trimmed[idx + SCHEME_SEPARATOR.len()..])
        }
        None => (HTTP_SCHEME.to_string(), trimmed),
    };

    // Query and fragment are opaque to us
    let split = rest.find(['?', '#']).unwrap_or(rest.len());
    let (location, suffix) = rest.split_at(split);

    let mut location = location.to_lowercase();
    while location.starts_with(WWW_PREFIX) {
        location.replace_range(..WWW_PREFIX.len(), "");
    }
    let location = location.trim_end_matches(|c: char| c == '/' || c.is_whitespace());

    format!("{scheme}{SCHEME_SEPARATOR}{location}{suffix}")
}

/// Lower-cases a literal URL without otherwise changing it.
///
/// Literal (variant) URLs are stored in this form so that two submissions
/// differing only in case land on the same record key.
pub fn lowercase_literal(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// True when two literal URLs are variants of the same canonical URL.
pub fn are_variants(a: &str, b: &str) -> bool {
    canonicalize(a) == canonicalize(b)
}
