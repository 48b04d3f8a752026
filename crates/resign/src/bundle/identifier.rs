//! Bundle identifier rewriting.
//!
//! A provisioning profile's `application-identifier` is `TEAMID.` followed by
//! a bundle identifier pattern, possibly ending in (or containing) a `*`
//! wildcard segment. An app whose current identifier is already covered by
//! the pattern keeps it; otherwise it adopts the pattern with wildcards
//! replaced by [`WILDCARD_FALLBACK`].

/// Segment that matches any identifier segment.
pub const WILDCARD: &str = "*";

/// Literal substituted for wildcard segments when a new identifier is adopted.
pub const WILDCARD_FALLBACK: &str = "isign";

/// How a candidate identifier compares to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMatch {
    /// A wildcard was reached before any mismatch; the current id is covered.
    Wildcard,
    /// Every segment matched and both have the same length.
    Identical,
    /// A segment differs, or one id is a strict prefix of the other.
    Mismatch,
}

/// Compare `old` segments with candidate segments `new` (team prefix removed).
pub fn compare_segments(old: &[&str], new: &[&str]) -> IdMatch {
    let mut all_matched = true;
    for (o, n) in old.iter().zip(new.iter()) {
        if *n == WILDCARD {
            return IdMatch::Wildcard;
        }
        if n != o {
            all_matched = false;
            break;
        }
    }

    if all_matched && old.len() == new.len() {
        IdMatch::Identical
    } else {
        IdMatch::Mismatch
    }
}

/// Decide the identifier for a bundle currently identified by `old_id`.
///
/// `candidate` is a team-prefixed identifier, either the profile's
/// `application-identifier` or an explicit override; its first segment is
/// always dropped. Returns `None` when `old_id` should be kept.
///
/// ```
/// use resign::bundle::identifier::rewrite;
///
/// assert_eq!(rewrite("com.acme.App", "TEAM.com.acme.*"), None);
/// assert_eq!(rewrite("com.acme.App", "TEAM.com.other.App").as_deref(), Some("com.other.App"));
/// assert_eq!(rewrite("com.acme.App", "TEAM.*").as_deref(), None);
/// ```
pub fn rewrite(old_id: &str, candidate: &str) -> Option<String> {
    let old: Vec<&str> = old_id.split('.').collect();
    let new: Vec<&str> = candidate.split('.').skip(1).collect();

    match compare_segments(&old, &new) {
        IdMatch::Wildcard | IdMatch::Identical => None,
        IdMatch::Mismatch => Some(
            new.iter()
                .map(|&s| if s == WILDCARD { WILDCARD_FALLBACK } else { s })
                .collect::<Vec<_>>()
                .join("."),
        ),
    }
}
