//! Path and identity functions for election nodes.

/// Returns true if `name` is a well-formed election root path.
///
/// A valid root is a leading `/` followed by a single `[A-Za-z0-9_-]+`
/// segment. Nested paths and any other punctuation are rejected.
pub fn is_valid_election_root(name: &str) -> bool {
    match name.strip_prefix('/') {
        Some(segment) => !segment.is_empty() && segment.bytes().all(is_word_or_hyphen),
        None => false,
    }
}

/// Returns true if `prefix` is a well-formed candidate name prefix.
///
/// A valid prefix is `[A-Za-z0-9_-]+` with no leading `/`.
pub fn is_valid_candidate_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.bytes().all(is_word_or_hyphen)
}

/// Extract the ensemble-assigned sequence number from a candidate node name
/// or path.
///
/// Accepts either a bare node name (`prefix_0000000001`) or a full path
/// (`/root/prefix_0000000001`). The trailing digit run is parsed as a plain
/// integer, so zero-padding of any length is tolerated.
///
/// Returns `None` when the input has more than two path segments, contains
/// a `:`, is a relative multi-segment path, or when the trailing digit run
/// is missing or not immediately preceded by a single contiguous
/// word-or-hyphen run anchored at the start of the final segment. Digit
/// runs that do not fit in `u64` after zero-stripping are also `None`.
pub fn extract_candidate_id(path_or_name: &str) -> Option<u64> {
    if path_or_name.contains(':') {
        return None;
    }

    let segment = match path_or_name.strip_prefix('/') {
        Some(rest) => {
            let mut parts = rest.split('/');
            let first = parts.next()?;
            match (parts.next(), parts.next()) {
                (None, _) => first,
                (Some(second), None) => second,
                (Some(_), Some(_)) => return None,
            }
        }
        // A relative name containing '/' is a single malformed segment,
        // not a path.
        None if path_or_name.contains('/') => return None,
        None => path_or_name,
    };

    parse_suffixed_segment(segment)
}

/// Split `segment` into name prefix and trailing digit run, returning the
/// digit run as an integer.
fn parse_suffixed_segment(segment: &str) -> Option<u64> {
    let bytes = segment.as_bytes();
    let mut split = bytes.len();
    while split > 0 && bytes[split - 1].is_ascii_digit() {
        split -= 1;
    }

    let prefix = &segment[..split];
    let digits = &segment[split..];
    if digits.is_empty() || prefix.is_empty() {
        return None;
    }
    if !prefix.bytes().all(is_word_or_hyphen) {
        return None;
    }

    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        // An all-zero suffix is sequence number zero.
        return Some(0);
    }
    significant.parse::<u64>().ok()
}

fn is_word_or_hyphen(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}


#[cfg(all(test, feature = "bolero"))]
mod property_tests {
    use super::*;
    use bolero::check;

    #[test]
    fn prop_extract_is_deterministic() {
        check!().with_type::<String>().for_each(|input| {
            assert_eq!(extract_candidate_id(input), extract_candidate_id(input));
        });
    }

    #[test]
    fn prop_zero_padding_is_irrelevant() {
        check!().with_type::<(u32, u8)>().for_each(|(id, pad)| {
            let pad = (*pad % 16) as usize;
            let name = format!("candidate_{}{}", "0".repeat(pad), id);
            assert_eq!(extract_candidate_id(&name), Some(u64::from(*id)));
        });
    }

    #[test]
    fn prop_valid_root_round_trip() {
        check!().with_type::<String>().for_each(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_alphanumeric()) {
                assert!(is_valid_election_root(&format!("/{segment}")));
            }
        });
    }
}
