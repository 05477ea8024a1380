//! The leadership ranking scan.

use super::paths::extract_candidate_id;

/// Returns true if a candidate with id `candidate_id` leads the given
/// sibling snapshot.
///
/// The candidate leads iff no sibling name parses to an id strictly less
/// than its own. Sibling names that do not parse are excluded from the
/// comparison; a malformed sibling must never unseat well-formed
/// candidates. Ties cannot occur because the ensemble assigns suffixes
/// uniquely within a parent.
///
/// This is an O(n) scan over the snapshot. Every candidate runs the same
/// comparison locally, so no cross-candidate agreement step is needed.
pub fn leads<S: AsRef<str>>(candidate_id: u64, siblings: &[S]) -> bool {
    !siblings
        .iter()
        .filter_map(|name| extract_candidate_id(name.as_ref()))
        .any(|id| id < candidate_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sole_candidate_leads() {
        assert!(leads(3, &["prefix_0000000003"]));
        assert!(leads(3, &[] as &[&str]));
    }

    #[test]
    fn test_lowest_id_leads() {
        let siblings = ["c_0000000002", "c_0000000005", "c_0000000009"];
        assert!(leads(2, &siblings));
        assert!(!leads(5, &siblings));
        assert!(!leads(9, &siblings));
    }

    #[test]
    fn test_malformed_siblings_are_ignored() {
        let siblings = ["garbage", "c_00000000x", "c_0000000007"];
        assert!(leads(5, &siblings));
        assert!(!leads(9, &siblings));
    }

    #[test]
    fn test_zero_is_a_valid_leading_id() {
        assert!(!leads(1, &["c_0000000000"]));
        assert!(leads(0, &["c_0000000000", "c_0000000004"]));
    }
}
