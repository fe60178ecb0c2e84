use subtle::ConstantTimeEq;

/// Constant-time comparison of a presented key against the configured master
/// key. Length is leaked (as with any comparison), but byte content is not.
pub fn verify_master_key(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    if presented.len() != expected.len() {
        return false;
    }
    presented.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_keys_verify() {
        assert!(verify_master_key("secret", "secret"));
    }

    #[test]
    fn mismatched_keys_fail() {
        assert!(!verify_master_key("secret", "other"));
        assert!(!verify_master_key("short", "longerkey"));
    }
}
