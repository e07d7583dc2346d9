use xxhash_rust::xxh64::xxh64;

const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode a u64 value as a base62 string (11 chars, zero-padded).
fn base62_encode(mut value: u64) -> String {
    if value == 0 {
        return "0".repeat(11);
    }
    let mut result = Vec::with_capacity(11);
    while value > 0 {
        let idx = (value % 62) as usize;
        result.push(BASE62_CHARS[idx]);
        value /= 62;
    }
    // Pad to 11 chars
    while result.len() < 11 {
        result.push(b'0');
    }
    result.reverse();
    String::from_utf8(result).expect("base62 chars are valid UTF-8")
}

/// Fingerprint raw file bytes for the cache's diagnostic `content_hash`
/// column (never consulted on the hit path — see `cache.rs`).
pub fn content_fingerprint(bytes: &[u8]) -> String {
    base62_encode(xxh64(bytes, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base62_encoding() {
        let encoded = base62_encode(0);
        assert_eq!(encoded.len(), 11);
        assert!(encoded.chars().all(|c| c == '0'));

        let encoded = base62_encode(1);
        assert_eq!(encoded.len(), 11);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let h1 = content_fingerprint(b"def f(): pass\n");
        let h2 = content_fingerprint(b"def f(): pass\n");
        assert_eq!(h1, h2);
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let h1 = content_fingerprint(b"def f(): pass\n");
        let h2 = content_fingerprint(b"def g(): pass\n");
        assert_ne!(h1, h2);
    }

    #[test]
    fn fingerprint_is_fixed_length() {
        assert_eq!(content_fingerprint(b"").len(), 11);
        assert_eq!(content_fingerprint(b"a".repeat(10_000).as_slice()).len(), 11);
    }
}
