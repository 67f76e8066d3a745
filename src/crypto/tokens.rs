use rand::Rng;
use uuid::Uuid;

/// Opaque session identifier stored in the session cookie.
pub fn generate_session_token() -> String {
    Uuid::new_v4().to_string()
}

/// Anti-forgery token: 32 random bytes, URL-safe base64 without padding.
pub fn generate_csrf_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    base64_simd::URL_SAFE_NO_PAD.encode_to_string(&bytes)
}

/// Compare two tokens without short-circuiting on the first differing byte.
pub fn tokens_match(expected: &str, submitted: &str) -> bool {
    let (a, b) = (expected.as_bytes(), submitted.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csrf_tokens_are_unique_and_url_safe() {
        let first = generate_csrf_token();
        let second = generate_csrf_token();

        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_match() {
        let token = generate_csrf_token();
        assert!(tokens_match(&token, &token.clone()));
        assert!(!tokens_match(&token, "short"));
        assert!(!tokens_match(&token, &generate_csrf_token()));
    }
}
