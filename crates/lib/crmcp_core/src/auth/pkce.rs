//! PKCE (RFC 7636) helpers.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Code challenge method named in the authorize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMethod {
    S256,
    Plain,
}

impl ChallengeMethod {
    /// Parse a `code_challenge_method` value. Absent means `plain`.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("plain") => Some(ChallengeMethod::Plain),
            Some("S256") => Some(ChallengeMethod::S256),
            Some(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeMethod::S256 => "S256",
            ChallengeMethod::Plain => "plain",
        }
    }
}

/// Compute S256 code challenge from a code verifier.
pub fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Check a verifier against a stored challenge.
///
/// `plain` is accepted even though only `S256` is advertised.
pub fn verify_challenge(method: ChallengeMethod, challenge: &str, verifier: &str) -> bool {
    match method {
        ChallengeMethod::S256 => compute_code_challenge(verifier) == challenge,
        ChallengeMethod::Plain => verifier == challenge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s256_matches_rfc7636_appendix_b() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            compute_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
        assert!(verify_challenge(
            ChallengeMethod::S256,
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
            verifier
        ));
        assert!(!verify_challenge(
            ChallengeMethod::S256,
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
            "wrong"
        ));
    }

    #[test]
    fn plain_is_string_equality() {
        assert!(verify_challenge(ChallengeMethod::Plain, "abc", "abc"));
        assert!(!verify_challenge(ChallengeMethod::Plain, "abc", "abd"));
    }

    #[test]
    fn parses_methods() {
        assert_eq!(ChallengeMethod::parse(None), Some(ChallengeMethod::Plain));
        let s256 = ChallengeMethod::parse(Some("S256"));
        assert_eq!(s256, Some(ChallengeMethod::S256));
        let plain = ChallengeMethod::parse(Some("plain"));
        assert_eq!(plain, Some(ChallengeMethod::Plain));
        assert_eq!(ChallengeMethod::parse(Some("md5")), None);
    }
}
