//! HTTP Digest authentication (RFC 2617) for password-protected receivers

use md5::{Digest, Md5};

use super::Method;

/// Username presented in the Digest exchange
pub const DIGEST_USERNAME: &str = "iTunes";

/// The `realm`/`nonce` pair extracted from a 401 `WWW-Authenticate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Protection realm named by the receiver
    pub realm: String,
    /// Server nonce
    pub nonce: String,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate: Digest realm="..", nonce=".."` value
    #[must_use]
    pub fn parse(www_authenticate: &str) -> Option<Self> {
        let params = www_authenticate.trim().strip_prefix("Digest")?;
        let realm = quoted_param(params, "realm")?;
        let nonce = quoted_param(params, "nonce")?;
        Some(Self { realm, nonce })
    }

    /// Compute the `Authorization` header value for a request.
    ///
    /// Some receivers hash the password lowercased; the capability probe
    /// decides and passes `lowercase_password` accordingly.
    #[must_use]
    pub fn authorization(
        &self,
        password: &str,
        method: Method,
        uri: &str,
        lowercase_password: bool,
    ) -> String {
        let password = if lowercase_password {
            password.to_lowercase()
        } else {
            password.to_string()
        };

        let ha1 = md5_hex(&format!("{DIGEST_USERNAME}:{}:{password}", self.realm));
        let ha2 = md5_hex(&format!("{}:{uri}", method.as_str()));
        let response = md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce));

        format!(
            "Digest username=\"{DIGEST_USERNAME}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", response=\"{response}\"",
            self.realm, self.nonce
        )
    }
}

fn quoted_param(params: &str, name: &str) -> Option<String> {
    for part in params.split(',') {
        let (key, value) = part.split_once('=')?;
        if key.trim().eq_ignore_ascii_case(name) {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

fn md5_hex(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    let mut out = String::with_capacity(32);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_challenge() {
        let challenge =
            DigestChallenge::parse("Digest realm=\"raop\", nonce=\"d1b4a7e3\"").unwrap();
        assert_eq!(challenge.realm, "raop");
        assert_eq!(challenge.nonce, "d1b4a7e3");
    }

    #[test]
    fn parse_rejects_basic() {
        assert!(DigestChallenge::parse("Basic realm=\"raop\"").is_none());
    }

    #[test]
    fn authorization_matches_rfc2617_by_hand() {
        // ha1 = md5("iTunes:raop:secret"), ha2 = md5("SETUP:rtsp://10.0.0.2/42")
        // response = md5(ha1:nonce:ha2); values computed independently
        let challenge = DigestChallenge {
            realm: "raop".into(),
            nonce: "abc".into(),
        };
        let header = challenge.authorization("secret", Method::Setup, "rtsp://10.0.0.2/42", false);

        assert!(header.starts_with("Digest username=\"iTunes\""));
        assert!(header.contains("realm=\"raop\""));
        assert!(header.contains("nonce=\"abc\""));
        assert!(header.contains("uri=\"rtsp://10.0.0.2/42\""));

        let expected = {
            let ha1 = md5_hex("iTunes:raop:secret");
            let ha2 = md5_hex("SETUP:rtsp://10.0.0.2/42");
            md5_hex(&format!("{ha1}:abc:{ha2}"))
        };
        assert!(header.ends_with(&format!("response=\"{expected}\"")));
    }

    #[test]
    fn lowercase_password_quirk_changes_the_hash() {
        let challenge = DigestChallenge {
            realm: "raop".into(),
            nonce: "n".into(),
        };
        let mixed = challenge.authorization("Secret", Method::Options, "*", false);
        let lowered = challenge.authorization("Secret", Method::Options, "*", true);
        let already_lower = challenge.authorization("secret", Method::Options, "*", false);

        assert_ne!(mixed, lowered);
        assert_eq!(lowered, already_lower);
    }
}
