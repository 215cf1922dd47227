//! HTTP Basic gate in front of every route.

use crate::identity::Authenticator;
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

/// Decoded Basic credentials, alive for one request only.
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Parses an `Authorization` header value of the form `Basic <base64(user:pass)>`.
    pub fn from_basic_header(value: &str) -> Option<Self> {
        let (scheme, payload) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = general_purpose::STANDARD.decode(payload.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        // passwords may contain ':', usernames may not
        let (username, password) = decoded.split_once(':')?;

        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized,
    Unauthorized,
}

#[derive(Clone)]
pub struct AuthGate {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthGate {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    /// Every call goes to the authenticator; nothing is cached between requests.
    pub fn check(&self, authorization: Option<&str>) -> AuthOutcome {
        let header = match authorization {
            Some(header) => header,
            None => {
                tracing::debug!("Request without Authorization header");
                return AuthOutcome::Unauthorized;
            }
        };

        let credentials = match Credentials::from_basic_header(header) {
            Some(credentials) => credentials,
            None => {
                tracing::debug!("Malformed Basic credentials");
                return AuthOutcome::Unauthorized;
            }
        };

        if self.authenticator.authenticate(&credentials.username, &credentials.password) {
            tracing::debug!("Authenticated web user {}", credentials.username);
            AuthOutcome::Authorized
        } else {
            tracing::info!("Rejected login for web user {}", credentials.username);
            AuthOutcome::Unauthorized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        calls: AtomicUsize,
    }

    impl Authenticator for Fixed {
        fn authenticate(&self, username: &str, password: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            username == "admin" && password == "pa:ss"
        }
    }

    fn basic(raw: &str) -> String {
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }

    fn gate() -> (AuthGate, Arc<Fixed>) {
        let fixed = Arc::new(Fixed { calls: AtomicUsize::new(0) });
        (AuthGate::new(fixed.clone()), fixed)
    }

    #[test]
    fn splits_on_first_colon() {
        let creds = Credentials::from_basic_header(&basic("admin:pa:ss")).unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "pa:ss");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let header = basic("admin:pa:ss").replace("Basic", "bAsIc");
        assert!(Credentials::from_basic_header(&header).is_some());
    }

    #[test]
    fn debug_never_prints_the_password() {
        let creds = Credentials::from_basic_header(&basic("admin:hunter2")).unwrap();
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn valid_credentials_are_authorized_every_time() {
        let (gate, fixed) = gate();
        let header = basic("admin:pa:ss");
        assert_eq!(gate.check(Some(&header)), AuthOutcome::Authorized);
        assert_eq!(gate.check(Some(&header)), AuthOutcome::Authorized);
        assert_eq!(fixed.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn every_failure_mode_is_plain_unauthorized() {
        let (gate, fixed) = gate();
        let cases = [
            None,
            Some("Bearer abc".to_string()),
            Some("Basic".to_string()),
            Some("Basic !!!not-base64!!!".to_string()),
            Some(basic("no-colon-here")),
            Some(format!("Basic {}", general_purpose::STANDARD.encode([0xff, b':', 0xfe]))),
            Some(basic("admin:wrong")),
        ];
        for header in cases.iter() {
            assert_eq!(gate.check(header.as_deref()), AuthOutcome::Unauthorized, "{:?}", header);
        }
        // only the well-formed pair reached the authority
        assert_eq!(fixed.calls.load(Ordering::SeqCst), 1);
    }
}
