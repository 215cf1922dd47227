//! Identity authority: decides whether a username/password pair is valid.

#[cfg(feature = "pam")]
pub mod pam;

#[cfg(feature = "pam")]
pub use pam::PamAuthenticator;

use crate::common::config::{AuthBackend, AuthConfig};
use crate::common::Result;
use crate::storage::UserStore;
use std::sync::Arc;

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

impl<T: Authenticator + ?Sized> Authenticator for Arc<T> {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        (**self).authenticate(username, password)
    }
}

/// Builds the backend selected in the config.
pub fn from_config(config: &AuthConfig) -> Result<Arc<dyn Authenticator>> {
    match config.backend {
        AuthBackend::File => {
            let store = UserStore::open(&config.users_file)?;
            if store.is_empty() {
                tracing::warn!("No users in {}; every login will be rejected. Add one with `watchpost add-user`",
                    config.users_file.display());
            } else {
                tracing::info!("Loaded {} web user(s) from {}", store.len(), config.users_file.display());
            }
            Ok(Arc::new(store))
        }
        #[cfg(feature = "pam")]
        AuthBackend::Pam => {
            tracing::info!("Authenticating web users against PAM service '{}'", config.pam_service);
            Ok(Arc::new(PamAuthenticator::new(&config.pam_service)?))
        }
        #[cfg(not(feature = "pam"))]
        AuthBackend::Pam => Err(crate::common::WatchpostError::Auth(
            "PAM backend requested but watchpost was built without the `pam` feature".into()
        )),
    }
}
