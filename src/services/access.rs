//! Two-key access control.
//!
//! The main key gates `create`; the access key gates everything else. A
//! request carrying a valid main key is also allowed to access objects.
//! Either secret may be left unset, which disables that check.

use subtle::ConstantTimeEq;

/// Credentials a request presented, taken from its headers.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub main_key: Option<String>,
    pub access_key: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denied {
    MainKey,
    AccessKey,
}

#[derive(Clone, Default)]
pub struct AccessController {
    main_key: Option<String>,
    access_key: Option<String>,
}

impl AccessController {
    /// Empty secrets count as unset.
    pub fn new(main_key: Option<String>, access_key: Option<String>) -> Self {
        Self {
            main_key: main_key.filter(|k| !k.is_empty()),
            access_key: access_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn check_create(&self, creds: &Credentials) -> Result<(), Denied> {
        if secret_allows(self.main_key.as_deref(), creds.main_key.as_deref()) {
            Ok(())
        } else {
            Err(Denied::MainKey)
        }
    }

    pub fn check_access(&self, creds: &Credentials) -> Result<(), Denied> {
        if secret_allows(self.access_key.as_deref(), creds.access_key.as_deref()) {
            return Ok(());
        }
        if let Some(main) = self.main_key.as_deref() {
            if presented_matches(main, creds.main_key.as_deref()) {
                return Ok(());
            }
        }
        Err(Denied::AccessKey)
    }
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("main_key", &self.main_key.is_some())
            .field("access_key", &self.access_key.is_some())
            .finish()
    }
}

fn secret_allows(secret: Option<&str>, presented: Option<&str>) -> bool {
    match secret {
        None => true,
        Some(secret) => presented_matches(secret, presented),
    }
}

fn presented_matches(secret: &str, presented: Option<&str>) -> bool {
    presented.is_some_and(|p| bool::from(secret.as_bytes().ct_eq(p.as_bytes())))
}
