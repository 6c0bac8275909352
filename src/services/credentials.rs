//! Credential storage using the OS keychain.
//!
//! Only the password is secret-managed; the server URL and username live in
//! the SQLite settings table. One keychain entry exists per server URL.

use crate::error::AppError;
use keyring::Entry;

/// Service name used in the keychain.
const SERVICE_NAME: &str = "team-bucket";

/// Keychain-backed password storage.
pub struct CredentialService;

impl CredentialService {
    /// Store the password for a server.
    pub fn store_password(server_url: &str, password: &str) -> Result<(), AppError> {
        let entry = Self::get_entry(server_url)?;

        entry
            .set_password(password)
            .map_err(|e| AppError::credential_storage(format!("Failed to store password: {}", e)))
    }

    /// Retrieve the password for a server.
    pub fn get_password(server_url: &str) -> Result<String, AppError> {
        let entry = Self::get_entry(server_url)?;

        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => AppError::not_found_with_id("credential", server_url),
            _ => AppError::credential_storage(format!("Failed to retrieve password: {}", e)),
        })
    }

    /// Delete the password for a server. Idempotent.
    pub fn delete_password(server_url: &str) -> Result<(), AppError> {
        let entry = Self::get_entry(server_url)?;

        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::credential_storage(format!(
                "Failed to delete password: {}",
                e
            ))),
        }
    }

    /// Create a keyring entry for the given server URL.
    fn get_entry(server_url: &str) -> Result<Entry, AppError> {
        let account = normalize_url(server_url);

        Entry::new(SERVICE_NAME, &account).map_err(|e| {
            AppError::credential_storage(format!("Failed to create keyring entry: {}", e))
        })
    }
}

/// Normalize a URL for use as an account identifier.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}
