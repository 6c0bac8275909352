//! Key/value settings store.
//!
//! Holds the non-secret half of the connection configuration (server URL,
//! username). The password lives in the OS keychain, never in SQLite.

use crate::db::pool::DbPool;
use crate::error::AppError;

/// Settings key for the Bitbucket server base URL.
pub const KEY_SERVER_URL: &str = "server_url";

/// Settings key for the signed-in username.
pub const KEY_USERNAME: &str = "username";

/// Read a setting value, or `None` if unset.
pub async fn get_setting(pool: &DbPool, key: &str) -> Result<Option<String>, AppError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(value,)| value))
}

/// Insert or replace a setting value.
pub async fn set_setting(pool: &DbPool, key: &str, value: &str) -> Result<(), AppError> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;

    Ok(())
}

/// Remove a setting.
pub async fn delete_setting(pool: &DbPool, key: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();

        assert_eq!(get_setting(&pool, KEY_SERVER_URL).await.unwrap(), None);

        set_setting(&pool, KEY_SERVER_URL, "https://git.example.com")
            .await
            .unwrap();
        set_setting(&pool, KEY_SERVER_URL, "https://git2.example.com")
            .await
            .unwrap();
        assert_eq!(
            get_setting(&pool, KEY_SERVER_URL).await.unwrap().as_deref(),
            Some("https://git2.example.com")
        );

        delete_setting(&pool, KEY_SERVER_URL).await.unwrap();
        assert_eq!(get_setting(&pool, KEY_SERVER_URL).await.unwrap(), None);
    }
}
