//! Application error types.
//!
//! All variants serialize to a structured JSON object so a UI layer can
//! consume them directly. The aggregation pipeline itself converts most of
//! these into event-bus notifications plus empty contributions rather than
//! failing outright; see [`crate::services::connection::route_network_error`].

use serde::Serialize;
use thiserror::Error;

/// Transport-level failure classification.
///
/// Drives the error-routing policy: connect failures become "no network" or
/// "cannot reach server" notifications, timeouts are treated as cancelled
/// fetches and stay silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    /// DNS or socket-level connection failure.
    Connect,

    /// The request timed out or was interrupted.
    Timeout,

    /// Any other transport failure.
    Other,
}

/// Application-level errors.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// Bitbucket API request failed with a non-2xx status.
    #[error("Bitbucket API error: {message}")]
    BitbucketApi {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },

    /// Network request failed before a response was received.
    #[error("Network error: {message}")]
    Network {
        message: String,
        kind: NetworkErrorKind,
    },

    /// Credentials are malformed or missing.
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// Credentials were rejected by the server - requires re-authentication.
    #[error("Credentials expired: {message}")]
    AuthenticationExpired { message: String },

    /// Credential storage operation failed.
    #[error("Credential storage error: {message}")]
    CredentialStorage { message: String },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a database error with operation context.
    pub fn database_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create a Bitbucket API error.
    pub fn bitbucket_api(message: impl Into<String>) -> Self {
        Self::BitbucketApi {
            message: message.into(),
            status_code: None,
            endpoint: None,
        }
    }

    /// Create a Bitbucket API error with status code and endpoint.
    pub fn bitbucket_api_full(
        message: impl Into<String>,
        status_code: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::BitbucketApi {
            message: message.into(),
            status_code: Some(status_code),
            endpoint: Some(endpoint.into()),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>, kind: NetworkErrorKind) -> Self {
        Self::Network {
            message: message.into(),
            kind,
        }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an authentication expired error.
    pub fn authentication_expired(message: impl Into<String>) -> Self {
        Self::AuthenticationExpired {
            message: message.into(),
        }
    }

    /// Check if this is an authentication expired error.
    pub fn is_authentication_expired(&self) -> bool {
        matches!(self, Self::AuthenticationExpired { .. })
    }

    /// Create a credential storage error.
    pub fn credential_storage(message: impl Into<String>) -> Self {
        Self::CredentialStorage {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out", NetworkErrorKind::Timeout)
        } else if err.is_connect() {
            Self::network("Failed to connect to server", NetworkErrorKind::Connect)
        } else if err.is_status() {
            Self::bitbucket_api(format!("HTTP error: {}", err))
        } else {
            Self::network(err.to_string(), NetworkErrorKind::Other)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = AppError::database("connection failed");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"Database\""));
        assert!(json.contains("connection failed"));
    }

    #[test]
    fn test_bitbucket_api_error_full() {
        let err = AppError::bitbucket_api_full(
            "Not Found",
            404,
            "/rest/api/1.0/projects/PLAT/repos/billing/pull-requests",
        );
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"status_code\":404"));
        assert!(json.contains("pull-requests"));
    }

    #[test]
    fn test_network_kind_serialized() {
        let err = AppError::network("no route to host", NetworkErrorKind::Connect);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"connect\""));
    }

    #[test]
    fn test_optional_fields_not_serialized() {
        let err = AppError::database("error");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("operation"));
    }

    #[test]
    fn test_is_authentication_expired() {
        assert!(AppError::authentication_expired("token rejected").is_authentication_expired());
        assert!(!AppError::authentication("bad password").is_authentication_expired());
    }

    #[test]
    fn test_display_impl() {
        let err = AppError::authentication("invalid token");
        assert_eq!(format!("{}", err), "Authentication error: invalid token");
    }
}
