//! Bitbucket user model.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A Bitbucket Server user.
///
/// Identity is the `slug` (the server-side login identifier): equality,
/// hashing and ordering all go through it, so `User` can serve as a map key
/// with deterministic iteration order. The remaining fields are display
/// metadata and do not participate in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned numeric ID.
    pub id: i64,

    /// Login name as used in authorship/review records.
    pub name: String,

    /// Human-readable display name.
    pub display_name: String,

    /// Stable URL-safe identifier, unique per server.
    pub slug: String,

    /// Relative avatar URL path served by the Bitbucket instance.
    #[serde(default, rename = "avatarUrl")]
    pub avatar_url_suffix: String,
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.slug == other.slug
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slug.hash(state);
    }
}

impl PartialOrd for User {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for User {
    fn cmp(&self, other: &Self) -> Ordering {
        self.slug.cmp(&other.slug)
    }
}

impl User {
    /// Case-insensitive match against a login name.
    ///
    /// Bitbucket reports logins with inconsistent casing between the
    /// authentication layer and pull-request records.
    pub fn matches_login(&self, login: &str) -> bool {
        self.name.eq_ignore_ascii_case(login)
    }
}

#[cfg(test)]
pub(crate) fn test_user(slug: &str) -> User {
    User {
        id: 0,
        name: slug.to_string(),
        display_name: slug.to_uppercase(),
        slug: slug.to_string(),
        avatar_url_suffix: format!("/users/{}/avatar.png", slug),
    }
}
