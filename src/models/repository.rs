//! Project and repository models.

use serde::{Deserialize, Serialize};

/// A Bitbucket project grouping repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Short project key used in REST paths (e.g., "PLAT").
    pub key: String,

    /// Project display name.
    pub name: String,

    /// Optional project description.
    pub description: Option<String>,
}

/// A repository the user has selected for tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// URL-safe repository identifier used in REST paths.
    pub slug: String,

    /// Repository display name.
    pub name: String,

    /// Owning project.
    pub project: Project,
}

#[cfg(test)]
pub(crate) fn test_repository(project_key: &str, slug: &str) -> Repository {
    Repository {
        slug: slug.to_string(),
        name: slug.to_string(),
        project: Project {
            key: project_key.to_string(),
            name: project_key.to_string(),
            description: None,
        },
    }
}
