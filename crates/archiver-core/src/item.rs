use crate::tier::AccessTier;

/// Separator the service uses to derive virtual directories from blob names.
pub const DELIMITER: char = '/';

/// Top-level namespace within the storage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// What to list: a container root or a directory prefix inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListScope {
    pub container: String,
    pub prefix: Option<String>,
}

impl ListScope {
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            container: name.into(),
            prefix: None,
        }
    }

    pub fn directory(container: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            prefix: Some(prefix.into()),
        }
    }

    /// Path used in diagnostics, e.g. `/logs/2024/`
    pub fn display_path(&self) -> String {
        format!(
            "/{}/{}",
            self.container,
            self.prefix.as_deref().unwrap_or_default()
        )
    }
}

/// One entry of a single-level listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListedItem {
    Directory(Directory),
    Blob(BlobItem),
    Unknown(UnknownItem),
}

/// Virtual directory: a common name prefix ending in the delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub container: String,
    /// Full prefix including the trailing delimiter, e.g. `logs/2024/`
    pub prefix: String,
    pub display_path: String,
}

impl Directory {
    /// Last path segment of the prefix, without the trailing delimiter.
    pub fn name(&self) -> &str {
        let trimmed = self.prefix.trim_end_matches(DELIMITER);
        trimmed.rsplit(DELIMITER).next().unwrap_or(trimmed)
    }

    pub fn scope(&self) -> ListScope {
        ListScope::directory(&self.container, &self.prefix)
    }
}

/// Leaf object with its tier as observed at listing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    pub container: String,
    pub name: String,
    pub tier: AccessTier,
}

/// Listed entry the walker has no handling for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownItem {
    /// Type tag reported by the backend, e.g. `PageBlob`
    pub kind: String,
    pub uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory(prefix: &str) -> Directory {
        Directory {
            container: "media".to_string(),
            prefix: prefix.to_string(),
            display_path: format!("/media/{prefix}"),
        }
    }

    #[test]
    fn test_directory_name_is_last_segment() {
        assert_eq!(directory("photos/").name(), "photos");
        assert_eq!(directory("photos/2024/raw/").name(), "raw");
    }

    #[test]
    fn test_directory_scope_keeps_prefix() {
        let scope = directory("photos/2024/").scope();
        assert_eq!(scope.container, "media");
        assert_eq!(scope.prefix.as_deref(), Some("photos/2024/"));
        assert_eq!(scope.display_path(), "/media/photos/2024/");
    }

    #[test]
    fn test_container_scope_display_path() {
        assert_eq!(ListScope::container("media").display_path(), "/media/");
    }
}
