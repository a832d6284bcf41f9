use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Storage tier of a blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    Hot,
    Cool,
    Cold,
    #[default]
    Archive,
    /// Reported by the service but not one of the named tiers, or absent.
    #[serde(skip)]
    Unknown,
}

impl AccessTier {
    /// Map a tier string as reported by the storage service.
    pub fn from_service(value: &str) -> Self {
        value.parse().unwrap_or(AccessTier::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::Hot => "Hot",
            AccessTier::Cool => "Cool",
            AccessTier::Cold => "Cold",
            AccessTier::Archive => "Archive",
            AccessTier::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown access tier '{0}' (expected hot, cool, cold or archive)")]
pub struct ParseTierError(pub String);

impl FromStr for AccessTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Ok(AccessTier::Hot),
            "cool" => Ok(AccessTier::Cool),
            "cold" => Ok(AccessTier::Cold),
            "archive" => Ok(AccessTier::Archive),
            _ => Err(ParseTierError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Archive".parse::<AccessTier>(), Ok(AccessTier::Archive));
        assert_eq!("COOL".parse::<AccessTier>(), Ok(AccessTier::Cool));
        assert_eq!("hot".parse::<AccessTier>(), Ok(AccessTier::Hot));
    }

    #[test]
    fn test_unknown_is_not_a_target() {
        assert!("unknown".parse::<AccessTier>().is_err());
        assert!("P10".parse::<AccessTier>().is_err());
    }

    #[test]
    fn test_from_service_falls_back_to_unknown() {
        assert_eq!(AccessTier::from_service("Cold"), AccessTier::Cold);
        assert_eq!(AccessTier::from_service("P30"), AccessTier::Unknown);
        assert_eq!(AccessTier::from_service(""), AccessTier::Unknown);
    }

    #[test]
    fn test_display_uses_service_spelling() {
        assert_eq!(AccessTier::Archive.to_string(), "Archive");
        assert_eq!(AccessTier::default(), AccessTier::Archive);
    }
}
