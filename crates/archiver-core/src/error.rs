use thiserror::Error;

use crate::backend::BackendError;
use crate::tier::AccessTier;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot reach storage account while listing {scope}: {source}")]
    Connectivity {
        scope: String,
        #[source]
        source: BackendError,
    },

    #[error("Failed to list {scope}: {source}")]
    Listing {
        scope: String,
        #[source]
        source: BackendError,
    },

    #[error("Failed to change tier of {blob} to {tier}: {source}")]
    TierChange {
        blob: String,
        tier: AccessTier,
        #[source]
        source: BackendError,
    },

    #[error("Failed to write progress output: {0}")]
    Output(#[from] std::io::Error),
}

impl Error {
    /// Classify a listing failure. Unreachable or unauthorized backends are
    /// connectivity errors only at first use, before any request of the run
    /// has succeeded; later they are listing errors of `scope`.
    pub fn listing(scope: impl Into<String>, source: BackendError, first_use: bool) -> Self {
        if first_use && source.is_connectivity() {
            Error::Connectivity {
                scope: scope.into(),
                source,
            }
        } else {
            Error::Listing {
                scope: scope.into(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
