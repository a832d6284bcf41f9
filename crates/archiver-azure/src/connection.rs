//! Storage account connection strings
//!
//! `Key=Value` pairs separated by `;`, keys case-insensitive:
//! `DefaultEndpointsProtocol`, `AccountName`, `AccountKey`,
//! `SharedAccessSignature`, `EndpointSuffix`, `BlobEndpoint` and
//! `UseDevelopmentStorage`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;

use crate::error::{ClientError, Result};

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

// Well-known local emulator account.
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    SharedKey { account: String, key: Vec<u8> },
    /// SAS token without the leading `?`
    Sas(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .finish_non_exhaustive(),
            Credential::Sas(_) => f.write_str("Sas(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub blob_endpoint: Url,
    pub credential: Credential,
}

impl ConnectionString {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ClientError::EmptyConnectionString);
        }

        let mut settings = HashMap::new();
        for (index, segment) in value.split(';').enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment
                .split_once('=')
                .ok_or(ClientError::MalformedSegment(index))?;
            settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development(settings.get("developmentstorageproxyuri"));
        }

        let account = settings.get("accountname");
        let blob_endpoint = match settings.get("blobendpoint") {
            Some(endpoint) => endpoint.clone(),
            None => {
                let account = account.ok_or(ClientError::MissingSetting("AccountName"))?;
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL);
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                format!("{protocol}://{account}.blob.{suffix}")
            }
        };

        let credential = if let Some(key) = settings.get("accountkey") {
            let account = account.ok_or(ClientError::MissingSetting("AccountName"))?;
            Credential::SharedKey {
                account: account.clone(),
                key: STANDARD.decode(key)?,
            }
        } else if let Some(sas) = settings.get("sharedaccesssignature") {
            Credential::Sas(sas.trim_start_matches('?').to_string())
        } else {
            return Err(ClientError::MissingSetting(
                "AccountKey or SharedAccessSignature",
            ));
        };

        Ok(Self {
            blob_endpoint: parse_endpoint(&blob_endpoint)?,
            credential,
        })
    }

    fn development(proxy: Option<&String>) -> Result<Self> {
        let endpoint = match proxy {
            Some(proxy) => format!("{}:10000/{DEV_ACCOUNT}", proxy.trim_end_matches('/')),
            None => DEV_BLOB_ENDPOINT.to_string(),
        };
        Ok(Self {
            blob_endpoint: parse_endpoint(&endpoint)?,
            credential: Credential::SharedKey {
                account: DEV_ACCOUNT.to_string(),
                key: STANDARD.decode(DEV_ACCOUNT_KEY)?,
            },
        })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|_| ClientError::InvalidEndpoint(endpoint.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ClientError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(url)
}
