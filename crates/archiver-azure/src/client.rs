//! Blob service client
//!
//! Built once per process from a connection string; construction performs
//! no network call. Every request is signed (or carries the SAS token) and
//! runs under the configured retry policy.

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response, Url};
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::debug;

use archiver_core::item::DELIMITER;
use archiver_core::{
    AccessTier, BackendError, BlobItem, Directory, ListScope, ListedItem, UnknownItem,
};

use crate::connection::{ConnectionString, Credential};
use crate::error::Result;
use crate::model::{self, BlobEntry, Page};
use crate::retry::RetryPolicy;
use crate::signing::SharedKeySigner;

/// REST API version sent with every request.
pub const API_VERSION: &str = "2023-11-03";

const BLOCK_BLOB: &str = "BlockBlob";

/// Connection-level tuning for many small sequential requests against one
/// endpoint. The client never sends `Expect: 100-continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Disable Nagle's algorithm so small requests are not delayed.
    pub tcp_nodelay: bool,
    /// Upper bound on idle pooled connections per host, lower than reqwest's
    /// unbounded default. Active connections are never capped.
    pub max_idle_per_host: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            max_idle_per_host: 1000,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub retry: RetryPolicy,
    pub transport: TransportOptions,
}

enum Auth {
    SharedKey(SharedKeySigner),
    Sas(String),
}

pub struct BlobServiceClient {
    http: reqwest::Client,
    endpoint: Url,
    auth: Auth,
    retry: RetryPolicy,
}

impl fmt::Debug for BlobServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobServiceClient<{}>", self.endpoint)
    }
}

impl BlobServiceClient {
    /// Parse `connection_string` and build a configured client.
    pub fn new(connection_string: &str, options: ClientOptions) -> Result<Self> {
        Self::from_connection(ConnectionString::parse(connection_string)?, options)
    }

    pub fn from_connection(connection: ConnectionString, options: ClientOptions) -> Result<Self> {
        let transport = options.transport;
        let http = reqwest::Client::builder()
            .tcp_nodelay(transport.tcp_nodelay)
            .pool_max_idle_per_host(transport.max_idle_per_host)
            .connect_timeout(transport.connect_timeout)
            .timeout(transport.request_timeout)
            .user_agent(concat!("archiver/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let auth = match connection.credential {
            Credential::SharedKey { account, key } => {
                Auth::SharedKey(SharedKeySigner::new(account, key))
            }
            Credential::Sas(token) => Auth::Sas(token),
        };

        Ok(Self {
            http,
            endpoint: connection.blob_endpoint,
            auth,
            retry: options.retry,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub(crate) async fn list_containers_page(
        &self,
        marker: Option<String>,
    ) -> std::result::Result<Page<String>, BackendError> {
        let mut url = self.service_url();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("comp", "list");
            if let Some(marker) = &marker {
                query.append_pair("marker", marker);
            }
        }

        debug!(marker = ?marker, "listing containers");
        let body = self.execute(Method::GET, url, &[]).await?;
        model::parse_container_page(&body)
    }

    pub(crate) async fn list_blobs_page(
        &self,
        scope: ListScope,
        marker: Option<String>,
    ) -> std::result::Result<Page<ListedItem>, BackendError> {
        let mut url = self.container_url(&scope.container);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("delimiter", DELIMITER.encode_utf8(&mut [0; 4]));
            if let Some(prefix) = &scope.prefix {
                query.append_pair("prefix", prefix);
            }
            if let Some(marker) = &marker {
                query.append_pair("marker", marker);
            }
        }

        debug!(container = %scope.container, prefix = ?scope.prefix, marker = ?marker, "listing blobs");
        let body = self.execute(Method::GET, url, &[]).await?;
        let page = model::parse_blob_page(&body)?;

        Ok(Page {
            items: page
                .items
                .into_iter()
                .map(|entry| self.listed_item(&scope.container, entry))
                .collect(),
            next_marker: page.next_marker,
        })
    }

    pub(crate) async fn set_blob_tier(
        &self,
        blob: &BlobItem,
        tier: AccessTier,
    ) -> std::result::Result<(), BackendError> {
        let mut url = self.blob_url(&blob.container, &blob.name);
        url.query_pairs_mut().append_pair("comp", "tier");

        debug!(container = %blob.container, blob = %blob.name, tier = %tier, "setting blob tier");
        let headers = [("x-ms-access-tier", tier.as_str()), ("content-length", "0")];
        self.execute(Method::PUT, url, &headers).await?;
        Ok(())
    }

    fn listed_item(&self, container: &str, entry: BlobEntry) -> ListedItem {
        match entry {
            BlobEntry::BlobPrefix(prefix) => ListedItem::Directory(Directory {
                container: container.to_string(),
                display_path: format!("/{container}/{}", prefix.name),
                prefix: prefix.name,
            }),
            BlobEntry::Blob(blob) if blob.properties.blob_type == BLOCK_BLOB => {
                ListedItem::Blob(BlobItem {
                    container: container.to_string(),
                    tier: blob
                        .properties
                        .access_tier
                        .as_deref()
                        .map_or(AccessTier::Unknown, AccessTier::from_service),
                    name: blob.name,
                })
            }
            BlobEntry::Blob(blob) => ListedItem::Unknown(UnknownItem {
                uri: self.blob_url(container, &blob.name).to_string(),
                kind: blob.properties.blob_type,
            }),
        }
    }

    /// Account-level URL, always ending in `/`.
    fn service_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if !url.path().ends_with('/') {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.push("");
            }
        }
        url
    }

    fn container_url(&self, container: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(container);
        }
        url
    }

    fn blob_url(&self, container: &str, name: &str) -> Url {
        let mut url = self.container_url(container);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(name.split(DELIMITER));
        }
        url
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        headers: &[(&str, &str)],
    ) -> std::result::Result<String, BackendError> {
        let operation = format!("{method} {}", url.path());
        self.retry
            .run(&operation, || {
                self.execute_once(method.clone(), url.clone(), headers)
            })
            .await
    }

    async fn execute_once(
        &self,
        method: Method,
        mut url: Url,
        headers: &[(&str, &str)],
    ) -> std::result::Result<String, BackendError> {
        if let Auth::Sas(token) = &self.auth {
            let query = match url.query() {
                Some(query) if !query.is_empty() => format!("{query}&{token}"),
                _ => token.clone(),
            };
            url.set_query(Some(&query));
        }

        let mut builder = self
            .http
            .request(method, url)
            .header("x-ms-date", http_date()?)
            .header("x-ms-version", API_VERSION);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut request = builder.build().map_err(transport_error)?;

        if let Auth::SharedKey(signer) = &self.auth {
            let authorization = signer.authorization(&request)?;
            request.headers_mut().insert(AUTHORIZATION, authorization);
        }

        let response = self.http.execute(request).await.map_err(transport_error)?;
        read_response(response).await
    }
}

async fn read_response(response: Response) -> std::result::Result<String, BackendError> {
    let status = response.status();
    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        return Ok(body);
    }

    let message = model::parse_error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    let code = code.unwrap_or_else(|| status.as_str().to_string());

    if matches!(status.as_u16(), 401 | 403) {
        Err(BackendError::Unauthorized {
            status: status.as_u16(),
            message: format!("{code}: {message}"),
        })
    } else {
        Err(BackendError::Service {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

/// URLs are stripped so SAS tokens never reach logs or error messages.
fn transport_error(err: reqwest::Error) -> BackendError {
    let err = err.without_url();
    if err.is_builder() || err.is_decode() {
        BackendError::Protocol(err.to_string())
    } else {
        BackendError::Unreachable(err.to_string())
    }
}

fn http_date() -> std::result::Result<String, BackendError> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    OffsetDateTime::now_utc()
        .format(format)
        .map_err(|e| BackendError::Protocol(format!("cannot format request date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(connection_string: &str) -> BlobServiceClient {
        BlobServiceClient::new(connection_string, ClientOptions::default()).unwrap()
    }

    #[test]
    fn test_urls_for_cloud_endpoint() {
        let client = client("AccountName=acct;AccountKey=a2V5");
        assert_eq!(
            client.service_url().as_str(),
            "https://acct.blob.core.windows.net/"
        );
        assert_eq!(
            client.container_url("media").as_str(),
            "https://acct.blob.core.windows.net/media"
        );
        assert_eq!(
            client.blob_url("media", "raw/2024/a b.jpg").as_str(),
            "https://acct.blob.core.windows.net/media/raw/2024/a%20b.jpg"
        );
    }

    #[test]
    fn test_urls_for_path_style_endpoint() {
        let client = client("UseDevelopmentStorage=true");
        assert_eq!(
            client.service_url().as_str(),
            "http://127.0.0.1:10000/devstoreaccount1/"
        );
        assert_eq!(
            client.blob_url("media", "a.jpg").as_str(),
            "http://127.0.0.1:10000/devstoreaccount1/media/a.jpg"
        );
    }

    #[test]
    fn test_listed_items_are_classified() {
        let client = client("AccountName=acct;AccountKey=a2V5");
        let body = "<EnumerationResults><Blobs>\
            <BlobPrefix><Name>raw/</Name></BlobPrefix>\
            <Blob><Name>a.jpg</Name><Properties><BlobType>BlockBlob</BlobType><AccessTier>Cool</AccessTier></Properties></Blob>\
            <Blob><Name>b.jpg</Name><Properties><BlobType>BlockBlob</BlobType></Properties></Blob>\
            <Blob><Name>log.txt</Name><Properties><BlobType>AppendBlob</BlobType></Properties></Blob>\
            </Blobs><NextMarker /></EnumerationResults>";

        let items: Vec<ListedItem> = model::parse_blob_page(body)
            .unwrap()
            .items
            .into_iter()
            .map(|entry| client.listed_item("media", entry))
            .collect();

        assert_eq!(
            items,
            vec![
                ListedItem::Directory(Directory {
                    container: "media".to_string(),
                    prefix: "raw/".to_string(),
                    display_path: "/media/raw/".to_string(),
                }),
                ListedItem::Blob(BlobItem {
                    container: "media".to_string(),
                    name: "a.jpg".to_string(),
                    tier: AccessTier::Cool,
                }),
                ListedItem::Blob(BlobItem {
                    container: "media".to_string(),
                    name: "b.jpg".to_string(),
                    tier: AccessTier::Unknown,
                }),
                ListedItem::Unknown(UnknownItem {
                    kind: "AppendBlob".to_string(),
                    uri: "https://acct.blob.core.windows.net/media/log.txt".to_string(),
                }),
            ]
        );
    }

    #[test]
    fn test_default_transport_options() {
        let transport = TransportOptions::default();
        assert!(transport.tcp_nodelay);
        assert_eq!(transport.max_idle_per_host, 1000);
        assert_eq!(transport.connect_timeout, Duration::from_secs(10));
        assert_eq!(transport.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_http_date_shape() {
        let date = http_date().unwrap();
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.len(), "Mon, 19 Oct 2026 10:00:00 GMT".len());
    }
}
