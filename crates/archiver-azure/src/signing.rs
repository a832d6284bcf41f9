//! Shared Key request signing

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::Request;
use reqwest::header::HeaderValue;
use sha2::Sha256;
use std::collections::BTreeMap;

use archiver_core::BackendError;

/// Standard headers in the order they appear in the string to sign.
const SIGNED_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

pub(crate) struct SharedKeySigner {
    account: String,
    key: Vec<u8>,
}

impl SharedKeySigner {
    pub fn new(account: String, key: Vec<u8>) -> Self {
        Self { account, key }
    }

    /// `Authorization` header value for a fully built request.
    pub fn authorization(&self, request: &Request) -> Result<HeaderValue, BackendError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|e| BackendError::Protocol(format!("cannot sign request: {e}")))?;
        mac.update(string_to_sign(&self.account, request).as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        HeaderValue::from_str(&format!("SharedKey {}:{}", self.account, signature))
            .map_err(|e| BackendError::Protocol(format!("cannot sign request: {e}")))
    }
}

pub(crate) fn string_to_sign(account: &str, request: &Request) -> String {
    let headers = request.headers();
    let mut out = String::new();
    out.push_str(request.method().as_str());
    out.push('\n');

    for name in SIGNED_HEADERS {
        let value = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        // Zero length is signed as empty.
        if !(name == "content-length" && value == "0") {
            out.push_str(value);
        }
        out.push('\n');
    }

    let mut ms_headers: Vec<(&str, &str)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| (name.as_str(), value.to_str().unwrap_or_default().trim()))
        .collect();
    ms_headers.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in ms_headers {
        out.push_str(name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }

    let url = request.url();
    out.push('/');
    out.push_str(account);
    out.push_str(url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push('\n');
        out.push_str(&name);
        out.push(':');
        out.push_str(&values.join(","));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, Url};

    fn request(method: Method, url: &str, headers: &[(&'static str, &str)]) -> Request {
        let mut request = Request::new(method, Url::parse(url).unwrap());
        for (name, value) in headers {
            request
                .headers_mut()
                .insert(*name, HeaderValue::from_str(value).unwrap());
        }
        request
    }

    #[test]
    fn test_list_blobs_string_to_sign() {
        let request = request(
            Method::GET,
            "https://acct.blob.core.windows.net/media?restype=container&comp=list&delimiter=%2F&prefix=raw%2F",
            &[
                ("x-ms-version", "2023-11-03"),
                ("x-ms-date", "Mon, 19 Oct 2026 10:00:00 GMT"),
            ],
        );

        assert_eq!(
            string_to_sign("acct", &request),
            "GET\n\n\n\n\n\n\n\n\n\n\n\n\
             x-ms-date:Mon, 19 Oct 2026 10:00:00 GMT\n\
             x-ms-version:2023-11-03\n\
             /acct/media\n\
             comp:list\n\
             delimiter:/\n\
             prefix:raw/\n\
             restype:container"
        );
    }

    #[test]
    fn test_zero_content_length_is_blank() {
        let request = request(
            Method::PUT,
            "https://acct.blob.core.windows.net/media/a%20b.jpg?comp=tier",
            &[("content-length", "0"), ("x-ms-access-tier", "Archive")],
        );

        assert_eq!(
            string_to_sign("acct", &request),
            "PUT\n\n\n\n\n\n\n\n\n\n\n\n\
             x-ms-access-tier:Archive\n\
             /acct/media/a%20b.jpg\n\
             comp:tier"
        );
    }

    #[test]
    fn test_authorization_header_shape() {
        let signer = SharedKeySigner::new("acct".to_string(), b"secret".to_vec());
        let request = request(Method::GET, "https://acct.blob.core.windows.net/?comp=list", &[]);

        let header = signer.authorization(&request).unwrap();
        let value = header.to_str().unwrap();
        assert!(value.starts_with("SharedKey acct:"));
        // base64 of a 32-byte HMAC-SHA256 digest
        assert_eq!(value.len(), "SharedKey acct:".len() + 44);
    }
}
