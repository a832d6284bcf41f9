//! XML bodies returned by the Blob REST API

use serde::Deserialize;

use archiver_core::BackendError;

/// One page of a listing and the marker of the next one, if any.
#[derive(Debug)]
pub(crate) struct Page<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerEnumeration {
    #[serde(default)]
    containers: ContainerList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerList {
    #[serde(rename = "Container", default)]
    items: Vec<ContainerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobEnumeration {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "$value", default)]
    entries: Vec<BlobEntry>,
}

/// Entry of a delimited blob listing, in service order.
#[derive(Debug, Deserialize)]
pub(crate) enum BlobEntry {
    Blob(BlobXml),
    BlobPrefix(BlobPrefixXml),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BlobXml {
    pub name: String,
    #[serde(default)]
    pub properties: BlobProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BlobProperties {
    #[serde(default)]
    pub blob_type: String,
    #[serde(default)]
    pub access_tier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BlobPrefixXml {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

pub(crate) fn parse_container_page(body: &str) -> Result<Page<String>, BackendError> {
    let parsed: ContainerEnumeration = quick_xml::de::from_str(strip_bom(body))
        .map_err(|e| BackendError::Protocol(format!("invalid container listing: {e}")))?;
    Ok(Page {
        items: parsed.containers.items.into_iter().map(|c| c.name).collect(),
        next_marker: non_empty(parsed.next_marker),
    })
}

pub(crate) fn parse_blob_page(body: &str) -> Result<Page<BlobEntry>, BackendError> {
    let parsed: BlobEnumeration = quick_xml::de::from_str(strip_bom(body))
        .map_err(|e| BackendError::Protocol(format!("invalid blob listing: {e}")))?;
    Ok(Page {
        items: parsed.blobs.entries,
        next_marker: non_empty(parsed.next_marker),
    })
}

/// `Message` of an error body, when the body is one.
pub(crate) fn parse_error_message(body: &str) -> Option<String> {
    quick_xml::de::from_str::<ErrorBody>(strip_bom(body))
        .ok()
        .and_then(|e| non_empty(e.message))
}

fn strip_bom(body: &str) -> &str {
    body.trim_start_matches('\u{feff}')
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_page_with_marker() {
        let body = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <EnumerationResults ServiceEndpoint=\"https://acct.blob.core.windows.net/\">\
              <MaxResults>2</MaxResults>\
              <Containers>\
                <Container><Name>backups</Name><Properties><Etag>0x1</Etag></Properties></Container>\
                <Container><Name>logs</Name><Properties><Etag>0x2</Etag></Properties></Container>\
              </Containers>\
              <NextMarker>/acct/media</NextMarker>\
            </EnumerationResults>";

        let page = parse_container_page(body).unwrap();
        assert_eq!(page.items, vec!["backups", "logs"]);
        assert_eq!(page.next_marker.as_deref(), Some("/acct/media"));
    }

    #[test]
    fn test_last_container_page() {
        let body = "<EnumerationResults><Containers /><NextMarker /></EnumerationResults>";
        let page = parse_container_page(body).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_blob_page_keeps_service_order() {
        let body = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <EnumerationResults ServiceEndpoint=\"https://acct.blob.core.windows.net/\" ContainerName=\"media\">\
              <Prefix>raw/</Prefix>\
              <Delimiter>/</Delimiter>\
              <Blobs>\
                <Blob><Name>raw/a.cr2</Name><Properties><BlobType>BlockBlob</BlobType><AccessTier>Hot</AccessTier><AccessTierInferred>true</AccessTierInferred></Properties></Blob>\
                <BlobPrefix><Name>raw/2024/</Name></BlobPrefix>\
                <Blob><Name>raw/disk.vhd</Name><Properties><BlobType>PageBlob</BlobType></Properties></Blob>\
              </Blobs>\
              <NextMarker />\
            </EnumerationResults>";

        let page = parse_blob_page(body).unwrap();
        assert_eq!(page.next_marker, None);
        match &page.items[..] {
            [
                BlobEntry::Blob(first),
                BlobEntry::BlobPrefix(prefix),
                BlobEntry::Blob(last),
            ] => {
                assert_eq!(first.name, "raw/a.cr2");
                assert_eq!(first.properties.blob_type, "BlockBlob");
                assert_eq!(first.properties.access_tier.as_deref(), Some("Hot"));
                assert_eq!(prefix.name, "raw/2024/");
                assert_eq!(last.properties.blob_type, "PageBlob");
                assert_eq!(last.properties.access_tier, None);
            }
            other => panic!("unexpected entries: {other:?}"),
        }
    }

    #[test]
    fn test_empty_blob_page() {
        let body = "<EnumerationResults ContainerName=\"media\"><Blobs /><NextMarker /></EnumerationResults>";
        let page = parse_blob_page(body).unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_error_message() {
        let body = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <Error><Code>AuthenticationFailed</Code><Message>Signature did not match.</Message></Error>";
        assert_eq!(
            parse_error_message(body).as_deref(),
            Some("Signature did not match.")
        );
        assert_eq!(parse_error_message(""), None);
    }

    #[test]
    fn test_garbage_is_a_protocol_error() {
        assert!(matches!(
            parse_blob_page("<EnumerationResults><Blobs><Blob>"),
            Err(BackendError::Protocol(_))
        ));
    }
}
