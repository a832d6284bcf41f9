use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, stream};
use std::future::Future;

use archiver_core::{
    AccessTier, BackendError, BlobItem, Container, ContainerStream, ItemStream, ListScope,
    StorageBackend,
};

use crate::client::BlobServiceClient;
use crate::model::Page;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Flatten a marker-paginated listing into one stream of items. The next
/// page is requested only once the current one has been consumed.
fn paginate<'a, T, F, Fut>(
    fetch: F,
) -> impl futures_util::Stream<Item = Result<T, BackendError>> + Send + 'a
where
    T: Send + 'a,
    F: Fn(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, BackendError>> + Send + 'a,
{
    stream::try_unfold((fetch, Cursor::Start), |(fetch, cursor)| async move {
        let marker = match cursor {
            Cursor::Start => None,
            Cursor::Next(marker) => Some(marker),
            Cursor::Done => return Ok(None),
        };
        let page = fetch(marker).await?;
        let next = match page.next_marker {
            Some(marker) => Cursor::Next(marker),
            None => Cursor::Done,
        };
        let items = stream::iter(page.items.into_iter().map(Ok::<T, BackendError>));
        Ok::<_, BackendError>(Some((items, (fetch, next))))
    })
    .try_flatten()
}

#[async_trait]
impl StorageBackend for BlobServiceClient {
    fn list_containers(&self) -> ContainerStream<'_> {
        paginate(move |marker| self.list_containers_page(marker))
            .map_ok(Container::new)
            .boxed()
    }

    fn list_items(&self, scope: &ListScope) -> ItemStream<'_> {
        let scope = scope.clone();
        paginate(move |marker| self.list_blobs_page(scope.clone(), marker)).boxed()
    }

    async fn set_tier(&self, blob: &BlobItem, tier: AccessTier) -> Result<(), BackendError> {
        self.set_blob_tier(blob, tier).await
    }
}
