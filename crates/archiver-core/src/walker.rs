//! Archiver walker
//!
//! Depth-first, strictly sequential traversal of containers, virtual
//! directories and blobs. Every blob not already in the target tier is moved
//! into it; everything else is reported on the progress log.

use futures_util::TryStreamExt;
use futures_util::future::{BoxFuture, FutureExt};
use std::io::Write;
use tracing::{debug, info, warn};

use crate::backend::StorageBackend;
use crate::error::{Error, Result};
use crate::item::{BlobItem, ListScope, ListedItem};
use crate::progress::ProgressLog;
use crate::tier::AccessTier;

/// What a run does to the blobs it visits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TieringPolicy {
    pub target: AccessTier,
    /// Report a failed tier change and keep going instead of aborting the run.
    pub continue_on_error: bool,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub containers_processed: usize,
    pub containers_skipped: usize,
    pub directories_processed: usize,
    pub directories_skipped: usize,
    pub blobs_updated: usize,
    pub blobs_unchanged: usize,
    pub unknown_items: usize,
    pub failed_updates: usize,
}

pub struct Archiver<'b, B: ?Sized, W> {
    backend: &'b B,
    policy: TieringPolicy,
    progress: ProgressLog<W>,
    summary: RunSummary,
    /// Set once any listing of this run has returned data.
    reached: bool,
}

impl<'b, B, W> Archiver<'b, B, W>
where
    B: StorageBackend + ?Sized,
    W: Write + Send,
{
    pub fn new(backend: &'b B, policy: TieringPolicy, out: W) -> Self {
        Self {
            backend,
            policy,
            progress: ProgressLog::new(out),
            summary: RunSummary::default(),
            reached: false,
        }
    }

    /// Walk every container, or only `container_filter` when set.
    ///
    /// `directory_filter` gates the top level of each processed container
    /// only; everything below a matching directory is always traversed.
    pub async fn run(
        &mut self,
        container_filter: Option<&str>,
        directory_filter: Option<&str>,
    ) -> Result<RunSummary> {
        self.summary = RunSummary::default();
        self.reached = false;
        let backend = self.backend;
        let mut containers = backend.list_containers();

        while let Some(container) = containers
            .try_next()
            .await
            .map_err(|e| Error::listing("containers", e, !self.reached))?
        {
            self.reached = true;
            if container_filter.is_some_and(|filter| filter != container.name) {
                self.progress
                    .line(format_args!("Skipping /{} container", container.name))?;
                self.summary.containers_skipped += 1;
                continue;
            }

            self.progress
                .line(format_args!("Processing /{} container", container.name))?;
            self.summary.containers_processed += 1;
            info!(container = %container.name, "processing container");

            self.walk_level(
                ListScope::container(container.name),
                directory_filter.map(str::to_owned),
            )
            .await?;
        }

        Ok(self.summary.clone())
    }

    pub fn into_output(self) -> W {
        self.progress.into_inner()
    }

    fn walk_level(
        &mut self,
        scope: ListScope,
        directory_filter: Option<String>,
    ) -> BoxFuture<'_, Result<()>> {
        async move {
            let backend = self.backend;
            let mut items = backend.list_items(&scope);
            let mut had_new_line = false;

            while let Some(item) = items
                .try_next()
                .await
                .map_err(|e| Error::listing(scope.display_path(), e, !self.reached))?
            {
                self.reached = true;
                match item {
                    ListedItem::Directory(directory) => {
                        let wanted = directory_filter
                            .as_deref()
                            .is_none_or(|filter| directory.name() == filter);
                        if wanted {
                            self.progress.line(format_args!(
                                "Processing {} directory",
                                directory.display_path
                            ))?;
                            self.summary.directories_processed += 1;
                            self.walk_level(directory.scope(), None).await?;
                        } else {
                            self.progress.line(format_args!(
                                "Skipping {} directory",
                                directory.display_path
                            ))?;
                            self.summary.directories_skipped += 1;
                        }
                        had_new_line = true;
                    }
                    ListedItem::Blob(blob) => {
                        had_new_line = self.process_blob(&blob).await?;
                    }
                    ListedItem::Unknown(item) => {
                        warn!(kind = %item.kind, uri = %item.uri, "skipping item of unknown type");
                        self.progress.line(format_args!(
                            "Unknown item type {} for {}",
                            item.kind, item.uri
                        ))?;
                        self.summary.unknown_items += 1;
                        had_new_line = true;
                    }
                }
            }

            if !had_new_line {
                self.progress.line(format_args!("Done"))?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Returns whether a full line was written for this blob.
    async fn process_blob(&mut self, blob: &BlobItem) -> Result<bool> {
        let target = self.policy.target;
        if blob.tier == target {
            self.progress.marker()?;
            self.summary.blobs_unchanged += 1;
            return Ok(false);
        }

        self.progress.line(format_args!(
            "Updating {} blob tier to {}",
            blob.name, target
        ))?;
        debug!(
            container = %blob.container,
            blob = %blob.name,
            from = %blob.tier,
            to = %target,
            "changing blob tier"
        );

        match self.backend.set_tier(blob, target).await {
            Ok(()) => {
                self.summary.blobs_updated += 1;
                Ok(true)
            }
            Err(source) if self.policy.continue_on_error => {
                warn!(blob = %blob.name, error = %source, "tier change failed, continuing");
                self.progress.line(format_args!(
                    "Failed to update {} blob tier to {}: {}",
                    blob.name, target, source
                ))?;
                self.summary.failed_updates += 1;
                Ok(true)
            }
            Err(source) => Err(Error::TierChange {
                blob: format!("/{}/{}", blob.container, blob.name),
                tier: target,
                source,
            }),
        }
    }
}

/// Run one traversal, writing the progress log to `out`.
pub async fn run<B, W>(
    backend: &B,
    policy: TieringPolicy,
    container_filter: Option<&str>,
    directory_filter: Option<&str>,
    out: W,
) -> Result<RunSummary>
where
    B: StorageBackend + ?Sized,
    W: Write + Send,
{
    Archiver::new(backend, policy, out)
        .run(container_filter, directory_filter)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    async fn output_of(backend: &MemoryBackend, container: Option<&str>) -> String {
        let mut archiver = Archiver::new(backend, TieringPolicy::default(), Vec::new());
        archiver.run(container, None).await.unwrap();
        String::from_utf8(archiver.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_container_prints_done() {
        let backend = MemoryBackend::new().with_container("empty");
        let output = output_of(&backend, None).await;
        assert_eq!(output, "Processing /empty container\nDone\n");
    }

    #[tokio::test]
    async fn test_trailing_markers_end_with_done() {
        let backend = MemoryBackend::new()
            .with_blob("media", "a.jpg", AccessTier::Archive)
            .with_blob("media", "b.jpg", AccessTier::Archive);
        let output = output_of(&backend, None).await;
        assert_eq!(output, "Processing /media container\n..Done\n");
    }

    #[tokio::test]
    async fn test_marker_then_update_needs_no_done() {
        let backend = MemoryBackend::new()
            .with_blob("media", "a.jpg", AccessTier::Archive)
            .with_blob("media", "b.jpg", AccessTier::Hot);
        let output = output_of(&backend, None).await;
        assert_eq!(
            output,
            "Processing /media container\n.Updating b.jpg blob tier to Archive\n"
        );
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let backend = MemoryBackend::new()
            .with_blob("media", "a.jpg", AccessTier::Hot)
            .with_blob("media", "raw/b.cr2", AccessTier::Archive)
            .with_unknown("media", "disk.vhd", "PageBlob")
            .with_container("other");
        let summary = run(
            &backend,
            TieringPolicy::default(),
            Some("media"),
            None,
            std::io::sink(),
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                containers_processed: 1,
                containers_skipped: 1,
                directories_processed: 1,
                blobs_updated: 1,
                blobs_unchanged: 1,
                unknown_items: 1,
                ..RunSummary::default()
            }
        );
    }
}
