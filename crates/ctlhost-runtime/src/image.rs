//! Makes sure the container image is available locally.

use std::io::Write;

use ctlhost_common::types::ImageReference;
use futures_util::StreamExt;

use crate::api::{ContainerRuntime, PullProgress};
use crate::error::{ProvisionError, Result};

/// How the image became available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// Already present; `matches` local images carry the reference.
    Present {
        /// Number of matching local images.
        matches: usize,
    },
    /// Pulled during this run.
    Pulled,
}

/// Lists local images by `reference` and pulls it when absent. The local
/// matches or the pull progress are written to `out`.
///
/// # Errors
///
/// Returns [`ProvisionError::ImagePull`] if listing or pulling fails.
pub async fn ensure_image<R: ContainerRuntime>(
    runtime: &R,
    reference: &ImageReference,
    out: &mut impl Write,
) -> Result<ImageStatus> {
    let pull_error = |source| ProvisionError::ImagePull {
        image: reference.to_string(),
        source,
    };

    let images = runtime.list_images(reference).await.map_err(pull_error)?;
    if !images.is_empty() {
        writeln!(out, "Found {} images", images.len()).map_err(ProvisionError::Output)?;
        for image in &images {
            tracing::info!(image = %reference, id = %image.id, tags = ?image.repo_tags, "image found locally");
            writeln!(
                out,
                "Found image with name {} and id {}",
                image.repo_tags.join(", "),
                image.id
            )
            .map_err(ProvisionError::Output)?;
        }
        writeln!(out, "Docker image is already present and ready to use, so it will not be pulled")
            .map_err(ProvisionError::Output)?;
        return Ok(ImageStatus::Present {
            matches: images.len(),
        });
    }

    tracing::info!(image = %reference, "image not found locally, pulling");
    writeln!(out, "Pulling image {reference}").map_err(ProvisionError::Output)?;
    let mut progress = runtime.pull_image(reference);
    while let Some(item) = progress.next().await {
        let line = render_progress(&item.map_err(pull_error)?);
        if !line.is_empty() {
            writeln!(out, "{line}").map_err(ProvisionError::Output)?;
        }
    }
    out.flush().map_err(ProvisionError::Output)?;
    tracing::info!(image = %reference, "image pulled");
    Ok(ImageStatus::Pulled)
}

fn render_progress(progress: &PullProgress) -> String {
    [&progress.id, &progress.status, &progress.progress]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeRuntime};

    #[test]
    fn progress_lines_skip_missing_parts() {
        let progress = PullProgress {
            id: Some("3f4ca61aafcd".into()),
            status: Some("Downloading".into()),
            progress: None,
        };
        assert_eq!(render_progress(&progress), "3f4ca61aafcd Downloading");
        assert_eq!(render_progress(&PullProgress::default()), "");
    }

    #[tokio::test]
    async fn present_image_is_not_pulled() {
        let runtime = FakeRuntime::new().with_local_image();
        let mut out = Vec::new();
        let status = ensure_image(&runtime, &ImageReference::new("img:1"), &mut out)
            .await
            .expect("ok");
        assert_eq!(status, ImageStatus::Present { matches: 1 });
        assert_eq!(runtime.count(&Call::PullImage), 0);
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "Found 1 images\n\
             Found image with name img:1 and id sha256:5d1c\n\
             Docker image is already present and ready to use, so it will not be pulled\n"
        );
    }

    #[tokio::test]
    async fn missing_image_is_pulled_with_progress() {
        let runtime = FakeRuntime::new();
        let mut out = Vec::new();
        let status = ensure_image(&runtime, &ImageReference::new("img:1"), &mut out)
            .await
            .expect("ok");
        assert_eq!(status, ImageStatus::Pulled);
        assert_eq!(runtime.count(&Call::PullImage), 1);
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.starts_with("Pulling image img:1\n"));
        assert!(printed.contains("Pull complete"));
    }

    #[tokio::test]
    async fn pull_failure_is_fatal() {
        let runtime = FakeRuntime::new().with_failing_pull();
        let err = ensure_image(&runtime, &ImageReference::new("img:1"), &mut Vec::new())
            .await
            .expect_err("pull fails");
        assert!(matches!(err, ProvisionError::ImagePull { .. }));
    }
}
