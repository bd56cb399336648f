//! Image stage: keywords to a bounded, deduplicated, validated image set.
//!
//! Keywords are searched in order. Candidates are downloaded with bounded
//! concurrency but consumed in candidate order, so the same search results
//! always produce the same set. Bad candidates are skipped, never fatal.

use std::collections::HashSet;
use std::path::Path;

use futures::stream::{self, StreamExt};
use image::ImageFormat;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use shorts_models::{ImageArtifact, ImageSet};
use shorts_services::{DownloadedImage, ImageCandidate, ImageSearch, Orientation, ServiceError};

use crate::config::ImageSettings;
use crate::error::{StageError, StageResult};
use crate::metrics;

/// Why a candidate was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    DuplicateSource,
    DuplicateContent,
    Download,
    ContentType,
    Undecodable,
    UnsupportedFormat,
    TooFewBytes,
    TooSmall,
    AspectRatio,
}

impl Rejection {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::DuplicateSource => "duplicate_source",
            Rejection::DuplicateContent => "duplicate_content",
            Rejection::Download => "download_error",
            Rejection::ContentType => "content_type",
            Rejection::Undecodable => "undecodable",
            Rejection::UnsupportedFormat => "unsupported_format",
            Rejection::TooFewBytes => "too_few_bytes",
            Rejection::TooSmall => "too_small",
            Rejection::AspectRatio => "aspect_ratio",
        }
    }
}

/// Decoded facts about an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedImage {
    pub width: u32,
    pub height: u32,
    pub extension: &'static str,
}

/// Validate downloaded bytes.
pub fn check_image(
    bytes: &[u8],
    content_type: Option<&str>,
    settings: &ImageSettings,
) -> Result<CheckedImage, Rejection> {
    if let Some(ct) = content_type {
        if !ct.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(Rejection::ContentType);
        }
    }
    if (bytes.len() as u64) < settings.min_bytes {
        return Err(Rejection::TooFewBytes);
    }

    let format = image::guess_format(bytes).map_err(|_| Rejection::Undecodable)?;
    let extension = match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        _ => return Err(Rejection::UnsupportedFormat),
    };
    let decoded =
        image::load_from_memory_with_format(bytes, format).map_err(|_| Rejection::Undecodable)?;
    let (width, height) = (decoded.width(), decoded.height());

    if width < settings.min_width || height < settings.min_height {
        return Err(Rejection::TooSmall);
    }
    let aspect = width as f64 / height as f64;
    if aspect < settings.min_aspect || aspect > settings.max_aspect {
        return Err(Rejection::AspectRatio);
    }

    Ok(CheckedImage {
        width,
        height,
        extension,
    })
}

struct Collector<'a> {
    settings: &'a ImageSettings,
    dir: &'a Path,
    seen_sources: HashSet<String>,
    seen_content: HashSet<Vec<u8>>,
    images: Vec<ImageArtifact>,
    searches_ok: usize,
    last_search_error: Option<ServiceError>,
}

impl<'a> Collector<'a> {
    fn new(settings: &'a ImageSettings, dir: &'a Path) -> Self {
        Self {
            settings,
            dir,
            seen_sources: HashSet::new(),
            seen_content: HashSet::new(),
            images: Vec::new(),
            searches_ok: 0,
            last_search_error: None,
        }
    }

    fn is_full(&self) -> bool {
        self.images.len() >= self.settings.max_images
    }

    fn reject(&self, candidate: &ImageCandidate, rejection: Rejection) {
        debug!(id = %candidate.id, reason = rejection.reason(), "Skipping image candidate");
        metrics::record_image_rejected(rejection.reason());
    }

    /// Mark id and URL as seen. Returns false for a duplicate.
    fn claim_source(&mut self, candidate: &ImageCandidate) -> bool {
        let id_new = self.seen_sources.insert(format!("id:{}", candidate.id));
        let url_new = self.seen_sources.insert(format!("url:{}", candidate.url));
        id_new && url_new
    }

    async fn collect_query(
        &mut self,
        search: &dyn ImageSearch,
        query: &str,
        orientation: Orientation,
    ) -> StageResult<()> {
        if self.is_full() {
            return Ok(());
        }

        let candidates = match search.search(query, self.settings.per_page, orientation).await {
            Ok(c) => {
                self.searches_ok += 1;
                c
            }
            Err(e) => {
                warn!(query, "Image search failed: {}", e);
                self.last_search_error = Some(e);
                return Ok(());
            }
        };
        debug!(query, candidates = candidates.len(), "Image search results");

        let mut fresh = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.claim_source(&candidate) {
                fresh.push(candidate);
            } else {
                self.reject(&candidate, Rejection::DuplicateSource);
            }
        }

        let mut downloads = stream::iter(fresh)
            .map(|candidate| async move {
                let result = search.download(&candidate).await;
                (candidate, result)
            })
            .buffered(self.settings.download_parallel.max(1));

        while let Some((candidate, result)) = downloads.next().await {
            if self.is_full() {
                break;
            }
            match result {
                Ok(downloaded) => self.accept(&candidate, downloaded).await?,
                Err(e) => {
                    debug!(id = %candidate.id, "Download failed: {}", e);
                    self.reject(&candidate, Rejection::Download);
                }
            }
        }
        Ok(())
    }

    async fn accept(
        &mut self,
        candidate: &ImageCandidate,
        downloaded: DownloadedImage,
    ) -> StageResult<()> {
        let digest = Sha256::digest(&downloaded.bytes).to_vec();
        if self.seen_content.contains(&digest) {
            self.reject(candidate, Rejection::DuplicateContent);
            return Ok(());
        }

        let settings = self.settings.clone();
        let DownloadedImage {
            bytes,
            content_type,
        } = downloaded;
        let (bytes, checked) = tokio::task::spawn_blocking(move || {
            let checked = check_image(&bytes, content_type.as_deref(), &settings);
            (bytes, checked)
        })
        .await
        .map_err(|e| StageError::Io(std::io::Error::other(e)))?;

        let checked = match checked {
            Ok(c) => c,
            Err(rejection) => {
                self.reject(candidate, rejection);
                return Ok(());
            }
        };

        let index = self.images.len() + 1;
        let path = self
            .dir
            .join(format!("image_{:02}.{}", index, checked.extension));
        tokio::fs::write(&path, &bytes).await?;
        self.seen_content.insert(digest);

        debug!(id = %candidate.id, path = %path.display(), "Accepted image");
        self.images.push(ImageArtifact {
            path,
            source_id: candidate.id.clone(),
            width: checked.width,
            height: checked.height,
            bytes: bytes.len() as u64,
        });
        Ok(())
    }
}

/// Search, download and validate images for `keywords`.
///
/// Never returns an empty set: zero usable images is an integrity failure,
/// or the last search error when no search succeeded at all.
pub async fn fetch_images(
    search: &dyn ImageSearch,
    keywords: &[String],
    settings: &ImageSettings,
    orientation: Orientation,
    dir: &Path,
) -> StageResult<ImageSet> {
    let mut collector = Collector::new(settings, dir);

    for keyword in keywords {
        if collector.is_full() {
            break;
        }
        collector.collect_query(search, keyword, orientation).await?;
    }

    if collector.images.len() < settings.min_images && !settings.fallback_query.is_empty() {
        info!(
            found = collector.images.len(),
            min = settings.min_images,
            query = %settings.fallback_query,
            "Too few images, trying fallback query"
        );
        collector
            .collect_query(search, &settings.fallback_query, orientation)
            .await?;
    }

    if collector.images.is_empty() {
        if collector.searches_ok == 0 {
            if let Some(e) = collector.last_search_error {
                return Err(StageError::Service(e));
            }
        }
        return Err(StageError::integrity(format!(
            "no usable images found for keywords {:?}",
            keywords
        )));
    }

    info!(count = collector.images.len(), "Images ready");
    Ok(ImageSet(collector.images))
}
