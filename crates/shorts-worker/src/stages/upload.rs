//! Upload stage.

use tracing::warn;

use shorts_models::{SubtitledVideo, UploadResult, VideoMetadata};
use shorts_services::VideoHost;

use crate::error::StageResult;

/// Upload the delivered video, then set its thumbnail if one exists.
///
/// Thumbnail failures are logged and ignored. On upload failure the video
/// stays in the output directory.
pub async fn upload_video(
    host: &dyn VideoHost,
    video: &SubtitledVideo,
    metadata: &VideoMetadata,
) -> StageResult<UploadResult> {
    let result = host.upload(&video.path, metadata).await?;

    if let Some(thumbnail) = &video.thumbnail_path {
        if let Err(e) = host.set_thumbnail(&result.video_id, thumbnail).await {
            warn!(video_id = %result.video_id, code = e.code(), "Could not set thumbnail: {}", e);
        }
    }
    Ok(result)
}
