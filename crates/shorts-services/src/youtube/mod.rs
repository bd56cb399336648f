//! YouTube uploader: OAuth installed-app flow plus resumable upload.

pub mod error;
pub mod oauth;
pub mod upload;

pub use error::{UploadError, YoutubeResult};
pub use oauth::{ClientSecrets, OAuthClient, OAuthConfig, Pkce, StoredToken};
pub use upload::{validate_video_file, YoutubeClient, YoutubeConfig};
