//! Clients for the external services the shorts pipeline depends on.
//!
//! Every service sits behind one trait in [`traits`]:
//! - Gemini generates the script ([`TextGenerator`])
//! - Unsplash supplies stock images ([`ImageSearch`])
//! - VOICEVOX synthesizes narration ([`SpeechSynthesizer`])
//! - YouTube receives the finished video ([`VideoHost`])

pub mod error;
pub mod gemini;
pub mod retry;
pub mod traits;
pub mod unsplash;
pub mod voicevox;
pub mod youtube;

pub use error::{ServiceError, ServiceResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use retry::{retry_async, RetryConfig, Retryable};
pub use traits::{
    DownloadedImage, ImageCandidate, ImageSearch, Orientation, SpeechSynthesizer, TextGenerator,
    VideoHost, VoiceParams,
};
pub use unsplash::{UnsplashClient, UnsplashConfig};
pub use voicevox::{VoicevoxClient, VoicevoxConfig};
pub use youtube::{UploadError, YoutubeClient, YoutubeConfig, YoutubeResult};
