//! Pipeline stages, one module per [`shorts_models::Stage`].

pub mod images;
pub mod script;
pub mod subtitles;
pub mod upload;
pub mod video;
pub mod voice;

pub use images::fetch_images;
pub use script::generate_script;
pub use subtitles::add_subtitles;
pub use upload::upload_video;
pub use video::{compose_video, slideshow_spec};
pub use voice::synthesize_narration;
