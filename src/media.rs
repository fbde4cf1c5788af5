use std::path::Path;

/// Extensions processed as pictures (EXIF-bearing containers).
pub const PICTURE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions counted as videos. Video metadata is never touched.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// How a candidate file is handled by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Image whose metadata and file times get synchronized.
    Picture,
    /// Counted in the summary, otherwise skipped.
    Video,
    /// Not a media file.
    Other,
}

/// Classify a file by extension, case-insensitive.
pub fn classify(path: &Path) -> MediaKind {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return MediaKind::Other;
    };
    let ext = ext.to_ascii_lowercase();
    if PICTURE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Picture
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else {
        MediaKind::Other
    }
}
