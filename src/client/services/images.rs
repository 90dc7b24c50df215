use std::path::{Path, PathBuf};

use chrono::Utc;
use image::ImageFormat;

use crate::client::services::conversation::{self, SharedConversation};
use crate::client::session::ChatSession;
use crate::common::codes;
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::{ChatMessage, NewMessage};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// A picked file, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    pub async fn from_path(path: &Path) -> ChatResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self { name, bytes })
    }

    /// Format sniffed from the content, not from the file name.
    pub fn format(&self) -> Option<ImageFormat> {
        image::guess_format(&self.bytes).ok()
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        self.format().map(|f| f.to_mime_type())
    }

    fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| !e.is_empty())
            .or_else(|| {
                self.format()
                    .and_then(|f| f.extensions_str().first().map(|e| e.to_string()))
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// Result of a successful upload, waiting for the caption step.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub path: String,
    pub public_url: String,
    pub mime_type: &'static str,
}

/// Checks presence, size and sniffed type. Returns the MIME type.
pub fn validate(file: Option<&ImageFile>) -> ChatResult<&'static str> {
    let file = file.ok_or_else(|| ChatError::validation("No file selected"))?;
    if file.bytes.len() > MAX_IMAGE_BYTES {
        return Err(ChatError::validation("File too large (max 5MB)"));
    }
    match file.mime_type() {
        Some(mime) if ALLOWED_MIME_TYPES.contains(&mime) => Ok(mime),
        _ => Err(ChatError::validation("Invalid file type. Use JPG, PNG, GIF, or WebP")),
    }
}

/// `<unix millis>_<6 base36 chars>.<ext>`
pub fn object_name(file: &ImageFile) -> String {
    format!(
        "{}_{}.{}",
        Utc::now().timestamp_millis(),
        codes::random_base36(6),
        file.extension()
    )
}

pub async fn upload_image(session: &ChatSession, file: Option<ImageFile>) -> ChatResult<UploadedImage> {
    let mime_type = validate(file.as_ref())?;
    let Some(file) = file else {
        return Err(ChatError::validation("No file selected"));
    };
    let path = format!("{}/{}", session.user_id(), object_name(&file));
    let size = file.bytes.len();
    session.backend().upload_object(&path, file.bytes, mime_type).await?;
    let public_url = session.backend().public_url(&path);
    log::info!("[IMAGES] uploaded {} ({} bytes, {})", path, size, mime_type);
    Ok(UploadedImage { path, public_url, mime_type })
}

/// Posts an uploaded image to the active conversation.
pub async fn send_image_message(
    conv: &SharedConversation,
    session: &ChatSession,
    uploaded: &UploadedImage,
    caption: &str,
) -> ChatResult<ChatMessage> {
    let target = conversation::active_target(conv).await?;
    let message = NewMessage::image(session.user_id(), target, uploaded.public_url.clone(), caption.trim());
    conversation::post(conv, session, message).await
}

/// Writes a viewed image to `<dir>/image_<unix millis>.<ext>`. The extension
/// follows the sniffed format, `jpg` when the bytes are not recognised.
pub async fn save_image(dir: &Path, bytes: &[u8]) -> ChatResult<PathBuf> {
    let ext = image::guess_format(bytes)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("jpg");
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("image_{}.{}", Utc::now().timestamp_millis(), ext));
    tokio::fs::write(&path, bytes).await?;
    log::info!("[IMAGES] saved {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[tokio::test]
    async fn saved_image_keeps_bytes_and_sniffed_extension() {
        let dir = std::env::temp_dir().join(format!("quickchat-save-{}", uuid::Uuid::new_v4()));
        let path = save_image(&dir, PNG_MAGIC).await.unwrap();
        assert_eq!(path.parent(), Some(dir.as_path()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("image_") && name.ends_with(".png"), "{}", name);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), PNG_MAGIC);

        let other = save_image(&dir, b"not an image").await.unwrap();
        assert_eq!(other.extension().unwrap(), "jpg");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn accepts_sniffed_png_regardless_of_name() {
        let file = ImageFile::new("holiday.txt", PNG_MAGIC.to_vec());
        assert_eq!(validate(Some(&file)).unwrap(), "image/png");
    }

    #[test]
    fn rejects_missing_oversized_and_wrong_type() {
        assert_eq!(validate(None).unwrap_err().to_string(), "No file selected");

        let mut big = PNG_MAGIC.to_vec();
        big.resize(MAX_IMAGE_BYTES + 1, 0);
        let err = validate(Some(&ImageFile::new("big.png", big))).unwrap_err();
        assert_eq!(err.to_string(), "File too large (max 5MB)");

        let text = ImageFile::new("notes.png", b"just some text".to_vec());
        assert!(validate(Some(&text)).is_err());
        let bmp = ImageFile::new("old.bmp", b"BM\0\0\0\0\0\0\0\0".to_vec());
        assert!(validate(Some(&bmp)).is_err());
    }

    #[test]
    fn exactly_five_mib_is_allowed() {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.resize(MAX_IMAGE_BYTES, 0);
        assert!(validate(Some(&ImageFile::new("a.png", bytes))).is_ok());
    }

    #[test]
    fn object_name_keeps_extension() {
        let name = object_name(&ImageFile::new("Cat.JPG", vec![]));
        let (stamp, rest) = name.split_once('_').unwrap();
        assert!(stamp.parse::<i64>().is_ok());
        assert_eq!(rest.len(), "abcdef.jpg".len());
        assert!(rest.ends_with(".jpg"));

        let sniffed = object_name(&ImageFile::new("clipboard", PNG_MAGIC.to_vec()));
        assert!(sniffed.ends_with(".png"));
    }
}
