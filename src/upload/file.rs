use std::fs;
use std::path::Path;

use crate::domain::TDError;
use super::{DEFAULT_IMAGE_TYPE, IMAGE_TYPE_PREFIX};

/// A file picked or dropped by the user, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    /// Declared MIME type, `None` when the platform could not tell.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    /// Reads `path` and declares its type from the file extension.
    pub fn read(path: &Path) -> Result<Self, TDError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TDError::FileNotFound,
            std::io::ErrorKind::PermissionDenied => TDError::PermissionDenied,
            _ => TDError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(TDError::LoadingFailed(format!("{} is not a file", path.display())));
        }
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(name, guess_content_type(path), bytes))
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|t| t.starts_with(IMAGE_TYPE_PREFIX))
    }

    pub fn effective_content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_IMAGE_TYPE)
    }
}

pub fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn content_type_follows_the_extension() {
        assert_eq!(guess_content_type(Path::new("beach.JPG")), Some("image/jpeg"));
        assert_eq!(guess_content_type(Path::new("a/b/leopard.webp")), Some("image/webp"));
        assert_eq!(guess_content_type(Path::new("notes.txt")), Some("text/plain"));
        assert_eq!(guess_content_type(Path::new("README")), None);
    }

    #[test]
    fn image_check_needs_a_declared_image_type() {
        assert!(LocalFile::new("a.png", Some("image/png"), vec![]).is_image());
        assert!(!LocalFile::new("a.txt", Some("text/plain"), vec![]).is_image());
        assert!(!LocalFile::new("a", None, vec![]).is_image());
        assert_eq!(LocalFile::new("a", Some(""), vec![]).effective_content_type(), DEFAULT_IMAGE_TYPE);
    }

    #[test]
    fn reading_a_file_from_disk() {
        let dir: PathBuf = std::env::temp_dir().join(format!("tourdesk-file-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("elephant.png");
        fs::write(&path, [137, 80, 78, 71]).unwrap();

        let file = LocalFile::read(&path).unwrap();
        assert_eq!(file.name, "elephant.png");
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert_eq!(file.bytes.len(), 4);

        assert!(matches!(LocalFile::read(&dir.join("missing.png")), Err(TDError::FileNotFound)));
        assert!(matches!(LocalFile::read(&dir), Err(TDError::LoadingFailed(_))));
        fs::remove_dir_all(&dir).unwrap();
    }
}
