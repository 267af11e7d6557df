use std::path::Path;
use std::sync::Arc;

/// Texture data bound to a source node: an uploaded file or a stored URL.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    File(FileAsset),
    Url(String),
}

#[derive(Debug, Clone)]
pub struct FileAsset {
    pub name: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
}

impl PartialEq for FileAsset {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.content_type == other.content_type
            && (Arc::ptr_eq(&self.bytes, &other.bytes) || self.bytes == other.bytes)
    }
}

impl Asset {
    pub fn file(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Asset::File(FileAsset {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        })
    }

    pub fn url(url: impl Into<String>) -> Self {
        Asset::Url(url.into())
    }

    /// Reads a texture from disk, guessing the content type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "texture".to_string());
        let content_type = content_type_for(&name);
        Ok(Asset::file(name, content_type, bytes))
    }

    /// Short human-readable label (file name or URL).
    pub fn label(&self) -> &str {
        match self {
            Asset::File(file) => &file.name,
            Asset::Url(url) => url,
        }
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            Asset::File(_) => None,
            Asset::Url(url) => Some(url),
        }
    }
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tga" => "image/x-tga",
        "exr" => "image/x-exr",
        _ => "application/octet-stream",
    }
}
