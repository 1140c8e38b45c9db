use image::{DynamicImage, ImageReader, Limits};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::application::ports::ImageFetchPort;
use crate::domain::{
    errors::{DomainError, DomainResult},
    image::{color_mode, CanonicalImage, ImageInfo, SourceType, ALLOWED_EXTENSIONS},
};

pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// A file received through a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Where the image of a request comes from. Each variant carries only what
/// that path needs; a missing file or URL is represented explicitly so the
/// resolver can report it.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Upload(Option<UploadedFile>),
    Url(Option<String>),
    Bitmap(DynamicImage),
}

impl ImageSource {
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Upload(_) => SourceType::Upload,
            Self::Url(_) => SourceType::Url,
            Self::Bitmap(_) => SourceType::Bitmap,
        }
    }

    /// Checks that need no I/O: the file or URL is present and an upload has
    /// an allowed name and type. Decoding and fetching come later.
    pub fn precheck(&self) -> DomainResult<()> {
        match self {
            Self::Upload(None) => Err(DomainError::NoFileProvided),
            Self::Upload(Some(file)) => validate_upload(file),
            Self::Url(url) => non_blank(url).map(|_| ()).ok_or(DomainError::MissingImageUrl),
            Self::Bitmap(_) => Ok(()),
        }
    }
}

fn non_blank(url: &Option<String>) -> Option<&str> {
    url.as_deref().map(str::trim).filter(|u| !u.is_empty())
}

/// Turns any [`ImageSource`] into a [`CanonicalImage`] plus its [`ImageInfo`].
#[derive(Clone)]
pub struct ImageResolver {
    fetcher: Arc<dyn ImageFetchPort>,
    max_dimension: u32,
}

impl ImageResolver {
    pub fn new(fetcher: Arc<dyn ImageFetchPort>) -> Self {
        Self { fetcher, max_dimension: DEFAULT_MAX_DIMENSION }
    }

    /// Images wider or taller than this fail to decode.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub async fn resolve(&self, source: ImageSource) -> DomainResult<(CanonicalImage, ImageInfo)> {
        let source_type = source.source_type();
        source.precheck()?;
        match source {
            ImageSource::Upload(None) => Err(DomainError::NoFileProvided),
            ImageSource::Upload(Some(file)) => {
                debug!(filename = %file.filename, bytes = file.bytes.len(), "decoding upload");
                self.decode(file.bytes, source_type).await
            }
            ImageSource::Url(url) => {
                let url = non_blank(&url).ok_or(DomainError::MissingImageUrl)?.to_string();
                let bytes = self.fetcher.fetch(&url).await?;
                debug!(%url, bytes = bytes.len(), "decoding fetched image");
                self.decode(bytes, source_type).await
            }
            ImageSource::Bitmap(img) => canonicalize(img, source_type, None),
        }
    }

    /// Shared decode path for every byte-based source.
    async fn decode(
        &self,
        bytes: Vec<u8>,
        source_type: SourceType,
    ) -> DomainResult<(CanonicalImage, ImageInfo)> {
        let max_dimension = self.max_dimension;
        tokio::task::spawn_blocking(move || {
            let (img, format) = decode_bytes(&bytes, max_dimension)?;
            canonicalize(img, source_type, format)
        })
        .await
        .map_err(|e| DomainError::Internal(format!("decode task failed: {e}")))?
    }
}

fn validate_upload(file: &UploadedFile) -> DomainResult<()> {
    let filename = file.filename.trim();
    if filename.is_empty() {
        return Err(DomainError::EmptyFileName);
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| DomainError::UnsupportedFileType(format!("{filename} has no extension")))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(DomainError::UnsupportedFileType(ext));
    }

    if let Some(ct) = file.content_type.as_deref() {
        let ct = ct.to_ascii_lowercase();
        if !(ct.starts_with("image/") || ct == "application/octet-stream") {
            return Err(DomainError::UnsupportedFileType(ct));
        }
    }
    Ok(())
}

/// Decodes a complete image or fails; truncated or oversized data is never
/// returned as a partial image.
pub fn decode_bytes(
    bytes: &[u8],
    max_dimension: u32,
) -> DomainResult<(DynamicImage, Option<String>)> {
    if bytes.is_empty() {
        return Err(DomainError::DecodeFailed("empty image data".into()));
    }
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DomainError::DecodeFailed(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| DomainError::DecodeFailed("unrecognised image format".into()))?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    reader.limits(limits);

    let img = reader
        .decode()
        .map_err(|e| DomainError::DecodeFailed(e.to_string()))?;
    let name = format.extensions_str().first().map(|s| s.to_string());
    Ok((img, name))
}

fn canonicalize(
    img: DynamicImage,
    source_type: SourceType,
    format: Option<String>,
) -> DomainResult<(CanonicalImage, ImageInfo)> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(DomainError::DecodeFailed("image has zero dimensions".into()));
    }
    let mode = color_mode(img.color()).to_string();
    let rgb = match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    };
    let info = ImageInfo { width, height, mode, source_type, format };
    Ok((CanonicalImage::new(rgb), info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{ImageFormat, RgbaImage};

    struct StaticFetcher(DomainResult<Vec<u8>>);

    #[async_trait]
    impl ImageFetchPort for StaticFetcher {
        async fn fetch(&self, _url: &str) -> DomainResult<Vec<u8>> {
            match &self.0 {
                Ok(b) => Ok(b.clone()),
                Err(_) => Err(DomainError::FetchFailed("timed out".into())),
            }
        }
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 128])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn resolver(fetched: DomainResult<Vec<u8>>) -> ImageResolver {
        ImageResolver::new(Arc::new(StaticFetcher(fetched)))
    }

    fn upload(name: &str, bytes: Vec<u8>) -> ImageSource {
        ImageSource::Upload(Some(UploadedFile {
            filename: name.into(),
            content_type: Some("image/png".into()),
            bytes,
        }))
    }

    #[tokio::test]
    async fn upload_is_decoded_to_rgb() {
        let (img, info) = resolver(Ok(vec![])).resolve(upload("a.PNG", png_bytes(8, 4))).await.unwrap();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(info.width, 8);
        assert_eq!(info.height, 4);
        assert_eq!(info.mode, "RGBA");
        assert_eq!(info.source_type, SourceType::Upload);
        assert_eq!(info.format.as_deref(), Some("png"));
        assert_eq!(img.rgb().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[tokio::test]
    async fn upload_validation_errors() {
        let r = resolver(Ok(vec![]));
        assert!(matches!(r.resolve(ImageSource::Upload(None)).await, Err(DomainError::NoFileProvided)));
        assert!(matches!(r.resolve(upload("  ", png_bytes(2, 2))).await, Err(DomainError::EmptyFileName)));
        assert!(matches!(
            r.resolve(upload("notes.txt", png_bytes(2, 2))).await,
            Err(DomainError::UnsupportedFileType(_))
        ));
        assert!(matches!(
            r.resolve(upload("noext", png_bytes(2, 2))).await,
            Err(DomainError::UnsupportedFileType(_))
        ));
        let wrong_type = ImageSource::Upload(Some(UploadedFile {
            filename: "a.png".into(),
            content_type: Some("text/html".into()),
            bytes: png_bytes(2, 2),
        }));
        assert!(matches!(r.resolve(wrong_type).await, Err(DomainError::UnsupportedFileType(_))));
    }

    #[test]
    fn precheck_needs_no_io() {
        assert!(matches!(ImageSource::Upload(None).precheck(), Err(DomainError::NoFileProvided)));
        assert!(matches!(upload("", vec![]).precheck(), Err(DomainError::EmptyFileName)));
        assert!(matches!(upload("a.exe", vec![]).precheck(), Err(DomainError::UnsupportedFileType(_))));
        assert!(matches!(ImageSource::Url(Some(" ".into())).precheck(), Err(DomainError::MissingImageUrl)));
        // bytes are not looked at yet
        assert!(upload("a.png", b"garbage".to_vec()).precheck().is_ok());
        assert!(ImageSource::Url(Some("http://x/a.png".into())).precheck().is_ok());
    }

    #[tokio::test]
    async fn corrupt_bytes_fail_to_decode() {
        let r = resolver(Ok(b"definitely not an image".to_vec()));
        assert!(matches!(
            r.resolve(upload("a.jpg", b"garbage".to_vec())).await,
            Err(DomainError::DecodeFailed(_))
        ));
        assert!(matches!(
            r.resolve(ImageSource::Url(Some("http://x/a.png".into()))).await,
            Err(DomainError::DecodeFailed(_))
        ));
    }

    #[tokio::test]
    async fn truncated_png_is_rejected() {
        let mut bytes = png_bytes(32, 32);
        bytes.truncate(bytes.len() / 2);
        let r = resolver(Ok(vec![]));
        assert!(matches!(r.resolve(upload("a.png", bytes)).await, Err(DomainError::DecodeFailed(_))));
    }

    #[tokio::test]
    async fn oversized_image_is_rejected() {
        let r = resolver(Ok(vec![])).with_max_dimension(16);
        assert!(matches!(
            r.resolve(upload("big.png", png_bytes(32, 8))).await,
            Err(DomainError::DecodeFailed(_))
        ));
    }

    #[tokio::test]
    async fn url_paths() {
        let r = resolver(Ok(png_bytes(3, 5)));
        assert!(matches!(r.resolve(ImageSource::Url(None)).await, Err(DomainError::MissingImageUrl)));
        assert!(matches!(
            r.resolve(ImageSource::Url(Some("   ".into()))).await,
            Err(DomainError::MissingImageUrl)
        ));
        let (_, info) = r.resolve(ImageSource::Url(Some("http://x/a.png".into()))).await.unwrap();
        assert_eq!((info.width, info.height), (3, 5));
        assert_eq!(info.source_type, SourceType::Url);

        let failing = resolver(Err(DomainError::FetchFailed(String::new())));
        assert!(matches!(
            failing.resolve(ImageSource::Url(Some("http://x/a.png".into()))).await,
            Err(DomainError::FetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn bitmap_is_converted() {
        let r = resolver(Ok(vec![]));
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 2, image::Luma([200])));
        let (img, info) = r.resolve(ImageSource::Bitmap(gray)).await.unwrap();
        assert_eq!(info.mode, "L");
        assert_eq!(info.source_type, SourceType::Bitmap);
        assert!(info.format.is_none());
        assert_eq!(img.rgb().get_pixel(1, 1).0, [200, 200, 200]);

        let empty = DynamicImage::new_rgb8(0, 0);
        assert!(matches!(r.resolve(ImageSource::Bitmap(empty)).await, Err(DomainError::DecodeFailed(_))));
    }
}
