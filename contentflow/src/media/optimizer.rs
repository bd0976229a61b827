use crate::config::ImageConfig;
use crate::errors::{ContentFlowError, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Resizes and re-encodes a stored image.
#[async_trait]
pub trait ImageOptimization: Send + Sync + fmt::Debug {
    /// Optimises the image at a storage-relative path and returns the path
    /// of the result, which may differ from the input.
    async fn optimize(&self, path: &str) -> Result<String>;
}

/// Encodings the optimiser can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossless WebP.
    WebP,
    /// JPEG at the configured quality.
    Jpeg,
    /// PNG.
    Png,
}

impl OutputFormat {
    /// File extension for the format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    const fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            _ => None,
        }
    }

    fn encode(self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::WebP => DynamicImage::ImageRgba8(image.to_rgba8())
                .write_with_encoder(WebPEncoder::new_lossless(&mut buf))?,
            Self::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))?,
            Self::Png => image.write_with_encoder(PngEncoder::new(&mut buf))?,
        }
        Ok(buf)
    }
}

impl FromStr for OutputFormat {
    type Err = ContentFlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::WebP),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(ContentFlowError::Config(format!(
                "unsupported image output format: {other}"
            ))),
        }
    }
}

/// Downsizes wide images and converts them to the configured format.
///
/// Files smaller than `min_size_for_conversion` keep their own format and
/// are only resized. When the extension changes the original file is
/// removed.
#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    config: ImageConfig,
}

struct Optimized {
    bytes: Vec<u8>,
    format: OutputFormat,
    resized: bool,
}

impl ImageOptimizer {
    /// Creates an optimiser.
    #[must_use]
    pub const fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    fn process(data: &[u8], target: Option<OutputFormat>, max_width: u32, quality: u8) -> Result<Option<Optimized>> {
        let Some(source_format) = image::guess_format(data)
            .ok()
            .and_then(OutputFormat::from_image_format)
        else {
            return Ok(None);
        };

        let mut img = image::load_from_memory(data)?;
        let (width, height) = img.dimensions();
        let resized = width > max_width;
        if resized {
            let ratio = f64::from(max_width) / f64::from(width);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let new_height = (f64::from(height) * ratio).round().max(1.0) as u32;
            img = img.resize_exact(max_width, new_height, FilterType::Lanczos3);
        }

        let format = target.unwrap_or(source_format);
        if !resized && format == source_format {
            return Ok(Some(Optimized {
                bytes: data.to_vec(),
                format,
                resized,
            }));
        }

        Ok(Some(Optimized {
            bytes: format.encode(&img, quality)?,
            format,
            resized,
        }))
    }
}

#[async_trait]
impl ImageOptimization for ImageOptimizer {
    async fn optimize(&self, path: &str) -> Result<String> {
        let target_format: OutputFormat = self.config.format.parse()?;
        let absolute = self.config.absolute_path(path);
        if !tokio::fs::try_exists(&absolute).await? {
            return Err(ContentFlowError::Image(format!("image not found: {path}")));
        }

        let data = tokio::fs::read(&absolute).await?;
        let original_size = data.len() as u64;
        let convert = original_size >= self.config.min_size_for_conversion;
        let target = convert.then_some(target_format);
        let (max_width, quality) = (self.config.max_width, self.config.quality);

        let outcome = tokio::task::spawn_blocking(move || Self::process(&data, target, max_width, quality))
            .await
            .map_err(|e| ContentFlowError::Image(format!("optimiser task failed: {e}")))??;

        let Some(optimized) = outcome else {
            warn!(path = %path, "Unsupported image type, skipping optimisation");
            return Ok(path.to_string());
        };

        let relative = Path::new(path)
            .with_extension(optimized.format.extension())
            .to_string_lossy()
            .into_owned();
        if relative == path && !optimized.resized {
            debug!(path = %path, "Image already optimised");
            return Ok(relative);
        }

        let destination = self.config.absolute_path(&relative);
        tokio::fs::write(&destination, &optimized.bytes).await?;
        if destination != absolute {
            tokio::fs::remove_file(&absolute).await?;
        }

        info!(
            original = %path,
            optimized = %relative,
            original_size,
            optimized_size = optimized.bytes.len(),
            "Image optimised"
        );
        Ok(relative)
    }
}
