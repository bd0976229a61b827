//! Image generation and storage.

use super::{AiProviderManager, ImageRequest};
use crate::config::{parse_image_size, ImageConfig};
use crate::errors::{ContentFlowError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Turns a prompt into a stored image.
#[async_trait]
pub trait ImageGeneration: Send + Sync + fmt::Debug {
    /// Generates an image and returns its path relative to storage.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generates images through the image provider and writes them to disk.
///
/// Files are named after a hash of their bytes, so regenerating identical
/// output does not create duplicates.
#[derive(Debug, Clone)]
pub struct ImageGenerator {
    manager: Arc<AiProviderManager>,
    images: ImageConfig,
}

impl ImageGenerator {
    /// Creates a generator.
    #[must_use]
    pub const fn new(manager: Arc<AiProviderManager>, images: ImageConfig) -> Self {
        Self { manager, images }
    }

    fn file_name(bytes: &[u8]) -> String {
        let extension = image::guess_format(bytes)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("png");
        let digest = hex::encode(Sha256::digest(bytes));
        format!("ai-{}.{extension}", &digest[..16])
    }
}

#[async_trait]
impl ImageGeneration for ImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let config = self.manager.config();
        if parse_image_size(&config.image_size).is_none() {
            return Err(ContentFlowError::Config(format!(
                "invalid image size: {}",
                config.image_size
            )));
        }

        let provider = self.manager.image_provider()?;
        if !provider.supports_image_generation() {
            return Err(ContentFlowError::Image(format!(
                "provider [{}] does not support image generation",
                provider.name()
            )));
        }

        let bytes = provider
            .generate_image(&ImageRequest {
                prompt: prompt.to_string(),
                model: config.image_model.clone(),
                size: config.image_size.clone(),
                quality: config.image_quality.clone(),
            })
            .await?;
        if bytes.is_empty() {
            return Err(ContentFlowError::Image(format!(
                "provider [{}] returned an empty image",
                provider.name()
            )));
        }

        let relative = format!("{}/{}", self.images.directory, Self::file_name(&bytes));
        let absolute = self.images.absolute_path(&relative);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute, &bytes).await?;

        info!(provider = %provider.name(), path = %relative, bytes = bytes.len(), "Stored generated image");
        Ok(relative)
    }
}
