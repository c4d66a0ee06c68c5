//! Bundled [`ImageProcessor`]: downsizes images with the `image` crate.

use std::io::Cursor;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use wayfinder_core::media::{CONTENT_TYPE_JPEG, CONTENT_TYPE_PNG};

use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{ImageData, ImageProcessor};

/// Scales images so the longest side is at most `max_dimension`.
///
/// JPEG input is re-encoded as JPEG; PNG and WebP input as PNG. Images
/// already within bounds pass through untouched. Decoding and encoding run
/// on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResizeProcessor;

#[async_trait]
impl ImageProcessor for ResizeProcessor {
    async fn process(&self, input: ImageData, max_dimension: u32) -> WorkflowResult<ImageData> {
        if max_dimension == 0 {
            return Ok(input);
        }
        tokio::task::spawn_blocking(move || resize(input, max_dimension))
            .await
            .map_err(|e| WorkflowError::ImageProcessing(format!("resize task failed: {e}")))?
    }
}

fn resize(input: ImageData, max_dimension: u32) -> WorkflowResult<ImageData> {
    let decoded = image::load_from_memory(&input.bytes)
        .map_err(|e| WorkflowError::ImageProcessing(format!("cannot decode image: {e}")))?;

    let (width, height) = decoded.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return Ok(input);
    }

    let resized = decoded.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    let (format, content_type, output) = if input.content_type == CONTENT_TYPE_JPEG {
        (
            ImageFormat::Jpeg,
            CONTENT_TYPE_JPEG,
            DynamicImage::ImageRgb8(resized.to_rgb8()),
        )
    } else {
        (ImageFormat::Png, CONTENT_TYPE_PNG, resized)
    };

    let mut buffer = Cursor::new(Vec::new());
    output
        .write_to(&mut buffer, format)
        .map_err(|e| WorkflowError::ImageProcessing(format!("cannot encode image: {e}")))?;

    tracing::debug!(
        from_width = width,
        from_height = height,
        to_width = output.width(),
        to_height = output.height(),
        content_type,
        "Resized image"
    );

    Ok(ImageData {
        bytes: buffer.into_inner(),
        content_type: content_type.to_string(),
    })
}
