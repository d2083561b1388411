use async_trait::async_trait;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, ImageEncoder, RgbaImage};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::host::{CaptureSource, CaptureSources};

const THUMBNAIL_SIZE: (u32, u32) = (320, 180);

/// Screens and top-level windows through `xcap`, each with a scaled PNG
/// preview.
pub struct ScreenSources;

#[async_trait]
impl CaptureSources for ScreenSources {
    async fn sources(&self) -> Result<Vec<CaptureSource>> {
        tokio::task::spawn_blocking(collect)
            .await
            .map_err(|e| Error::Host(format!("capture task failed: {e}")))?
    }
}

fn collect() -> Result<Vec<CaptureSource>> {
    let monitors = xcap::Monitor::all().map_err(|e| Error::Host(format!("failed to list screens: {e}")))?;
    let mut sources = Vec::with_capacity(monitors.len());

    for (i, monitor) in monitors.iter().enumerate() {
        let name = monitor.name().to_string();
        let thumbnail = match monitor.capture_image() {
            Ok(img) => thumbnail(img.width(), img.height(), img.into_raw()),
            Err(e) => {
                warn!("failed to capture screen {}: {}", name, e);
                Vec::new()
            }
        };
        sources.push(CaptureSource {
            id: format!("screen:{}:0", monitor.id()),
            name: if name.is_empty() {
                format!("Screen {}", i + 1)
            } else {
                name
            },
            thumbnail,
            app_icon: None,
        });
    }

    match xcap::Window::all() {
        Ok(windows) => {
            for window in windows.iter().filter(|w| !w.is_minimized()) {
                let title = window.title().to_string();
                if title.is_empty() {
                    continue;
                }
                let thumbnail = match window.capture_image() {
                    Ok(img) => thumbnail(img.width(), img.height(), img.into_raw()),
                    Err(e) => {
                        debug!("skipping preview for {:?}: {}", title, e);
                        Vec::new()
                    }
                };
                sources.push(CaptureSource {
                    id: format!("window:{}:0", window.id()),
                    name: title,
                    thumbnail,
                    app_icon: None,
                });
            }
        }
        Err(e) => warn!("failed to list windows: {}", e),
    }

    Ok(sources)
}

/// Largest size within `bound` that keeps the aspect ratio.
fn fit_within(width: u32, height: u32, bound: (u32, u32)) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = f64::min(bound.0 as f64 / width as f64, bound.1 as f64 / height as f64).min(1.0);
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

/// Scales raw RGBA pixels down and encodes them as PNG. Empty when the
/// buffer does not match the size.
fn thumbnail(width: u32, height: u32, rgba: Vec<u8>) -> Vec<u8> {
    let Some(image) = RgbaImage::from_raw(width, height, rgba) else {
        return Vec::new();
    };
    let (w, h) = fit_within(width, height, THUMBNAIL_SIZE);
    if w == 0 {
        return Vec::new();
    }
    let scaled = imageops::resize(&image, w, h, FilterType::Triangle);

    let mut png = Vec::new();
    match PngEncoder::new(&mut png).write_image(scaled.as_raw(), w, h, ColorType::Rgba8.into()) {
        Ok(()) => png,
        Err(e) => {
            warn!("failed to encode preview: {}", e);
            Vec::new()
        }
    }
}
