//! 帧编码器
//!
//! 把绘制表面压缩为 JPEG data URL，并交给传输通道。编码在阻塞线程池中进行，
//! 调用方不等待；相邻 tick 的编码可以并行且互不保序。

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use gl_core::{GestureLinkError, Result};
use gl_wire::protocol::encode_data_url;
use gl_wire::{FrameSink, OutboundFrameMessage};

use crate::surface::Surface;

/// 编码配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderConfig {
    /// 有损压缩质量 [0, 1]
    pub quality: f32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { quality: 0.7 }
    }
}

impl EncoderConfig {
    /// 换算为 JPEG 质量 [1, 100]
    pub fn jpeg_quality(&self) -> u8 {
        ((self.quality.clamp(0.0, 1.0) * 100.0).round() as u8).max(1)
    }
}

/// 帧编码器特征
pub trait FrameEncoder: Send + Sync + 'static {
    /// 编码当前表面并连同发送时刻交给通道，失败在内部吞掉
    fn encode_and_send(&self, surface: &Surface, send_timestamp: f64);
}

/// JPEG 编码器
pub struct JpegFrameEncoder {
    config: EncoderConfig,
    sink: Arc<dyn FrameSink>,
}

impl JpegFrameEncoder {
    pub fn new(config: EncoderConfig, sink: Arc<dyn FrameSink>) -> Self {
        Self { config, sink }
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode_and_send(&self, surface: &Surface, send_timestamp: f64) {
        let Some(pixels) = surface.snapshot() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime for frame encode, dropping frame");
            return;
        };

        let sink = self.sink.clone();
        let quality = self.config.jpeg_quality();
        runtime.spawn_blocking(move || {
            let image = match encode_jpeg(&pixels, quality) {
                Ok(image) => image,
                Err(e) => {
                    tracing::debug!("Frame encode failed: {}", e);
                    return;
                }
            };
            if let Err(e) = sink.send_frame(OutboundFrameMessage {
                image,
                timestamp: send_timestamp,
            }) {
                tracing::debug!("Frame dropped: {}", e);
            }
        });
    }
}

/// 同步编码为 JPEG data URL
pub fn encode_jpeg(pixels: &RgbImage, quality: u8) -> Result<String> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(pixels)
        .map_err(|e| GestureLinkError::Encode(e.to_string()))?;
    Ok(encode_data_url("image/jpeg", &buf))
}
