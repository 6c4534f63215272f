//! 绘制表面与输出表面

use std::io::Cursor;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};

use gl_core::{GestureLinkError, Result};
use gl_wire::protocol::decode_data_url;

/// 可绘制表面
///
/// 每个采集 tick 都会把当前帧绘制到这里，编码器从这里取快照。
#[derive(Debug, Default)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Option<Arc<RgbImage>>,
}

impl Surface {
    /// 创建指定尺寸的空表面
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: None,
        }
    }

    /// 调整尺寸并清空内容
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = None;
    }

    /// 尺寸
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 绘制一帧，尺寸不符时缩放到表面尺寸
    pub fn draw(&mut self, frame: &Arc<RgbImage>) {
        if frame.dimensions() == (self.width, self.height) {
            self.pixels = Some(frame.clone());
        } else if self.width > 0 && self.height > 0 {
            let scaled = imageops::resize(frame.as_ref(), self.width, self.height, FilterType::Triangle);
            self.pixels = Some(Arc::new(scaled));
        }
    }

    /// 当前内容快照
    pub fn snapshot(&self) -> Option<Arc<RgbImage>> {
        self.pixels.clone()
    }

    /// 清空内容
    pub fn clear(&mut self) {
        self.pixels = None;
    }
}

/// 表面边界 (像素)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceBounds {
    pub width: f64,
    pub height: f64,
}

impl SurfaceBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// 输出表面：显示识别端返回的处理后帧
#[derive(Debug, Clone, Default)]
pub struct OutputSurface {
    image: Option<String>,
    bounds: SurfaceBounds,
}

impl OutputSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以固定边界创建
    pub fn with_bounds(bounds: SurfaceBounds) -> Self {
        Self { image: None, bounds }
    }

    /// 切换到新的处理后帧，并按其尺寸更新边界
    ///
    /// 无法解析尺寸时保留原边界。
    pub fn swap(&mut self, image: String) {
        match probe_dimensions(&image) {
            Ok((width, height)) => {
                self.bounds = SurfaceBounds::new(width as f64, height as f64);
            }
            Err(e) => tracing::debug!("Keeping previous output bounds: {}", e),
        }
        self.image = Some(image);
    }

    /// 当前显示的帧
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// 当前边界
    pub fn bounds(&self) -> SurfaceBounds {
        self.bounds
    }

    /// 隐藏输出
    pub fn clear(&mut self) {
        self.image = None;
    }
}

/// 只读取图像头部获取尺寸
fn probe_dimensions(data_url: &str) -> Result<(u32, u32)> {
    let bytes = decode_data_url(data_url)?;
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(GestureLinkError::Io)?
        .into_dimensions()
        .map_err(|e| GestureLinkError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_jpeg;

    #[test]
    fn test_draw_matching_frame_shares_pixels() {
        let mut surface = Surface::new(4, 4);
        let frame = Arc::new(RgbImage::new(4, 4));
        surface.draw(&frame);
        assert!(Arc::ptr_eq(&surface.snapshot().unwrap(), &frame));
    }

    #[test]
    fn test_draw_scales_to_surface() {
        let mut surface = Surface::new(8, 4);
        surface.draw(&Arc::new(RgbImage::new(16, 8)));
        assert_eq!(surface.snapshot().unwrap().dimensions(), (8, 4));
    }

    #[test]
    fn test_output_swap_updates_bounds() {
        let mut output = OutputSurface::new();
        let url = encode_jpeg(&RgbImage::new(200, 100), 70).unwrap();
        output.swap(url);
        assert_eq!(output.bounds(), SurfaceBounds::new(200.0, 100.0));
        assert!(output.image().is_some());
    }

    #[test]
    fn test_output_swap_keeps_bounds_on_garbage() {
        let mut output = OutputSurface::with_bounds(SurfaceBounds::new(640.0, 480.0));
        output.swap("data:image/jpeg;base64,AAAA".to_string());
        assert_eq!(output.bounds(), SurfaceBounds::new(640.0, 480.0));
        output.clear();
        assert!(output.image().is_none());
    }
}
