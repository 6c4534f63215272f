//! 采集设备
//!
//! 设备按采集约束协商原生尺寸，并始终暴露最新一帧。

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use gl_core::{GestureLinkError, Result};

/// 采集约束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub max_width: u32,
    pub ideal_height: u32,
    pub max_height: u32,
    pub ideal_frame_rate: u32,
    pub max_frame_rate: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            max_width: 1920,
            ideal_height: 720,
            max_height: 1080,
            ideal_frame_rate: 30,
            max_frame_rate: 60,
        }
    }
}

impl CaptureConstraints {
    /// 将原生尺寸缩放到上限以内，保持宽高比
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (width, height);
        }
        if width <= self.max_width && height <= self.max_height {
            return (width, height);
        }
        let scale = f64::min(
            self.max_width as f64 / width as f64,
            self.max_height as f64 / height as f64,
        );
        (
            ((width as f64 * scale).floor() as u32).max(1),
            ((height as f64 * scale).floor() as u32).max(1),
        )
    }

    /// 协商后的帧率
    pub fn frame_rate(&self) -> u32 {
        self.ideal_frame_rate.min(self.max_frame_rate).max(1)
    }
}

/// 帧源特征
pub trait FrameSource: Send + 'static {
    /// 原生尺寸，元数据尚未就绪时返回 (0, 0)
    fn dimensions(&mut self) -> (u32, u32);

    /// 当前帧
    fn current_frame(&mut self) -> Option<Arc<RgbImage>>;

    /// 停止设备
    fn stop(&mut self);

    /// 设备是否仍在采集
    fn is_active(&self) -> bool;
}

/// 设备选择
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// 合成测试图案
    Synthetic,
    /// 静态图像文件
    StillImage(PathBuf),
}

impl FromStr for SourceKind {
    type Err = GestureLinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(GestureLinkError::Config("empty source".to_string())),
            "synthetic" => Ok(SourceKind::Synthetic),
            path => Ok(SourceKind::StillImage(PathBuf::from(path))),
        }
    }
}

/// 打开采集设备
pub fn open_source(
    kind: &SourceKind,
    constraints: &CaptureConstraints,
) -> Result<Box<dyn FrameSource>> {
    match kind {
        SourceKind::Synthetic => Ok(Box::new(SyntheticSource::new(constraints))),
        SourceKind::StillImage(path) => Ok(Box::new(StillImageSource::open(path, constraints)?)),
    }
}

/// 合成测试图案设备
///
/// 渐变底图上叠加一条随帧率移动的亮带。
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_rate: u32,
    base: Arc<RgbImage>,
    frame: Arc<RgbImage>,
    frame_index: Option<u64>,
    started: Instant,
    /// 元数据就绪前还需轮询的次数
    pending_metadata_polls: u32,
    active: bool,
}

impl SyntheticSource {
    /// 亮带宽度
    const BAND_WIDTH: u32 = 32;
    /// 每帧亮带位移
    const BAND_STEP: u64 = 8;

    /// 按约束的理想尺寸创建
    pub fn new(constraints: &CaptureConstraints) -> Self {
        let (width, height) = constraints.fit(constraints.ideal_width, constraints.ideal_height);
        Self::with_size(width, height, constraints.frame_rate())
    }

    /// 指定尺寸创建
    pub fn with_size(width: u32, height: u32, frame_rate: u32) -> Self {
        let base = Arc::new(RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                96,
            ])
        }));
        Self {
            width,
            height,
            frame_rate: frame_rate.max(1),
            frame: base.clone(),
            base,
            frame_index: None,
            started: Instant::now(),
            pending_metadata_polls: 0,
            active: true,
        }
    }

    /// 前 `polls` 次查询尺寸时返回 (0, 0)
    pub fn with_metadata_delay(mut self, polls: u32) -> Self {
        self.pending_metadata_polls = polls;
        self
    }

    fn render(&self, index: u64) -> RgbImage {
        let mut img = (*self.base).clone();
        if self.width == 0 {
            return img;
        }
        let start = ((index * Self::BAND_STEP) % self.width as u64) as u32;
        let end = (start + Self::BAND_WIDTH).min(self.width);
        for x in start..end {
            for y in 0..self.height {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        img
    }
}

impl FrameSource for SyntheticSource {
    fn dimensions(&mut self) -> (u32, u32) {
        if self.pending_metadata_polls > 0 {
            self.pending_metadata_polls -= 1;
            return (0, 0);
        }
        (self.width, self.height)
    }

    fn current_frame(&mut self) -> Option<Arc<RgbImage>> {
        if !self.active {
            return None;
        }
        let index = (self.started.elapsed().as_secs_f64() * self.frame_rate as f64) as u64;
        if self.frame_index != Some(index) {
            self.frame = Arc::new(self.render(index));
            self.frame_index = Some(index);
        }
        Some(self.frame.clone())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// 静态图像设备
pub struct StillImageSource {
    image: Arc<RgbImage>,
    active: bool,
}

impl StillImageSource {
    /// 打开图像文件，超出上限时等比缩小
    pub fn open(path: &Path, constraints: &CaptureConstraints) -> Result<Self> {
        let decoded = image::open(path).map_err(|e| {
            GestureLinkError::Device(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self::from_image(decoded.to_rgb8(), constraints))
    }

    /// 由已解码图像创建
    pub fn from_image(image: RgbImage, constraints: &CaptureConstraints) -> Self {
        let (width, height) = constraints.fit(image.width(), image.height());
        let image = if (width, height) == image.dimensions() {
            image
        } else {
            imageops::resize(&image, width, height, FilterType::Triangle)
        };
        Self {
            image: Arc::new(image),
            active: true,
        }
    }
}

impl FrameSource for StillImageSource {
    fn dimensions(&mut self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn current_frame(&mut self) -> Option<Arc<RgbImage>> {
        self.active.then(|| self.image.clone())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_limits_unchanged() {
        let constraints = CaptureConstraints::default();
        assert_eq!(constraints.fit(1280, 720), (1280, 720));
        assert_eq!(constraints.fit(0, 0), (0, 0));
    }

    #[test]
    fn test_fit_scales_oversized_frame() {
        let constraints = CaptureConstraints::default();
        assert_eq!(constraints.fit(3840, 2160), (1920, 1080));
        // 纵向超限时按高度缩放
        assert_eq!(constraints.fit(1000, 2160), (500, 1080));
    }

    #[test]
    fn test_frame_rate_capped() {
        let constraints = CaptureConstraints {
            ideal_frame_rate: 120,
            ..Default::default()
        };
        assert_eq!(constraints.frame_rate(), 60);
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("synthetic".parse::<SourceKind>().unwrap(), SourceKind::Synthetic);
        assert_eq!(
            "frames/hand.png".parse::<SourceKind>().unwrap(),
            SourceKind::StillImage(PathBuf::from("frames/hand.png"))
        );
        assert!("  ".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_synthetic_metadata_delay() {
        let mut source = SyntheticSource::with_size(64, 48, 30).with_metadata_delay(2);
        assert_eq!(source.dimensions(), (0, 0));
        assert_eq!(source.dimensions(), (0, 0));
        assert_eq!(source.dimensions(), (64, 48));
    }

    #[test]
    fn test_synthetic_stop_yields_no_frames() {
        let mut source = SyntheticSource::with_size(16, 16, 30);
        assert!(source.current_frame().is_some());
        source.stop();
        assert!(!source.is_active());
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn test_missing_still_image_is_device_error() {
        let result = open_source(
            &SourceKind::StillImage(PathBuf::from("/nonexistent/frame.png")),
            &CaptureConstraints::default(),
        );
        assert!(matches!(result, Err(GestureLinkError::Device(_))));
    }

    #[test]
    fn test_still_image_downscaled() {
        let constraints = CaptureConstraints {
            max_width: 40,
            max_height: 40,
            ..Default::default()
        };
        let mut source = StillImageSource::from_image(RgbImage::new(80, 20), &constraints);
        assert_eq!(source.dimensions(), (40, 10));
        assert_eq!(source.current_frame().unwrap().dimensions(), (40, 10));
    }
}
