//! 关键点覆盖层

use gl_core::Landmark;

use crate::surface::SurfaceBounds;

/// 标记样式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    /// 腕部 (索引 0)
    Wrist,
    /// 指尖 (索引 1-4)
    Fingertip,
    /// 其余关键点，无特殊样式
    Plain,
}

impl MarkerStyle {
    pub fn for_index(index: usize) -> Self {
        match index {
            0 => MarkerStyle::Wrist,
            1..=4 => MarkerStyle::Fingertip,
            _ => MarkerStyle::Plain,
        }
    }

    /// 填充色，None 表示使用默认样式
    pub fn color(&self) -> Option<&'static str> {
        match self {
            MarkerStyle::Wrist => Some("#44ff44"),
            MarkerStyle::Fingertip => Some("#ff4444"),
            MarkerStyle::Plain => None,
        }
    }
}

/// 已放置的标记
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub style: MarkerStyle,
}

/// 覆盖层渲染器
///
/// 每次渲染都完全替换之前的标记。
#[derive(Debug, Default)]
pub struct OverlayRenderer {
    markers: Vec<Marker>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按当前输出边界投影关键点
    pub fn render(&mut self, landmarks: &[Landmark], bounds: SurfaceBounds) {
        self.clear();
        self.markers.extend(landmarks.iter().enumerate().map(|(index, lm)| Marker {
            index,
            x: lm.x * bounds.width,
            y: lm.y * bounds.height,
            style: MarkerStyle::for_index(index),
        }));
        tracing::trace!(markers = self.markers.len(), "Overlay updated");
    }

    /// 清除所有标记 (幂等)
    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// 当前标记
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_landmark_projection() {
        let mut overlay = OverlayRenderer::new();
        overlay.render(&[Landmark::new(0.5, 0.5)], SurfaceBounds::new(200.0, 100.0));
        assert_eq!(overlay.markers().len(), 1);
        assert_eq!(overlay.markers()[0].x, 100.0);
        assert_eq!(overlay.markers()[0].y, 50.0);

        overlay.render(&[], SurfaceBounds::new(200.0, 100.0));
        assert!(overlay.markers().is_empty());
    }

    #[test]
    fn test_marker_styles_by_index() {
        let landmarks: Vec<_> = (0..7).map(|i| Landmark::new(i as f64 / 10.0, 0.0)).collect();
        let mut overlay = OverlayRenderer::new();
        overlay.render(&landmarks, SurfaceBounds::new(10.0, 10.0));
        let styles: Vec<_> = overlay.markers().iter().map(|m| m.style).collect();
        assert_eq!(
            styles,
            vec![
                MarkerStyle::Wrist,
                MarkerStyle::Fingertip,
                MarkerStyle::Fingertip,
                MarkerStyle::Fingertip,
                MarkerStyle::Fingertip,
                MarkerStyle::Plain,
                MarkerStyle::Plain,
            ]
        );
        assert_eq!(MarkerStyle::Plain.color(), None);
    }

    #[test]
    fn test_render_replaces_previous_markers() {
        let mut overlay = OverlayRenderer::new();
        overlay.render(
            &[Landmark::new(0.1, 0.1), Landmark::new(0.2, 0.2)],
            SurfaceBounds::new(100.0, 100.0),
        );
        overlay.render(&[Landmark::new(1.0, 1.0)], SurfaceBounds::new(50.0, 40.0));
        assert_eq!(overlay.markers().len(), 1);
        assert_eq!((overlay.markers()[0].x, overlay.markers()[0].y), (50.0, 40.0));
    }

    #[test]
    fn test_clear_idempotent() {
        let mut overlay = OverlayRenderer::new();
        overlay.clear();
        overlay.render(&[Landmark::new(0.3, 0.3)], SurfaceBounds::new(10.0, 10.0));
        overlay.clear();
        overlay.clear();
        assert!(overlay.markers().is_empty());
    }
}
