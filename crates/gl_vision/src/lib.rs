//! # gl_vision - GestureLink Vision Stream
//!
//! 视觉流处理：采集设备、绘制表面、JPEG 编码、采集循环、关键点覆盖层。

pub mod source;
pub mod surface;
pub mod encoder;
pub mod capture;
pub mod overlay;

pub use source::{open_source, CaptureConstraints, FrameSource, SourceKind, StillImageSource, SyntheticSource};
pub use surface::{OutputSurface, Surface, SurfaceBounds};
pub use encoder::{EncoderConfig, FrameEncoder, JpegFrameEncoder};
pub use capture::{CaptureLoop, CaptureLoopConfig, RefreshTicker, TickOutcome};
pub use overlay::{Marker, MarkerStyle, OverlayRenderer};
