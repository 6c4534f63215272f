//! # gl_core - GestureLink Core Primitives
//!
//! 核心原语层，定义手势数据模型、时间源、状态面板与全局错误处理机制。
//! 此 crate 是整个项目的基础依赖，不依赖其他业务 crate。

pub mod clock;
pub mod error;
pub mod gesture;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GestureLinkError, Result};
pub use gesture::{Landmark, RawGestureObservation, NO_ACTION};
pub use status::{StatusBoard, StatusLevel, StatusLine, Telemetry};
