//! 守护进程配置
//!
//! 所有变量均可选，缺省值与各组件的 `Default` 一致；无法解析的值在启动时报错。

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use gl_core::{GestureLinkError, Result};
use gl_pipeline::SessionConfig;
use gl_vision::{EncoderConfig, SourceKind};
use gl_wire::{BusConfig, ChannelConfig};

pub const ENV_RECOGNIZER_URL: &str = "GESTURELINK_RECOGNIZER_URL";
pub const ENV_BUS_ADDR: &str = "GESTURELINK_BUS_ADDR";
pub const ENV_REFRESH_HZ: &str = "GESTURELINK_REFRESH_HZ";
pub const ENV_SOURCE: &str = "GESTURELINK_SOURCE";
pub const ENV_JPEG_QUALITY: &str = "GESTURELINK_JPEG_QUALITY";
pub const ENV_RECONNECT_MS: &str = "GESTURELINK_RECONNECT_MS";

/// 守护进程配置
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// 识别端地址
    pub recognizer_url: String,
    /// 总线监听地址
    pub bus_addr: SocketAddr,
    /// 显示刷新率
    pub refresh_hz: u32,
    /// 采集设备
    pub source: SourceKind,
    /// JPEG 质量 [0, 1]
    pub jpeg_quality: f32,
    /// 断线重连间隔
    pub reconnect_delay: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let channel = ChannelConfig::default();
        Self {
            recognizer_url: channel.url,
            bus_addr: BusConfig::default().addr,
            refresh_hz: 60,
            source: SourceKind::Synthetic,
            jpeg_quality: EncoderConfig::default().quality,
            reconnect_delay: channel.reconnect_delay,
        }
    }
}

impl DaemonConfig {
    /// 从进程环境读取
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_RECOGNIZER_URL) {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(GestureLinkError::Config(format!(
                    "{} must be a ws:// or wss:// URL, got {:?}",
                    ENV_RECOGNIZER_URL, url
                )));
            }
            config.recognizer_url = url;
        }
        if let Some(value) = lookup(ENV_BUS_ADDR) {
            config.bus_addr = parse(ENV_BUS_ADDR, &value)?;
        }
        if let Some(value) = lookup(ENV_REFRESH_HZ) {
            config.refresh_hz = parse(ENV_REFRESH_HZ, &value)?;
            if config.refresh_hz == 0 {
                return Err(GestureLinkError::Config(format!("{} must be positive", ENV_REFRESH_HZ)));
            }
        }
        if let Some(value) = lookup(ENV_SOURCE) {
            config.source = value.parse()?;
        }
        if let Some(value) = lookup(ENV_JPEG_QUALITY) {
            config.jpeg_quality = parse(ENV_JPEG_QUALITY, &value)?;
            if !(0.0..=1.0).contains(&config.jpeg_quality) {
                return Err(GestureLinkError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    ENV_JPEG_QUALITY, value
                )));
            }
        }
        if let Some(value) = lookup(ENV_RECONNECT_MS) {
            config.reconnect_delay = Duration::from_millis(parse(ENV_RECONNECT_MS, &value)?);
        }

        Ok(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            refresh_hz: self.refresh_hz,
            source: self.source.clone(),
            encoder: EncoderConfig {
                quality: self.jpeg_quality,
            },
            ..Default::default()
        }
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            url: self.recognizer_url.clone(),
            reconnect_delay: self.reconnect_delay,
        }
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            addr: self.bus_addr,
            ..Default::default()
        }
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| GestureLinkError::Config(format!("invalid {}={:?}: {}", key, value, e)))
}
