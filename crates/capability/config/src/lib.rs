//! 服务运行配置加载。
//!
//! 读写器清单与标签口令从 YAML 文件读取，文件路径由环境变量
//! `CONFIG_FILE_PATH` 指定（必填，缺失或不可读即启动失败）。
//! HTTP 监听地址从环境变量读取。

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::Path;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("no readers found in configuration file")]
    NoReaders,
    #[error("duplicate reader name: {0}")]
    DuplicateReader(String),
    #[error("reader {reader}: antenna number {antenna} out of range 1..=8")]
    AntennaOutOfRange { reader: String, antenna: u8 },
}

/// 读写器工作模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderMode {
    /// 同步轮询（host mode）。
    Host,
    /// 异步通知（notification mode）。
    Notification,
}

impl ReaderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderMode::Host => "host",
            ReaderMode::Notification => "notification",
        }
    }
}

/// 单台读写器配置。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderConfig {
    /// 注册名（全局唯一）。
    pub name: String,
    /// 读写器 IP 地址。
    pub address: String,
    /// TCP 端口。
    pub port: u16,
    /// 工作模式。
    pub mode: ReaderMode,
    /// 启用的天线编号（1..=8）。
    #[serde(default)]
    pub antennas: Vec<u8>,
}

impl ReaderConfig {
    /// 天线位掩码：天线 n 对应 `1 << (n - 1)`，多天线按位或。
    pub fn antenna_mask(&self) -> u8 {
        let mut mask = 0u8;
        for antenna in &self.antennas {
            if (1..=8).contains(antenna) {
                mask |= 1 << (antenna - 1);
            }
        }
        mask
    }
}

/// YAML 服务配置。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// 标签口令表，键形如 "DE290Tag.access"。
    #[serde(default)]
    pub tag_passwords: HashMap<String, String>,
    /// /initialize 未指定 format 时使用的默认格式。
    #[serde(default = "default_tag_format")]
    pub default_tag_format: String,
    /// 读写器清单（必填且非空）。
    #[serde(default)]
    pub readers: Vec<ReaderConfig>,
}

fn default_tag_format() -> String {
    "DE290".to_string()
}

impl ServiceConfig {
    /// 从 `CONFIG_FILE_PATH` 指向的文件加载配置。
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_FILE_PATH")
            .map_err(|_| ConfigError::Missing("CONFIG_FILE_PATH".to_string()))?;
        Self::load_from_path(&path)
    }

    /// 从指定路径加载并校验配置。
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let config: ServiceConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.readers.is_empty() {
            return Err(ConfigError::NoReaders);
        }
        let mut names = HashSet::new();
        for reader in &self.readers {
            if !names.insert(reader.name.as_str()) {
                return Err(ConfigError::DuplicateReader(reader.name.clone()));
            }
            for antenna in &reader.antennas {
                if !(1..=8).contains(antenna) {
                    return Err(ConfigError::AntennaOutOfRange {
                        reader: reader.name.clone(),
                        antenna: *antenna,
                    });
                }
            }
        }
        Ok(())
    }
}

/// 进程级运行配置（环境变量）。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Self {
        let http_addr =
            env::var("BOOKGATE_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:7070".to_string());
        Self { http_addr }
    }
}
