// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 访问令牌环境变量
pub const TOKEN_ENV_VAR: &str = "DROPBOX_ACCESS_TOKEN";

/// 单次请求允许的最大负载: 150MB（服务端建议每个分片 < 150MB）
pub const MAX_REQUEST_PAYLOAD: u64 = 150 * 1024 * 1024;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 远端存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 传输配置
    #[serde(default)]
    pub transfer: TransferConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 远端存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 访问令牌（可被命令行参数或环境变量覆盖）
    #[serde(default)]
    pub access_token: String,
    /// RPC 接口地址
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// 内容上传/下载接口地址
    #[serde(default = "default_content_base")]
    pub content_base: String,
    /// 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.dropboxapi.com/2".to_string()
}

fn default_content_base() -> String {
    "https://content.dropboxapi.com/2".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_base: default_api_base(),
            content_base: default_content_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StorageConfig {
    /// 解析访问令牌
    ///
    /// 优先级: 命令行参数 > 环境变量 > 配置文件
    pub fn resolve_token(&self, cli_token: Option<&str>) -> Result<String> {
        let env_token = std::env::var(TOKEN_ENV_VAR).ok();
        pick_token(cli_token, env_token.as_deref(), &self.access_token)
    }
}

fn pick_token(cli: Option<&str>, env: Option<&str>, configured: &str) -> Result<String> {
    [cli, env, Some(configured)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
        .with_context(|| {
            format!(
                "未提供访问令牌：请使用 -t 参数、{} 环境变量或配置文件 storage.access_token",
                TOKEN_ENV_VAR
            )
        })
}

/// 传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// 分片大小（字节），同时也是单次上传的阈值
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// 网络连接失败时的最大重试次数，不配置表示无限重试
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// 初始退避延迟（毫秒）
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// 最大退避延迟（毫秒）
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_chunk_size() -> u64 {
    MAX_REQUEST_PAYLOAD
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5000
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_retries: None,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl TransferConfig {
    /// 验证分片大小
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("分片大小必须大于 0");
        }
        if self.chunk_size > MAX_REQUEST_PAYLOAD {
            anyhow::bail!(
                "分片大小 {} 超过单次请求上限 {}",
                self.chunk_size,
                MAX_REQUEST_PAYLOAD
            );
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 50MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {}", path))?;

        let config: AppConfig = toml::from_str(&content).context("解析配置文件失败")?;

        config
            .transfer
            .validate()
            .context("配置文件中的传输配置无效")?;

        Ok(config)
    }

    /// 加载配置，失败时使用默认配置
    ///
    /// 此时日志系统尚未初始化，只能输出到 stderr
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => config,
            Err(e) => {
                eprintln!("配置文件加载失败，使用默认配置: {:#}", e);
                Self::default()
            }
        }
    }
}
