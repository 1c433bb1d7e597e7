// 错误分类和重试策略

use crate::config::TransferConfig;
use crate::storage::{ServiceError, TransferError, TransportKind};
use std::time::Duration;

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 服务端偏移量与本地不一致，纠正到服务端给出的偏移量后重试
    OffsetCorrection(u64),
    /// 临时性网络错误，回退到已确认偏移量后重试
    TransientRetry,
    /// 不可恢复
    Fatal,
}

/// 错误分类
///
/// 每种错误恰好对应一个结果
pub fn classify(error: &TransferError) -> RetryDecision {
    match error {
        TransferError::Service(ServiceError::OffsetMismatch { correct_offset }) => {
            RetryDecision::OffsetCorrection(*correct_offset)
        }
        TransferError::Transport {
            kind: TransportKind::Connection,
            ..
        } => RetryDecision::TransientRetry,
        TransferError::Transport {
            kind: TransportKind::Timeout | TransportKind::Other,
            ..
        }
        | TransferError::Service(ServiceError::FolderTooLarge | ServiceError::Other { .. })
        | TransferError::LocalIo(_)
        | TransferError::RetriesExhausted { .. }
        | TransferError::InvalidState(_)
        | TransferError::Protocol(_) => RetryDecision::Fatal,
    }
}

/// 临时错误的重试策略
///
/// `max_retries` 为 None 时无限重试，与最初的行为一致（没有上限也没有退避）；
/// 配置上限后，连续失败超过上限时终止
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
        }
    }
}

impl From<&TransferConfig> for RetryPolicy {
    fn from(config: &TransferConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }
}

impl RetryPolicy {
    /// 不等待、无上限（测试和最初行为）
    pub fn immediate() -> Self {
        Self {
            max_retries: None,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// 第 `failures` 次连续失败后是否还允许重试（failures 从 1 开始）
    pub fn allows(&self, failures: u32) -> bool {
        self.max_retries.map_or(true, |max| failures <= max)
    }

    /// 计算指数退避延迟
    ///
    /// # 延迟序列（默认配置）
    /// - 第1次: 100ms
    /// - 第2次: 200ms
    /// - 第3次: 400ms
    /// - 最大: 5000ms
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}
