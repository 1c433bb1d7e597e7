// 传输错误类型
//
// 网络层和服务端错误统一收敛为带标签的枚举，由 uploader::retry 做穷尽匹配分类

use std::fmt;
use thiserror::Error;

/// 网络层错误的细分类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// 连接失败 / 连接被重置（可重试）
    Connection,
    /// 请求超时（不可重试）
    Timeout,
    /// 其他网络错误（不可重试）
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Connection => write!(f, "连接失败"),
            TransportKind::Timeout => write!(f, "请求超时"),
            TransportKind::Other => write!(f, "网络错误"),
        }
    }
}

/// 远端服务返回的业务错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// 会话偏移量不一致，服务端给出正确的偏移量
    #[error("偏移量不一致，服务端偏移量为 {correct_offset}")]
    OffsetMismatch { correct_offset: u64 },

    /// 文件夹过大，无法打包下载
    #[error("文件夹过大，无法打包下载")]
    FolderTooLarge,

    /// 其他业务错误
    #[error("服务端错误 (status={status}): {summary}")]
    Other { status: u16, summary: String },
}

/// 传输错误
#[derive(Debug, Error)]
pub enum TransferError {
    /// 网络层错误
    #[error("{kind}: {message}")]
    Transport {
        kind: TransportKind,
        message: String,
    },

    /// 服务端业务错误
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// 本地文件读写错误
    #[error("本地IO错误: {0}")]
    LocalIo(#[from] std::io::Error),

    /// 可重试错误达到重试上限
    #[error("连续失败 {attempts} 次，放弃重试: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<TransferError>,
    },

    /// 会话状态不允许该操作
    #[error("上传会话状态错误: {0}")]
    InvalidState(String),

    /// 请求参数编码或响应解析失败
    #[error("协议错误: {0}")]
    Protocol(String),
}

impl TransferError {
    pub fn connection(message: impl Into<String>) -> Self {
        TransferError::Transport {
            kind: TransportKind::Connection,
            message: message.into(),
        }
    }

    pub fn service(status: u16, summary: impl Into<String>) -> Self {
        TransferError::Service(ServiceError::Other {
            status,
            summary: summary.into(),
        })
    }

    /// 是否为"文件夹过大"
    pub fn is_folder_too_large(&self) -> bool {
        matches!(self, TransferError::Service(ServiceError::FolderTooLarge))
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() || is_connection_reset(&err) {
            TransportKind::Connection
        } else {
            TransportKind::Other
        };

        TransferError::Transport {
            kind,
            message: err.to_string(),
        }
    }
}

/// 沿 source 链查找连接被重置/中断的 IO 错误
fn is_connection_reset(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
