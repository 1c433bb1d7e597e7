// Dropbox HTTP 客户端实现

use crate::config::StorageConfig;
use crate::storage::{
    ApiErrorBody, AppendSessionArg, CommitArg, CursorArg, FinishSessionArg, FolderEntry,
    ListFolderContinueArg, ListFolderEntry, ListFolderResponse, ObjectMetadata, PathArg,
    RemoteStorageClient, ServiceError, SessionHandle, StartSessionArg, TransferError,
    TransportKind,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// 内容接口的参数请求头
const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// 估算上传耗时时假定的最低上行速度: 64KB/s
const MIN_UPLOAD_BYTES_PER_SEC: u64 = 64 * 1024;

/// 错误响应体写入日志时的最大长度
const MAX_LOGGED_BODY: usize = 256;

/// 根据请求体大小计算上传请求的超时时间
///
/// 基础超时（连接和等待响应）加上按最低速度发送请求体所需的时间。
/// 150MB 分片约为 60s + 2400s
pub fn upload_timeout(base: Duration, body_len: u64) -> Duration {
    base + Duration::from_secs(body_len.div_ceil(MIN_UPLOAD_BYTES_PER_SEC))
}

fn idle_timeout_error(idle: Duration) -> TransferError {
    TransferError::Transport {
        kind: TransportKind::Timeout,
        message: format!("{}s 内没有收到数据", idle.as_secs_f64()),
    }
}

/// Dropbox 客户端
#[derive(Debug, Clone)]
pub struct DropboxClient {
    /// HTTP客户端
    client: Client,
    /// 访问令牌
    token: String,
    /// RPC 接口地址
    api_base: String,
    /// 内容接口地址
    content_base: String,
    /// 连接超时，同时也是下载时两次收到数据之间的最长等待
    timeout: Duration,
}

impl DropboxClient {
    /// 创建新的客户端
    ///
    /// # 参数
    /// * `config` - 远端存储配置（接口地址、超时）
    /// * `token` - 已解析好的访问令牌
    pub fn new(config: &StorageConfig, token: String) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        // 不设置整体超时：大分片上传和大文件下载的总耗时取决于带宽
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "初始化 Dropbox 客户端: api={}, content={}, timeout={}s",
            config.api_base, config.content_base, config.timeout_secs
        );

        Ok(Self {
            client,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            content_base: config.content_base.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// 调用内容上传接口（参数放在请求头，数据放在请求体）
    async fn content_upload<A: Serialize>(
        &self,
        endpoint: &str,
        arg: &A,
        data: Vec<u8>,
    ) -> Result<Response, TransferError> {
        let url = format!("{}/{}", self.content_base, endpoint);
        let size = data.len();

        let response = self
            .client
            .post(&url)
            .timeout(upload_timeout(self.timeout, size as u64))
            .bearer_auth(&self.token)
            .header(API_ARG_HEADER, api_arg_header(arg)?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;

        debug!(
            "{} 响应: status={}, size={}",
            endpoint,
            response.status(),
            size
        );

        check_response(response).await
    }

    /// 调用内容下载接口，响应体流式写入本地文件
    ///
    /// 等待响应头和每次读取响应体都受 `timeout` 限制，总耗时不限
    async fn content_download(
        &self,
        endpoint: &str,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, TransferError> {
        let url = format!("{}/{}", self.content_base, endpoint);

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(API_ARG_HEADER, api_arg_header(&PathArg { path: remote_path })?)
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| idle_timeout_error(self.timeout))??;

        let response = check_response(response).await?;

        let mut file = File::create(local_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let next = tokio::time::timeout(self.timeout, stream.next())
                .await
                .map_err(|_| idle_timeout_error(self.timeout))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;

        debug!(
            "{} 完成: remote={}, local={:?}, {} bytes",
            endpoint, remote_path, local_path, written
        );

        Ok(written)
    }

    /// 调用 RPC 接口（JSON 请求体）
    async fn rpc<A: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        arg: &A,
    ) -> Result<T, TransferError> {
        let url = format!("{}/{}", self.api_base, endpoint);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .json(arg)
            .send()
            .await?;

        let response = check_response(response).await?;
        parse_json(response).await
    }
}

#[async_trait]
impl RemoteStorageClient for DropboxClient {
    async fn upload_whole(
        &self,
        data: Vec<u8>,
        destination: &str,
    ) -> Result<ObjectMetadata, TransferError> {
        info!("单次上传: path={}, size={}", destination, data.len());
        let response = self
            .content_upload("files/upload", &CommitArg::add(destination), data)
            .await?;
        parse_json(response).await
    }

    async fn start_session(&self, first_chunk: Vec<u8>) -> Result<SessionHandle, TransferError> {
        let response = self
            .content_upload(
                "files/upload_session/start",
                &StartSessionArg { close: false },
                first_chunk,
            )
            .await?;
        parse_json(response).await
    }

    async fn append_to_session(
        &self,
        chunk: Vec<u8>,
        session_id: &str,
        offset: u64,
    ) -> Result<(), TransferError> {
        let arg = AppendSessionArg {
            cursor: CursorArg { session_id, offset },
            close: false,
        };
        self.content_upload("files/upload_session/append_v2", &arg, chunk)
            .await?;
        Ok(())
    }

    async fn finish_session(
        &self,
        last_chunk: Vec<u8>,
        session_id: &str,
        offset: u64,
        destination: &str,
    ) -> Result<ObjectMetadata, TransferError> {
        let arg = FinishSessionArg {
            cursor: CursorArg { session_id, offset },
            commit: CommitArg::add(destination),
        };
        let response = self
            .content_upload("files/upload_session/finish", &arg, last_chunk)
            .await?;
        parse_json(response).await
    }

    async fn download_whole(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, TransferError> {
        self.content_download("files/download", remote_path, local_path)
            .await
    }

    async fn download_folder_archive(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, TransferError> {
        self.content_download("files/download_zip", remote_path, local_path)
            .await
    }

    async fn list_folder(&self, remote_path: &str) -> Result<Vec<FolderEntry>, TransferError> {
        // 根目录在接口中用空字符串表示
        let path = if remote_path == "/" { "" } else { remote_path };

        let mut page: ListFolderResponse = self
            .rpc("files/list_folder", &PathArg { path })
            .await?;
        let mut entries = Vec::new();

        loop {
            entries.extend(
                page.entries
                    .into_iter()
                    .filter_map(ListFolderEntry::into_entry),
            );

            if !page.has_more {
                break;
            }

            debug!("目录列表未结束，继续获取: cursor={}", page.cursor);
            page = self
                .rpc(
                    "files/list_folder/continue",
                    &ListFolderContinueArg {
                        cursor: &page.cursor,
                    },
                )
                .await?;
        }

        info!("列出目录: path={}, {} 个条目", remote_path, entries.len());
        Ok(entries)
    }
}

/// 检查响应状态，失败时解析错误体
async fn check_response(response: Response) -> Result<Response, TransferError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    Err(classify_error_body(status, &text))
}

/// 将失败响应转换为业务错误
fn classify_error_body(status: StatusCode, text: &str) -> TransferError {
    if status == StatusCode::CONFLICT {
        if let Ok(body) = serde_json::from_str::<ApiErrorBody>(text) {
            if let Some(correct_offset) = body.correct_offset() {
                return ServiceError::OffsetMismatch { correct_offset }.into();
            }
            if body.is_too_large() {
                return ServiceError::FolderTooLarge.into();
            }
            let summary = truncate_body(body.error_summary.trim());
            warn!("接口返回业务错误: {}", summary);
            return TransferError::service(status.as_u16(), summary);
        }
    }

    let summary = truncate_body(text.trim());
    warn!("接口请求失败: status={}, body={}", status, summary);
    TransferError::service(status.as_u16(), summary)
}

/// 截断过长的错误响应体（按字符边界）
fn truncate_body(text: &str) -> &str {
    match text.char_indices().nth(MAX_LOGGED_BODY) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, TransferError> {
    let status = response.status();
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        TransferError::Protocol(format!(
            "解析响应失败: status={}, error={}, body={}",
            status, e, text
        ))
    })
}

/// 序列化请求头参数
///
/// HTTP 头只能是 ASCII，非 ASCII 字符按 JSON 的 \uXXXX 形式转义
fn api_arg_header<A: Serialize>(arg: &A) -> Result<String, TransferError> {
    let json = serde_json::to_string(arg)
        .map_err(|e| TransferError::Protocol(format!("序列化请求参数失败: {}", e)))?;

    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(escaped)
}
