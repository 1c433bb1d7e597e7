// 上传会话状态机
//
// 状态转换：
// - NotStarted -> Completed（单次上传）
// - NotStarted -> InProgress -> Completed（分片会话上传）
// - NotStarted / InProgress -> Aborted（不可恢复的错误）
//
// 同一个会话内的请求严格串行：每次请求完成后才发出下一次，
// 服务端只接受基于上一次已确认偏移量的追加

use crate::storage::{ObjectMetadata, RemoteStorageClient, TransferError};
use crate::uploader::chunk::{read_chunk, seek_to, ChunkPlan};
use crate::uploader::retry::{classify, RetryDecision, RetryPolicy};
use crate::uploader::TransferTarget;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::{debug, error, info, warn};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    InProgress,
    Completed,
    Aborted,
}

/// 会话游标
///
/// 每次追加或提交成功后 `server_offset == local_position`，
/// 只在错误恢复过程中短暂不一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCursor {
    /// 会话 ID（服务端分配）
    pub session_id: String,
    /// 服务端已确认接收的字节数
    pub server_offset: u64,
    /// 本地流已读取的字节数
    pub local_position: u64,
}

/// 上传结果
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// 服务端返回的文件元数据
    pub metadata: ObjectMetadata,
    /// 发出的请求次数（含重试）
    pub requests: u32,
    /// 网络错误重试次数
    pub transient_retries: u32,
    /// 偏移量纠正次数
    pub offset_corrections: u32,
}

/// 上传会话
pub struct UploadSession<R> {
    client: Arc<dyn RemoteStorageClient>,
    target: TransferTarget<R>,
    plan: ChunkPlan,
    retry: RetryPolicy,
    state: SessionState,
    cursor: Option<UploadCursor>,
    metadata: Option<ObjectMetadata>,
    requests: u32,
    transient_retries: u32,
    offset_corrections: u32,
}

impl<R> UploadSession<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
{
    pub fn new(
        client: Arc<dyn RemoteStorageClient>,
        target: TransferTarget<R>,
        plan: ChunkPlan,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            target,
            plan,
            retry,
            state: SessionState::NotStarted,
            cursor: None,
            metadata: None,
            requests: 0,
            transient_retries: 0,
            offset_corrections: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> Option<&UploadCursor> {
        self.cursor.as_ref()
    }

    /// 服务端已确认的字节数
    pub fn uploaded_bytes(&self) -> u64 {
        match self.state {
            SessionState::Completed => self.target.total_size,
            _ => self.cursor.as_ref().map_or(0, |c| c.server_offset),
        }
    }

    /// 执行完整上传：start 之后反复 step，直到完成或终止
    pub async fn run(mut self) -> Result<UploadOutcome, TransferError> {
        info!(
            "开始上传: dest={}, size={}, mode={:?}, 预计请求数={}",
            self.target.destination,
            self.target.total_size,
            self.plan.mode,
            self.plan.expected_requests()
        );

        self.start().await?;
        while self.state == SessionState::InProgress {
            self.step().await?;
        }

        let metadata = self.metadata.take().ok_or_else(|| {
            TransferError::InvalidState(format!("上传结束但状态为 {:?}", self.state))
        })?;

        info!(
            "上传完成: dest={}, 请求数={}, 网络重试={}, 偏移纠正={}",
            self.target.destination, self.requests, self.transient_retries, self.offset_corrections
        );

        Ok(UploadOutcome {
            metadata,
            requests: self.requests,
            transient_retries: self.transient_retries,
            offset_corrections: self.offset_corrections,
        })
    }

    /// 开始上传
    ///
    /// 单次上传时直接完成；分片上传时创建会话并发送第一个分片
    pub async fn start(&mut self) -> Result<(), TransferError> {
        if self.state != SessionState::NotStarted {
            return Err(TransferError::InvalidState(format!(
                "start 只能在 NotStarted 状态调用，当前 {:?}",
                self.state
            )));
        }

        if self.plan.is_single_shot() {
            self.upload_single_shot().await
        } else {
            self.start_session().await
        }
    }

    /// 单次上传，任何错误都不可恢复
    async fn upload_single_shot(&mut self) -> Result<(), TransferError> {
        let data = match self.read_from(0, self.target.total_size).await {
            Ok(data) => data,
            Err(e) => return Err(self.abort(e)),
        };

        self.requests += 1;
        match self
            .client
            .upload_whole(data, &self.target.destination)
            .await
        {
            Ok(metadata) => {
                info!(
                    "单次上传成功: dest={}, id={}",
                    self.target.destination, metadata.id
                );
                self.metadata = Some(metadata);
                self.state = SessionState::Completed;
                Ok(())
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// 创建会话并上传第一个分片
    ///
    /// 连接失败时从 0 重新读取第一个分片重试，其他错误不可恢复
    async fn start_session(&mut self) -> Result<(), TransferError> {
        let first_len = self.plan.next_chunk_len(0);
        let mut failures = 0u32;

        loop {
            let data = match self.read_from(0, first_len).await {
                Ok(data) => data,
                Err(e) => return Err(self.abort(e)),
            };

            self.requests += 1;
            match self.client.start_session(data).await {
                Ok(handle) => {
                    info!(
                        "[分片#0] ✓ 会话已创建: session_id={}, offset={}",
                        handle.session_id, first_len
                    );
                    self.cursor = Some(UploadCursor {
                        session_id: handle.session_id,
                        server_offset: first_len,
                        local_position: first_len,
                    });
                    self.state = SessionState::InProgress;
                    return Ok(());
                }
                Err(e) => match classify(&e) {
                    RetryDecision::TransientRetry => {
                        failures += 1;
                        self.wait_before_retry(failures, e).await?;
                    }
                    RetryDecision::OffsetCorrection(_) | RetryDecision::Fatal => {
                        return Err(self.abort(e));
                    }
                },
            }
        }
    }

    /// 发送下一个分片
    ///
    /// 剩余字节不超过分片大小时提交会话，否则追加一个完整分片。
    /// 偏移量错误和连接失败在内部恢复，不推进游标
    pub async fn step(&mut self) -> Result<(), TransferError> {
        if self.state != SessionState::InProgress {
            return Err(TransferError::InvalidState(format!(
                "step 只能在 InProgress 状态调用，当前 {:?}",
                self.state
            )));
        }

        let mut failures = 0u32;

        loop {
            let Some((session_id, server_offset)) = self
                .cursor
                .as_ref()
                .map(|c| (c.session_id.clone(), c.server_offset))
            else {
                return Err(self.abort(TransferError::InvalidState(
                    "会话进行中但缺少游标".to_string(),
                )));
            };

            let is_final = self.plan.is_final_chunk(server_offset);
            let len = self.plan.next_chunk_len(server_offset);
            let data = match self.read_from(server_offset, len).await {
                Ok(data) => data,
                Err(e) => return Err(self.abort(e)),
            };
            if let Some(c) = self.cursor.as_mut() {
                c.local_position = server_offset + len;
            }

            let chunk_no = server_offset.div_ceil(self.plan.max_chunk_size);
            debug!(
                "[分片#{}] 发送前 cursor={}, stream={}, final={}",
                chunk_no,
                server_offset,
                server_offset + len,
                is_final
            );

            self.requests += 1;
            let result = if is_final {
                self.client
                    .finish_session(data, &session_id, server_offset, &self.target.destination)
                    .await
                    .map(Some)
            } else {
                self.client
                    .append_to_session(data, &session_id, server_offset)
                    .await
                    .map(|_| None)
            };

            match result {
                Ok(metadata) => {
                    let confirmed = server_offset + len;
                    match metadata {
                        Some(metadata) => {
                            info!(
                                "[分片#{}] ✓ 会话已提交: dest={}, size={}",
                                chunk_no, self.target.destination, confirmed
                            );
                            self.metadata = Some(metadata);
                            self.cursor = None;
                            self.state = SessionState::Completed;
                        }
                        None => {
                            if let Some(c) = self.cursor.as_mut() {
                                c.server_offset = confirmed;
                                debug_assert_eq!(c.server_offset, c.local_position);
                            }
                            info!(
                                "[分片#{}] ✓ 追加成功 ({}/{} bytes)",
                                chunk_no, confirmed, self.target.total_size
                            );
                        }
                    }
                    return Ok(());
                }
                Err(e) => match classify(&e) {
                    RetryDecision::OffsetCorrection(correct_offset) => {
                        if correct_offset > self.target.total_size {
                            error!(
                                "服务端偏移量 {} 超过文件大小 {}，无法纠正",
                                correct_offset, self.target.total_size
                            );
                            return Err(self.abort(e));
                        }
                        warn!(
                            "[分片#{}] 偏移量不一致，纠正游标和本地流: {} -> {}",
                            chunk_no, server_offset, correct_offset
                        );
                        self.offset_corrections += 1;
                        self.reposition(correct_offset).await?;
                    }
                    RetryDecision::TransientRetry => {
                        failures += 1;
                        warn!(
                            "[分片#{}] 连接失败，回退本地流到 {} 后重试: {}",
                            chunk_no, server_offset, e
                        );
                        self.wait_before_retry(failures, e).await?;
                        self.reposition(server_offset).await?;
                    }
                    RetryDecision::Fatal => {
                        return Err(self.abort(e));
                    }
                },
            }
        }
    }

    /// 从 `offset` 读取 `len` 字节
    async fn read_from(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, TransferError> {
        seek_to(&mut self.target.source, offset).await?;
        read_chunk(&mut self.target.source, len).await
    }

    /// 将游标和本地流同时定位到 `offset`
    async fn reposition(&mut self, offset: u64) -> Result<(), TransferError> {
        if let Err(e) = seek_to(&mut self.target.source, offset).await {
            return Err(self.abort(e));
        }
        if let Some(c) = self.cursor.as_mut() {
            c.server_offset = offset;
            c.local_position = offset;
        }
        Ok(())
    }

    /// 检查重试上限并等待退避时间
    async fn wait_before_retry(
        &mut self,
        failures: u32,
        error: TransferError,
    ) -> Result<(), TransferError> {
        if !self.retry.allows(failures) {
            let exhausted = TransferError::RetriesExhausted {
                attempts: failures,
                last: Box::new(error),
            };
            return Err(self.abort(exhausted));
        }

        self.transient_retries += 1;
        let delay = self.retry.backoff(failures);
        if !delay.is_zero() {
            debug!("等待 {:?} 后重试 (第 {} 次)", delay, failures);
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// 终止会话，不对远端会话做清理
    fn abort(&mut self, error: TransferError) -> TransferError {
        error!(
            "上传终止: dest={}, state={:?}, 已确认={} bytes, 错误: {}",
            self.target.destination,
            self.state,
            self.uploaded_bytes(),
            error
        );
        self.state = SessionState::Aborted;
        self.cursor = None;
        error
    }
}
