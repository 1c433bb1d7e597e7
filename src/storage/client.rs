// 远端存储能力接口
//
// 上传会话和下载编排只依赖这个 trait，具体 HTTP 实现见 dropbox.rs

use crate::storage::{FolderEntry, ObjectMetadata, SessionHandle, TransferError};
use async_trait::async_trait;
use std::path::Path;

/// 远端存储客户端
///
/// 每个方法对应一次远端请求，失败时返回带标签的 [`TransferError`]，
/// 由调用方决定是否重试
#[async_trait]
pub trait RemoteStorageClient: Send + Sync {
    /// 单次上传整个文件
    async fn upload_whole(
        &self,
        data: Vec<u8>,
        destination: &str,
    ) -> Result<ObjectMetadata, TransferError>;

    /// 创建上传会话，同时上传第一个分片
    async fn start_session(&self, first_chunk: Vec<u8>) -> Result<SessionHandle, TransferError>;

    /// 向会话追加一个分片
    ///
    /// `offset` 为服务端已确认的字节数，不一致时返回 `OffsetMismatch`
    async fn append_to_session(
        &self,
        chunk: Vec<u8>,
        session_id: &str,
        offset: u64,
    ) -> Result<(), TransferError>;

    /// 上传最后一个分片并提交文件
    async fn finish_session(
        &self,
        last_chunk: Vec<u8>,
        session_id: &str,
        offset: u64,
        destination: &str,
    ) -> Result<ObjectMetadata, TransferError>;

    /// 下载单个文件到本地，返回写入的字节数
    async fn download_whole(&self, remote_path: &str, local_path: &Path)
        -> Result<u64, TransferError>;

    /// 将远端文件夹打包下载到本地，过大时返回 `FolderTooLarge`
    async fn download_folder_archive(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, TransferError>;

    /// 列出远端文件夹的直接子条目（不递归）
    async fn list_folder(&self, remote_path: &str) -> Result<Vec<FolderEntry>, TransferError>;
}
