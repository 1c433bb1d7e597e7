// 下载编排
//
// - 单个文件：一次请求写到本地路径，任何错误都终止
// - 文件夹：先请求服务端打包为 zip；服务端返回文件夹过大时，
//   列出文件夹的直接子条目，逐个下载到 zip 路径所在目录（不递归子文件夹）

use crate::downloader::folder::{
    DownloadedFile, FolderDownloadOutcome, FolderDownloadRequest, ResultKind,
};
use crate::storage::{RemoteStorageClient, TransferError};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 下载编排器
pub struct DownloadOrchestrator {
    client: Arc<dyn RemoteStorageClient>,
}

impl DownloadOrchestrator {
    pub fn new(client: Arc<dyn RemoteStorageClient>) -> Self {
        Self { client }
    }

    /// 下载单个文件，返回写入的字节数
    pub async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, TransferError> {
        info!("下载文件: {} -> {}", remote_path, local_path.display());
        let bytes = self.client.download_whole(remote_path, local_path).await?;
        info!("✓ 下载完成: {} ({} bytes)", local_path.display(), bytes);
        Ok(bytes)
    }

    /// 下载文件夹
    ///
    /// 打包失败回退到逐个下载时，`request.result_kind` 改为 PerFile
    pub async fn download_folder(
        &self,
        request: &mut FolderDownloadRequest,
    ) -> Result<FolderDownloadOutcome, TransferError> {
        if request.result_kind == ResultKind::Archive {
            info!(
                "打包下载文件夹: {} -> {}",
                request.remote_path,
                request.local_path.display()
            );
            match self
                .client
                .download_folder_archive(&request.remote_path, &request.local_path)
                .await
            {
                Ok(bytes) => {
                    info!("✓ 打包下载完成: {} bytes", bytes);
                    return Ok(FolderDownloadOutcome::Archive { bytes });
                }
                Err(e) if e.is_folder_too_large() => {
                    warn!(
                        "文件夹 {} 过大无法打包，改为逐个下载文件",
                        request.remote_path
                    );
                    request.result_kind = ResultKind::PerFile;
                }
                Err(e) => return Err(e),
            }
        }

        self.download_entries(request).await
    }

    async fn download_entries(
        &self,
        request: &FolderDownloadRequest,
    ) -> Result<FolderDownloadOutcome, TransferError> {
        let directory = request.per_file_directory();
        let entries = self.client.list_folder(&request.remote_path).await?;
        info!(
            "文件夹 {} 共 {} 个条目，下载到 {}",
            request.remote_path,
            entries.len(),
            directory.display()
        );

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.is_file {
                warn!("跳过子文件夹: {}", entry.path);
                continue;
            }

            let local_path = directory.join(entry.base_name());
            let bytes = self.download_file(&entry.path, &local_path).await?;
            files.push(DownloadedFile {
                remote_path: entry.path,
                local_path,
                bytes,
            });
        }

        Ok(FolderDownloadOutcome::PerFile { files })
    }
}
