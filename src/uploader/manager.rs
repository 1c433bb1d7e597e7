// 批量上传
//
// 命令行给出的每个路径：
// - 文件：上传到 <远端目录>/<文件名>
// - 文件夹：递归遍历，保留文件夹名称和子目录结构
// - 不存在或类型不支持：跳过，最后统一报告
//
// 文件严格逐个上传；单个文件失败只记录，不影响后续文件

use crate::config::TransferConfig;
use crate::storage::{RemoteStorageClient, TransferError};
use crate::uploader::chunk::ChunkPlanner;
use crate::uploader::folder::{
    format_bytes, resolve_paths, FolderScanner, ResolvedPath, SkippedPath, UploadSource,
};
use crate::uploader::retry::RetryPolicy;
use crate::uploader::session::UploadSession;
use crate::uploader::target::TransferTarget;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 上传成功的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub local_path: PathBuf,
    pub destination: String,
    pub size: u64,
}

/// 上传失败的文件
#[derive(Debug)]
pub struct FailedUpload {
    pub local_path: PathBuf,
    pub error: TransferError,
}

/// 批量上传结果
#[derive(Debug, Default)]
pub struct BatchReport {
    pub uploaded: Vec<UploadedFile>,
    pub failed: Vec<FailedUpload>,
    pub skipped: Vec<SkippedPath>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded.iter().map(|f| f.size).sum()
    }
}

/// 批量上传器
pub struct BatchUploader {
    client: Arc<dyn RemoteStorageClient>,
    planner: ChunkPlanner,
    retry: RetryPolicy,
    scanner: FolderScanner,
}

impl BatchUploader {
    /// 从传输配置创建
    pub fn new(client: Arc<dyn RemoteStorageClient>, config: &TransferConfig) -> Self {
        Self::with_policy(
            client,
            ChunkPlanner::new(config.chunk_size),
            RetryPolicy::from(config),
        )
    }

    pub fn with_policy(
        client: Arc<dyn RemoteStorageClient>,
        planner: ChunkPlanner,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            planner,
            retry,
            scanner: FolderScanner::new(),
        }
    }

    /// 上传一组本地路径到远端目录
    pub async fn upload_paths<P: AsRef<Path>>(&self, paths: &[P], remote_base: &str) -> BatchReport {
        let (resolved, skipped) = resolve_paths(paths);
        let mut report = BatchReport {
            skipped,
            ..Default::default()
        };

        for path in resolved {
            match path {
                ResolvedPath::File(local_path) => {
                    let source = UploadSource {
                        local_path,
                        root: None,
                    };
                    self.upload_and_record(&source, remote_base, &mut report)
                        .await;
                }
                ResolvedPath::Directory(dir) => {
                    info!("开始上传文件夹: {}", dir.display());
                    for entry in self.scanner.walk(&dir) {
                        match entry {
                            Ok(source) => {
                                self.upload_and_record(&source, remote_base, &mut report)
                                    .await;
                            }
                            Err(e) => {
                                let local_path = e
                                    .path()
                                    .map(Path::to_path_buf)
                                    .unwrap_or_else(|| dir.clone());
                                report.failed.push(FailedUpload {
                                    local_path,
                                    error: TransferError::LocalIo(e.into()),
                                });
                            }
                        }
                    }
                }
            }
        }

        for s in &report.skipped {
            warn!("已跳过: {} ({})", s.path.display(), s.reason);
        }
        info!(
            "批量上传结束: 成功 {} 个 ({}), 失败 {} 个, 跳过 {} 个",
            report.uploaded.len(),
            format_bytes(report.uploaded_bytes()),
            report.failed.len(),
            report.skipped.len()
        );

        report
    }

    /// 上传单个文件
    pub async fn upload_file(
        &self,
        source: &UploadSource,
        remote_base: &str,
    ) -> Result<UploadedFile, TransferError> {
        let target =
            TransferTarget::open(&source.local_path, remote_base, source.root.as_deref()).await?;
        let destination = target.destination.clone();
        let size = target.total_size;
        let plan = self.planner.plan(size);

        info!(
            "上传 {} -> {} ({})",
            source.local_path.display(),
            destination,
            format_bytes(size)
        );

        UploadSession::new(self.client.clone(), target, plan, self.retry)
            .run()
            .await?;

        Ok(UploadedFile {
            local_path: source.local_path.clone(),
            destination,
            size,
        })
    }

    async fn upload_and_record(
        &self,
        source: &UploadSource,
        remote_base: &str,
        report: &mut BatchReport,
    ) {
        match self.upload_file(source, remote_base).await {
            Ok(uploaded) => report.uploaded.push(uploaded),
            Err(e) => {
                error!("上传失败: {}: {}", source.local_path.display(), e);
                report.failed.push(FailedUpload {
                    local_path: source.local_path.clone(),
                    error: e,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::{CallKind, Fault, MockStorageClient};
    use std::fs;
    use tempfile::TempDir;

    fn uploader(client: &Arc<MockStorageClient>, chunk_size: u64) -> BatchUploader {
        BatchUploader::with_policy(
            client.clone(),
            ChunkPlanner::new(chunk_size),
            RetryPolicy::immediate(),
        )
    }

    #[tokio::test]
    async fn test_upload_file_and_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("abc.txt"), b"hello").unwrap();
        fs::create_dir_all(root.join("somedir/dir2/dir3")).unwrap();
        fs::write(root.join("somedir/foo.txt"), b"foo").unwrap();
        let big: Vec<u8> = (0..100u8).collect();
        fs::write(root.join("somedir/dir2/dir3/baz.txt"), &big).unwrap();

        let client = Arc::new(MockStorageClient::new());
        let report = uploader(&client, 32)
            .upload_paths(&[root.join("abc.txt"), root.join("somedir")], "/Results")
            .await;

        assert!(report.is_success());
        assert!(report.skipped.is_empty());
        let destinations: Vec<_> = report
            .uploaded
            .iter()
            .map(|f| f.destination.as_str())
            .collect();
        assert_eq!(
            destinations,
            vec![
                "/Results/abc.txt",
                "/Results/somedir/dir2/dir3/baz.txt",
                "/Results/somedir/foo.txt",
            ]
        );

        assert_eq!(client.committed("/Results/abc.txt").unwrap(), b"hello");
        assert_eq!(
            client.committed("/Results/somedir/dir2/dir3/baz.txt").unwrap(),
            big
        );
        // 100 字节、分片 32：start + 2 次 append + finish
        assert_eq!(client.calls_of(CallKind::Start).len(), 1);
        assert_eq!(client.calls_of(CallKind::Append).len(), 2);
        assert_eq!(client.calls_of(CallKind::Finish).len(), 1);
        assert_eq!(report.uploaded_bytes(), 108);
    }

    #[tokio::test]
    async fn test_failed_file_does_not_stop_batch() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), b"aaa").unwrap();
        fs::write(root.join("b.txt"), b"bbb").unwrap();

        let client = Arc::new(MockStorageClient::new());
        client.inject(
            CallKind::UploadWhole,
            Fault::Reject(TransferError::service(409, "path/conflict/file/")),
        );

        let report = uploader(&client, 1024)
            .upload_paths(&[root.join("a.txt"), root.join("b.txt")], "/Results")
            .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].local_path, root.join("a.txt"));
        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(client.committed("/Results/b.txt").unwrap(), b"bbb");
        assert!(!report.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_files_in_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("somedir")).unwrap();
        fs::write(root.join("somedir/a.txt"), b"a").unwrap();
        fs::write(root.join("elsewhere.txt"), b"linked").unwrap();
        std::os::unix::fs::symlink(root.join("elsewhere.txt"), root.join("somedir/link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(root.join("gone.txt"), root.join("somedir/dangling.txt"))
            .unwrap();

        let client = Arc::new(MockStorageClient::new());
        let report = uploader(&client, 1024)
            .upload_paths(&[root.join("somedir")], "/Results")
            .await;

        assert_eq!(report.uploaded.len(), 2);
        assert_eq!(
            client.committed("/Results/somedir/link.txt").unwrap(),
            b"linked"
        );
        // 失效的链接记为失败，不会被静默忽略
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].local_path, root.join("somedir/dangling.txt"));
        assert!(matches!(report.failed[0].error, TransferError::LocalIo(_)));
    }

    #[tokio::test]
    async fn test_missing_path_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.txt");

        let client = Arc::new(MockStorageClient::new());
        let report = uploader(&client, 1024)
            .upload_paths(&[missing.clone()], "/Results")
            .await;

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, missing);
        assert!(report.uploaded.is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_directory_uploads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("empty")).unwrap();

        let client = Arc::new(MockStorageClient::new());
        let report = uploader(&client, 1024)
            .upload_paths(&[temp_dir.path().join("empty")], "/Results")
            .await;

        assert!(report.is_success());
        assert!(report.uploaded.is_empty());
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_new_uses_transfer_config() {
        let client: Arc<dyn RemoteStorageClient> = Arc::new(MockStorageClient::new());
        let config = TransferConfig {
            chunk_size: 4096,
            max_retries: Some(3),
            ..Default::default()
        };
        let uploader = BatchUploader::new(client, &config);
        assert_eq!(uploader.planner.max_chunk_size(), 4096);
        assert_eq!(uploader.retry.max_retries, Some(3));
    }
}
