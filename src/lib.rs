// Dropbox 文件传输库
// 分片会话上传（偏移量纠正、网络错误重试）和文件夹下载（过大时逐个下载）

// 命令行参数
pub mod cli;

// 配置管理模块
pub mod config;

// 下载模块
pub mod downloader;

// 日志
pub mod logging;

// 远端存储接口
pub mod storage;

// 上传模块
pub mod uploader;

// 导出常用类型
pub use config::AppConfig;
pub use downloader::{DownloadOrchestrator, FolderDownloadOutcome, FolderDownloadRequest};
pub use storage::{DropboxClient, RemoteStorageClient, TransferError};
pub use uploader::{BatchReport, BatchUploader, UploadOutcome, UploadSession};
