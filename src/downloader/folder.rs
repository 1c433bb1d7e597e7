//! 文件夹下载数据结构

use std::path::{Path, PathBuf};
use tracing::warn;

/// 文件夹下载结果形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// 服务端打包为 zip
    Archive,
    /// 逐个下载文件
    PerFile,
}

/// 文件夹下载请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderDownloadRequest {
    /// 远端文件夹路径
    pub remote_path: String,
    /// 本地 zip 路径（逐个下载时取其所在目录）
    pub local_path: PathBuf,
    /// 结果形式；只会由打包失败的回退路径从 Archive 改为 PerFile
    pub result_kind: ResultKind,
}

impl FolderDownloadRequest {
    /// 创建打包下载请求，本地路径缺少 `.zip` 扩展名时自动补上
    pub fn archive(remote_path: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_path: ensure_zip_extension(local_path.into()),
            result_kind: ResultKind::Archive,
        }
    }

    /// 创建逐个下载请求，跳过打包尝试
    pub fn per_file(remote_path: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_path: local_path.into(),
            result_kind: ResultKind::PerFile,
        }
    }

    /// 逐个下载时文件存放的本地目录
    pub fn per_file_directory(&self) -> PathBuf {
        per_file_directory(&self.local_path)
    }
}

/// 逐个下载得到的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub bytes: u64,
}

/// 文件夹下载结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderDownloadOutcome {
    Archive { bytes: u64 },
    PerFile { files: Vec<DownloadedFile> },
}

/// 本地路径没有 `.zip` 扩展名时补上
pub fn ensure_zip_extension(path: PathBuf) -> PathBuf {
    let has_zip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if has_zip {
        return path;
    }

    let mut with_zip = path.into_os_string();
    with_zip.push(".zip");
    let with_zip = PathBuf::from(with_zip);
    warn!("文件夹将以 zip 格式下载，本地路径改为 {}", with_zip.display());
    with_zip
}

/// zip 路径所在的目录，为空时使用当前目录
pub fn per_file_directory(archive_path: &Path) -> PathBuf {
    match archive_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
