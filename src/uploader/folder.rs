//! 上传来源解析和文件夹遍历
//!
//! 负责:
//! - 将命令行给出的路径转为绝对路径并分类（文件 / 文件夹 / 跳过）
//! - 惰性遍历文件夹，保留文件夹自身名称和子目录结构

use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 一个待上传的本地文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    /// 本地文件绝对路径
    pub local_path: PathBuf,
    /// 计算远端相对路径时的根；为 None 时只保留文件名
    pub root: Option<PathBuf>,
}

/// 路径分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    File(PathBuf),
    Directory(PathBuf),
}

/// 被跳过的路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    pub path: PathBuf,
    pub reason: String,
}

/// 将路径转为绝对路径，并按词法规则去掉 `.` 和 `..`
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// 对命令行路径分类
///
/// 不存在的路径以及既不是普通文件也不是文件夹的路径被跳过，由调用方统一报告
pub fn resolve_paths<P: AsRef<Path>>(paths: &[P]) -> (Vec<ResolvedPath>, Vec<SkippedPath>) {
    let mut resolved = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let absolute = match absolutize(path) {
            Ok(p) => p,
            Err(e) => {
                skipped.push(SkippedPath {
                    path: path.to_path_buf(),
                    reason: format!("无法获取绝对路径: {}", e),
                });
                continue;
            }
        };

        match std::fs::metadata(&absolute) {
            Ok(meta) if meta.is_file() => resolved.push(ResolvedPath::File(absolute)),
            Ok(meta) if meta.is_dir() => resolved.push(ResolvedPath::Directory(absolute)),
            Ok(_) => skipped.push(SkippedPath {
                path: absolute,
                reason: "不是普通文件或文件夹".to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => skipped.push(SkippedPath {
                path: absolute,
                reason: "路径不存在".to_string(),
            }),
            Err(e) => skipped.push(SkippedPath {
                path: absolute,
                reason: format!("读取元数据失败: {}", e),
            }),
        }
    }

    (resolved, skipped)
}

/// 文件夹遍历器
#[derive(Debug, Clone, Default)]
pub struct FolderScanner {
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
}

impl FolderScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 惰性遍历文件夹下的所有普通文件
    ///
    /// 远端路径相对于文件夹的父目录计算，因此文件夹自身的名称会保留。
    /// 同级条目按文件名排序。遍历中的错误（如无权限）作为 Err 项返回，
    /// 不中断后续遍历
    pub fn walk<'a>(
        &self,
        directory: &'a Path,
    ) -> impl Iterator<Item = Result<UploadSource, walkdir::Error>> + 'a {
        let root = directory
            .parent()
            .unwrap_or(directory)
            .to_path_buf();

        WalkDir::new(directory)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) if is_uploadable(&entry) => {
                    debug!("扫描到文件: {}", entry.path().display());
                    Some(Ok(UploadSource {
                        local_path: entry.into_path(),
                        root: Some(root.clone()),
                    }))
                }
                Ok(_) => None,
                Err(e) => {
                    warn!("遍历文件夹出错: {}", e);
                    Some(Err(e))
                }
            })
    }
}

/// 普通文件，或不跟随链接时指向文件的符号链接
///
/// 指向文件夹的链接不展开；失效的链接照常返回，打开时作为失败记录
fn is_uploadable(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    if !file_type.is_symlink() {
        return false;
    }

    match std::fs::metadata(entry.path()) {
        Ok(meta) if meta.is_dir() => {
            warn!("跳过指向文件夹的符号链接: {}", entry.path().display());
            false
        }
        Ok(meta) => meta.is_file(),
        Err(e) => {
            warn!("符号链接已失效: {}: {}", entry.path().display(), e);
            true
        }
    }
}

/// 格式化字节大小
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
