// 上传目标：本地数据流 + 远端路径

use crate::storage::TransferError;
use std::io;
use std::path::{Component, Path};
use tokio::fs::File;

/// 一次上传的目标
#[derive(Debug)]
pub struct TransferTarget<R> {
    /// 本地数据流（需支持任意位置定位）
    pub source: R,
    /// 数据总长度
    pub total_size: u64,
    /// 远端路径（以 / 分隔，非空）
    pub destination: String,
}

impl<R> TransferTarget<R> {
    pub fn new(source: R, total_size: u64, destination: impl Into<String>) -> Self {
        Self {
            source,
            total_size,
            destination: destination.into(),
        }
    }
}

impl TransferTarget<File> {
    /// 打开本地文件并计算远端路径
    ///
    /// 文件不存在等本地错误在任何网络请求之前返回
    ///
    /// # 参数
    /// * `local_path` - 本地文件路径
    /// * `remote_base` - 远端目标目录
    /// * `root` - 上传目录树时的根，远端保留相对于它的子目录结构；
    ///   为 None 时只保留文件名
    pub async fn open(
        local_path: &Path,
        remote_base: &str,
        root: Option<&Path>,
    ) -> Result<Self, TransferError> {
        let destination = remote_destination(local_path, remote_base, root)?;
        let file = File::open(local_path).await?;
        let total_size = file.metadata().await?.len();
        Ok(Self::new(file, total_size, destination))
    }
}

/// 计算本地文件对应的远端路径
pub fn remote_destination(
    local_path: &Path,
    remote_base: &str,
    root: Option<&Path>,
) -> Result<String, TransferError> {
    let relative = match root {
        Some(root) => local_path.strip_prefix(root).map_err(|_| {
            invalid_path(format!(
                "{} 不在上传根目录 {} 下",
                local_path.display(),
                root.display()
            ))
        })?,
        None => local_path
            .file_name()
            .map(Path::new)
            .ok_or_else(|| invalid_path(format!("无法获取文件名: {}", local_path.display())))?,
    };

    join_remote_path(remote_base, relative)
        .ok_or_else(|| invalid_path(format!("相对路径为空: {}", local_path.display())))
}

/// 用 / 拼接远端目录和本地相对路径
///
/// 相对路径中没有普通路径段时返回 None
pub fn join_remote_path(base: &str, relative: &Path) -> Option<String> {
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if segments.is_empty() {
        return None;
    }

    let base = base.trim_end_matches('/');
    let base = base.strip_prefix('/').unwrap_or(base);
    if base.is_empty() {
        Some(format!("/{}", segments.join("/")))
    } else {
        Some(format!("/{}/{}", base, segments.join("/")))
    }
}

fn invalid_path(message: String) -> TransferError {
    TransferError::LocalIo(io::Error::new(io::ErrorKind::InvalidInput, message))
}
