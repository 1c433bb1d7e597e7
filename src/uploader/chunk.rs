// 上传分片规划
//
// 分片规则：
// - 文件 <= 分片大小：单次上传，不创建会话
// - 文件 > 分片大小：第一个分片随会话创建上传，中间分片追加，
//   剩余字节 <= 分片大小时作为最后一个分片提交
//
// 最后一个分片在发送时根据剩余字节判断，不预先计算，
// 因为会话中的偏移量纠正会改变剩余字节数

use crate::config::MAX_REQUEST_PAYLOAD;
use crate::storage::TransferError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::debug;

/// 默认分片大小: 150MB
pub const DEFAULT_CHUNK_SIZE: u64 = MAX_REQUEST_PAYLOAD;

/// 传输方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// 单次上传
    SingleShot,
    /// 分片会话上传
    Chunked,
}

/// 分片计划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// 文件总大小
    pub total_size: u64,
    /// 分片大小上限
    pub max_chunk_size: u64,
    /// 传输方式
    pub mode: TransferMode,
}

impl ChunkPlan {
    pub fn is_single_shot(&self) -> bool {
        self.mode == TransferMode::SingleShot
    }

    /// 从 `position` 开始剩余的字节数
    pub fn remaining(&self, position: u64) -> u64 {
        self.total_size.saturating_sub(position)
    }

    /// 从 `position` 开始发送时，是否为最后一个分片
    pub fn is_final_chunk(&self, position: u64) -> bool {
        self.remaining(position) <= self.max_chunk_size
    }

    /// 从 `position` 开始的下一个分片长度
    pub fn next_chunk_len(&self, position: u64) -> u64 {
        self.remaining(position).min(self.max_chunk_size)
    }

    /// 无错误时的请求次数
    pub fn expected_requests(&self) -> u64 {
        match self.mode {
            TransferMode::SingleShot => 1,
            TransferMode::Chunked => self.total_size.div_ceil(self.max_chunk_size),
        }
    }
}

/// 计算分片计划
///
/// 纯函数。分片大小为 0 时按 1 处理，保证分片循环可以推进
pub fn plan(total_size: u64, max_chunk_size: u64) -> ChunkPlan {
    let max_chunk_size = max_chunk_size.max(1);
    let mode = if total_size <= max_chunk_size {
        TransferMode::SingleShot
    } else {
        TransferMode::Chunked
    };

    ChunkPlan {
        total_size,
        max_chunk_size,
        mode,
    }
}

/// 分片规划器（持有配置的分片大小）
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    max_chunk_size: u64,
}

impl ChunkPlanner {
    pub fn new(max_chunk_size: u64) -> Self {
        Self { max_chunk_size }
    }

    pub fn max_chunk_size(&self) -> u64 {
        self.max_chunk_size
    }

    pub fn plan(&self, total_size: u64) -> ChunkPlan {
        plan(total_size, self.max_chunk_size)
    }
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

/// 从当前位置读取 `len` 字节
pub async fn read_chunk<R>(reader: &mut R, len: u64) -> Result<Vec<u8>, TransferError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer).await?;
    Ok(buffer)
}

/// 将本地流定位到 `offset`
pub async fn seek_to<R>(reader: &mut R, offset: u64) -> Result<(), TransferError>
where
    R: AsyncSeek + Unpin,
{
    reader.seek(std::io::SeekFrom::Start(offset)).await?;
    debug!("本地流定位到 {}", offset);
    Ok(())
}
