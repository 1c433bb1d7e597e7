// 上传模块
//
// - chunk: 分片规划
// - retry: 错误分类和重试策略
// - target: 上传目标和远端路径
// - session: 上传会话状态机
// - folder: 上传来源解析和文件夹遍历
// - manager: 批量上传

pub mod chunk;
pub mod folder;
pub mod manager;
pub mod retry;
pub mod session;
pub mod target;

pub use chunk::{plan, ChunkPlan, ChunkPlanner, TransferMode, DEFAULT_CHUNK_SIZE};
pub use folder::{FolderScanner, ResolvedPath, SkippedPath, UploadSource};
pub use manager::{BatchReport, BatchUploader, FailedUpload, UploadedFile};
pub use retry::{classify, RetryDecision, RetryPolicy};
pub use session::{SessionState, UploadCursor, UploadOutcome, UploadSession};
pub use target::{join_remote_path, remote_destination, TransferTarget};
