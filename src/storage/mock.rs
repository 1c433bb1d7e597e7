// 测试用内存存储客户端
//
// 模拟服务端的会话状态（已接收字节），记录每次调用，并可按调用类型注入故障

use crate::storage::{
    FolderEntry, ObjectMetadata, RemoteStorageClient, ServiceError, SessionHandle, TransferError,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 调用类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    UploadWhole,
    Start,
    Append,
    Finish,
    DownloadWhole,
    DownloadArchive,
    ListFolder,
}

/// 记录的调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    UploadWhole {
        data: Vec<u8>,
        destination: String,
    },
    Start {
        data: Vec<u8>,
    },
    Append {
        data: Vec<u8>,
        session_id: String,
        offset: u64,
    },
    Finish {
        data: Vec<u8>,
        session_id: String,
        offset: u64,
        destination: String,
    },
    DownloadWhole {
        remote: String,
        local: PathBuf,
    },
    DownloadArchive {
        remote: String,
        local: PathBuf,
    },
    ListFolder {
        remote: String,
    },
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Call::UploadWhole { .. } => CallKind::UploadWhole,
            Call::Start { .. } => CallKind::Start,
            Call::Append { .. } => CallKind::Append,
            Call::Finish { .. } => CallKind::Finish,
            Call::DownloadWhole { .. } => CallKind::DownloadWhole,
            Call::DownloadArchive { .. } => CallKind::DownloadArchive,
            Call::ListFolder { .. } => CallKind::ListFolder,
        }
    }

    /// 上传类调用携带的 (偏移量, 数据长度)
    pub fn span(&self) -> Option<(u64, usize)> {
        match self {
            Call::UploadWhole { data, .. } | Call::Start { data } => Some((0, data.len())),
            Call::Append { data, offset, .. } | Call::Finish { data, offset, .. } => {
                Some((*offset, data.len()))
            }
            _ => None,
        }
    }
}

/// 注入的故障
pub enum Fault {
    /// 请求未被服务端接收
    Reject(TransferError),
    /// 服务端已接收数据，但响应丢失
    LoseResponse(TransferError),
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    faults: HashMap<CallKind, VecDeque<Fault>>,
    sessions: HashMap<String, Vec<u8>>,
    committed: HashMap<String, Vec<u8>>,
    remote_files: HashMap<String, Vec<u8>>,
    folders: HashMap<String, Vec<FolderEntry>>,
    too_large: HashSet<String>,
    next_session: u64,
}

/// 内存存储客户端
#[derive(Default)]
pub struct MockStorageClient {
    inner: Mutex<Inner>,
}

impl MockStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 下一次该类型的调用返回故障（按注入顺序依次消费）
    pub fn inject(&self, kind: CallKind, fault: Fault) {
        let mut inner = self.inner.lock().unwrap();
        inner.faults.entry(kind).or_default().push_back(fault);
    }

    pub fn add_remote_file(&self, path: &str, content: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.remote_files.insert(path.to_string(), content.to_vec());
    }

    pub fn add_folder(&self, path: &str, entries: Vec<FolderEntry>) {
        let mut inner = self.inner.lock().unwrap();
        inner.folders.insert(path.to_string(), entries);
    }

    /// 标记文件夹无法打包下载
    pub fn mark_too_large(&self, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.too_large.insert(path.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind() == kind)
            .collect()
    }

    /// 已提交到某路径的文件内容
    pub fn committed(&self, destination: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .committed
            .get(destination)
            .cloned()
    }

    fn record(&self, call: Call) -> Option<Fault> {
        let mut inner = self.inner.lock().unwrap();
        let kind = call.kind();
        inner.calls.push(call);
        inner.faults.get_mut(&kind).and_then(VecDeque::pop_front)
    }

    fn metadata(destination: &str, size: usize) -> ObjectMetadata {
        ObjectMetadata {
            id: format!("id:{}", destination),
            name: destination.rsplit('/').next().unwrap_or_default().to_string(),
            path_display: Some(destination.to_string()),
            size: size as u64,
            rev: None,
        }
    }

    /// 按服务端规则把分片写入会话缓冲区
    fn accept(
        inner: &mut Inner,
        session_id: &str,
        offset: u64,
        data: &[u8],
    ) -> Result<(), TransferError> {
        let buffer = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| TransferError::service(409, "lookup_failed/not_found/"))?;
        if buffer.len() as u64 != offset {
            return Err(ServiceError::OffsetMismatch {
                correct_offset: buffer.len() as u64,
            }
            .into());
        }
        buffer.extend_from_slice(data);
        Ok(())
    }
}

#[async_trait]
impl RemoteStorageClient for MockStorageClient {
    async fn upload_whole(
        &self,
        data: Vec<u8>,
        destination: &str,
    ) -> Result<ObjectMetadata, TransferError> {
        let fault = self.record(Call::UploadWhole {
            data: data.clone(),
            destination: destination.to_string(),
        });
        let mut inner = self.inner.lock().unwrap();
        match fault {
            Some(Fault::Reject(e)) => Err(e),
            Some(Fault::LoseResponse(e)) => {
                inner.committed.insert(destination.to_string(), data);
                Err(e)
            }
            None => {
                let size = data.len();
                inner.committed.insert(destination.to_string(), data);
                Ok(Self::metadata(destination, size))
            }
        }
    }

    async fn start_session(&self, first_chunk: Vec<u8>) -> Result<SessionHandle, TransferError> {
        let fault = self.record(Call::Start {
            data: first_chunk.clone(),
        });
        let mut inner = self.inner.lock().unwrap();
        if let Some(Fault::Reject(e)) = fault {
            return Err(e);
        }

        inner.next_session += 1;
        let session_id = format!("session-{}", inner.next_session);
        inner.sessions.insert(session_id.clone(), first_chunk);

        match fault {
            Some(Fault::LoseResponse(e)) => Err(e),
            _ => Ok(SessionHandle { session_id }),
        }
    }

    async fn append_to_session(
        &self,
        chunk: Vec<u8>,
        session_id: &str,
        offset: u64,
    ) -> Result<(), TransferError> {
        let fault = self.record(Call::Append {
            data: chunk.clone(),
            session_id: session_id.to_string(),
            offset,
        });
        let mut inner = self.inner.lock().unwrap();
        match fault {
            Some(Fault::Reject(e)) => {
                // 注入的偏移量错误：服务端只保留到 correct_offset
                if let TransferError::Service(ServiceError::OffsetMismatch { correct_offset }) = &e
                {
                    if let Some(buffer) = inner.sessions.get_mut(session_id) {
                        buffer.truncate(*correct_offset as usize);
                    }
                }
                Err(e)
            }
            Some(Fault::LoseResponse(e)) => {
                Self::accept(&mut inner, session_id, offset, &chunk)?;
                Err(e)
            }
            None => Self::accept(&mut inner, session_id, offset, &chunk),
        }
    }

    async fn finish_session(
        &self,
        last_chunk: Vec<u8>,
        session_id: &str,
        offset: u64,
        destination: &str,
    ) -> Result<ObjectMetadata, TransferError> {
        let fault = self.record(Call::Finish {
            data: last_chunk.clone(),
            session_id: session_id.to_string(),
            offset,
            destination: destination.to_string(),
        });
        let mut inner = self.inner.lock().unwrap();
        if let Some(Fault::Reject(e)) = fault {
            if let TransferError::Service(ServiceError::OffsetMismatch { correct_offset }) = &e {
                if let Some(buffer) = inner.sessions.get_mut(session_id) {
                    buffer.truncate(*correct_offset as usize);
                }
            }
            return Err(e);
        }

        Self::accept(&mut inner, session_id, offset, &last_chunk)?;
        let content = inner.sessions.remove(session_id).unwrap_or_default();
        let size = content.len();
        inner.committed.insert(destination.to_string(), content);

        match fault {
            Some(Fault::LoseResponse(e)) => Err(e),
            _ => Ok(Self::metadata(destination, size)),
        }
    }

    async fn download_whole(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, TransferError> {
        let fault = self.record(Call::DownloadWhole {
            remote: remote_path.to_string(),
            local: local_path.to_path_buf(),
        });
        if let Some(Fault::Reject(e) | Fault::LoseResponse(e)) = fault {
            return Err(e);
        }

        let content = self
            .inner
            .lock()
            .unwrap()
            .remote_files
            .get(remote_path)
            .cloned()
            .ok_or_else(|| TransferError::service(409, "path/not_found/"))?;
        tokio::fs::write(local_path, &content).await?;
        Ok(content.len() as u64)
    }

    async fn download_folder_archive(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, TransferError> {
        let fault = self.record(Call::DownloadArchive {
            remote: remote_path.to_string(),
            local: local_path.to_path_buf(),
        });
        if let Some(Fault::Reject(e) | Fault::LoseResponse(e)) = fault {
            return Err(e);
        }

        let archive = {
            let inner = self.inner.lock().unwrap();
            if inner.too_large.contains(remote_path) {
                return Err(ServiceError::FolderTooLarge.into());
            }
            if !inner.folders.contains_key(remote_path) {
                return Err(TransferError::service(409, "path/not_found/"));
            }
            format!("PK-archive:{}", remote_path).into_bytes()
        };
        tokio::fs::write(local_path, &archive).await?;
        Ok(archive.len() as u64)
    }

    async fn list_folder(&self, remote_path: &str) -> Result<Vec<FolderEntry>, TransferError> {
        let fault = self.record(Call::ListFolder {
            remote: remote_path.to_string(),
        });
        if let Some(Fault::Reject(e) | Fault::LoseResponse(e)) = fault {
            return Err(e);
        }

        self.inner
            .lock()
            .unwrap()
            .folders
            .get(remote_path)
            .cloned()
            .ok_or_else(|| TransferError::service(409, "path/not_found/"))
    }
}
