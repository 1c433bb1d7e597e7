// 远端存储数据类型

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 上传完成后服务端返回的文件元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// 服务端分配的文件 ID
    #[serde(default)]
    pub id: String,

    /// 文件名
    #[serde(default)]
    pub name: String,

    /// 展示路径（保留大小写）
    #[serde(default)]
    pub path_display: Option<String>,

    /// 文件大小（字节）
    #[serde(default)]
    pub size: u64,

    /// 版本号
    #[serde(default)]
    pub rev: Option<String>,
}

/// 上传会话句柄
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionHandle {
    /// 会话 ID（服务端分配，不透明）
    pub session_id: String,
}

/// 远端目录条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    /// 远端路径
    pub path: String,
    /// 是否是文件
    pub is_file: bool,
}

impl FolderEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_file: true,
        }
    }

    pub fn folder(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_file: false,
        }
    }

    /// 获取条目名（路径最后一段）
    pub fn base_name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
    }
}

// =====================================================
// HTTP 接口参数
// =====================================================

/// 会话游标（session_id + 已写入偏移量）
#[derive(Debug, Clone, Serialize)]
pub struct CursorArg<'a> {
    pub session_id: &'a str,
    pub offset: u64,
}

/// 提交信息
#[derive(Debug, Clone, Serialize)]
pub struct CommitArg<'a> {
    pub path: &'a str,
    /// 冲突策略: add = 同名时不覆盖，由服务端自动重命名
    pub mode: &'static str,
    pub autorename: bool,
    pub mute: bool,
}

impl<'a> CommitArg<'a> {
    pub fn add(path: &'a str) -> Self {
        Self {
            path,
            mode: "add",
            autorename: true,
            mute: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartSessionArg {
    pub close: bool,
}

#[derive(Debug, Serialize)]
pub struct AppendSessionArg<'a> {
    pub cursor: CursorArg<'a>,
    pub close: bool,
}

#[derive(Debug, Serialize)]
pub struct FinishSessionArg<'a> {
    pub cursor: CursorArg<'a>,
    pub commit: CommitArg<'a>,
}

#[derive(Debug, Serialize)]
pub struct PathArg<'a> {
    pub path: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

// =====================================================
// HTTP 接口响应
// =====================================================

/// 目录列表响应
#[derive(Debug, Deserialize)]
pub struct ListFolderResponse {
    #[serde(default)]
    pub entries: Vec<ListFolderEntry>,
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub has_more: bool,
}

/// 目录列表中的单个条目
#[derive(Debug, Deserialize)]
pub struct ListFolderEntry {
    /// 条目类型: file / folder / deleted
    #[serde(rename = ".tag")]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub path_display: Option<String>,
}

impl ListFolderEntry {
    /// 转换为 FolderEntry，deleted 条目返回 None
    pub fn into_entry(self) -> Option<FolderEntry> {
        let is_file = match self.tag.as_str() {
            "file" => true,
            "folder" => false,
            _ => return None,
        };
        let path = self.path_display.or(self.path_lower)?;
        Some(FolderEntry { path, is_file })
    }
}

/// 409 错误响应体
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error_summary: String,
    #[serde(default)]
    pub error: Value,
}

impl ApiErrorBody {
    /// 提取 incorrect_offset 中的正确偏移量
    ///
    /// append 接口直接返回 `{".tag": "incorrect_offset", "correct_offset": N}`，
    /// finish 接口包在 `lookup_failed` 里
    pub fn correct_offset(&self) -> Option<u64> {
        let lookup = if tag_of(&self.error) == Some("lookup_failed") {
            self.error.get("lookup_failed")?
        } else {
            &self.error
        };

        if tag_of(lookup) == Some("incorrect_offset") {
            lookup.get("correct_offset").and_then(Value::as_u64)
        } else {
            None
        }
    }

    /// 是否为 too_large 错误
    pub fn is_too_large(&self) -> bool {
        tag_of(&self.error) == Some("too_large")
    }
}

fn tag_of(value: &Value) -> Option<&str> {
    value.get(".tag").and_then(Value::as_str)
}
