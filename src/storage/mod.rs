// 远端存储模块

pub mod client;
pub mod dropbox;
pub mod error;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::RemoteStorageClient;
pub use dropbox::DropboxClient;
pub use error::{ServiceError, TransferError, TransportKind};
pub use types::*;
