pub mod folder;
pub mod orchestrator;

pub use folder::{
    ensure_zip_extension, DownloadedFile, FolderDownloadOutcome, FolderDownloadRequest,
    ResultKind,
};
pub use orchestrator::DownloadOrchestrator;
