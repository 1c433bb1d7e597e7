use anyhow::Context;
use dropbox_transfer::{
    cli::{Cli, CliError, Command, USAGE},
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    downloader::{DownloadOrchestrator, FolderDownloadOutcome, FolderDownloadRequest},
    logging,
    storage::{DropboxClient, RemoteStorageClient},
    uploader::BatchUploader,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(CliError::Help) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(CliError::Usage(message)) => {
            eprintln!("错误: {}\n\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };

    let config_path = cli
        .config_path
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load_or_default(&config_path).await;

    // 必须保持 _log_guard 存活
    let _log_guard = logging::init_logging(&config.log);

    info!("dropbox-transfer v{} 启动", env!("CARGO_PKG_VERSION"));

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<ExitCode> {
    config.transfer.validate().context("传输配置无效")?;
    let token = config.storage.resolve_token(cli.token.as_deref())?;
    let client: Arc<dyn RemoteStorageClient> = Arc::new(DropboxClient::new(&config.storage, token)?);

    match cli.command {
        Command::Upload { remote_root, paths } => {
            let report = BatchUploader::new(client, &config.transfer)
                .upload_paths(&paths, &remote_root)
                .await;
            for failed in &report.failed {
                warn!("未上传: {}: {}", failed.local_path.display(), failed.error);
            }
            // 部分文件失败不影响退出码，失败已逐个记录
            Ok(ExitCode::SUCCESS)
        }
        Command::DownloadFile {
            remote_path,
            local_path,
        } => {
            DownloadOrchestrator::new(client)
                .download_file(&remote_path, &local_path)
                .await
                .with_context(|| format!("下载文件失败: {}", remote_path))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::DownloadFolder {
            remote_path,
            local_path,
        } => {
            let mut request = FolderDownloadRequest::archive(remote_path, local_path);
            let outcome = DownloadOrchestrator::new(client)
                .download_folder(&mut request)
                .await
                .with_context(|| format!("下载文件夹失败: {}", request.remote_path))?;
            match outcome {
                FolderDownloadOutcome::Archive { bytes } => info!(
                    "文件夹已保存为 {} ({} bytes)",
                    request.local_path.display(),
                    bytes
                ),
                FolderDownloadOutcome::PerFile { files } => info!(
                    "文件夹已逐个下载 {} 个文件到 {}",
                    files.len(),
                    request.per_file_directory().display()
                ),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
