//! 命令行参数
//!
//! ```text
//! dropbox-transfer [--config PATH] [-t TOKEN] upload -d REMOTE_ROOT PATH...
//! dropbox-transfer [--config PATH] [-t TOKEN] download -o LOCAL (-d REMOTE_FOLDER | -f REMOTE_FILE)
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub const USAGE: &str = "\
用法:
  dropbox-transfer [--config PATH] [-t TOKEN] upload -d REMOTE_ROOT PATH...
  dropbox-transfer [--config PATH] [-t TOKEN] download -o LOCAL (-d REMOTE_FOLDER | -f REMOTE_FILE)

全局参数:
  --config PATH    配置文件路径（默认 config/app.toml）
  -t, --token      访问令牌（也可通过 DROPBOX_ACCESS_TOKEN 或配置文件提供）
  -h, --help       显示帮助

upload:
  -d REMOTE_ROOT   远端目标目录，文件夹会保留自身名称和子目录结构
  PATH...          本地文件或文件夹（至少一个）

download:
  -o LOCAL         本地路径；下载文件夹时为 zip 文件路径
  -d REMOTE_FOLDER 远端文件夹（与 -f 互斥）
  -f REMOTE_FILE   远端文件（与 -d 互斥）";

/// 子命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload {
        remote_root: String,
        paths: Vec<PathBuf>,
    },
    DownloadFile {
        remote_path: String,
        local_path: PathBuf,
    },
    DownloadFolder {
        remote_path: String,
        local_path: PathBuf,
    },
}

/// 解析后的命令行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub config_path: Option<PathBuf>,
    pub token: Option<String>,
    pub command: Command,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("显示帮助")]
    Help,

    #[error("{0}")]
    Usage(String),
}

fn usage(message: impl Into<String>) -> CliError {
    CliError::Usage(message.into())
}

impl Cli {
    /// 解析参数（不含程序名）
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config_path = None;
        let mut token = None;

        let subcommand = loop {
            let arg = args.next().ok_or_else(|| usage("缺少子命令"))?;
            match arg.as_str() {
                "-h" | "--help" => return Err(CliError::Help),
                "--config" => config_path = Some(PathBuf::from(value_of(&arg, &mut args)?)),
                "-t" | "--token" => token = Some(value_of(&arg, &mut args)?),
                _ if arg.starts_with('-') => return Err(usage(format!("未知参数: {}", arg))),
                _ => break arg,
            }
        };

        let command = match subcommand.as_str() {
            "upload" => parse_upload(args)?,
            "download" => parse_download(args)?,
            other => return Err(usage(format!("未知子命令: {}", other))),
        };

        Ok(Self {
            config_path,
            token,
            command,
        })
    }
}

fn value_of(flag: &str, args: &mut impl Iterator<Item = String>) -> Result<String, CliError> {
    args.next()
        .filter(|v| !v.starts_with('-') || v == "-")
        .ok_or_else(|| usage(format!("参数 {} 缺少取值", flag)))
}

fn parse_upload(mut args: impl Iterator<Item = String>) -> Result<Command, CliError> {
    let mut remote_root = None;
    let mut paths = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(CliError::Help),
            "-d" => remote_root = Some(value_of(&arg, &mut args)?),
            _ if arg.starts_with('-') => return Err(usage(format!("未知参数: {}", arg))),
            _ => paths.push(PathBuf::from(arg)),
        }
    }

    let remote_root = remote_root.ok_or_else(|| usage("upload 需要 -d REMOTE_ROOT"))?;
    if paths.is_empty() {
        return Err(usage("upload 至少需要一个本地路径"));
    }

    Ok(Command::Upload { remote_root, paths })
}

fn parse_download(mut args: impl Iterator<Item = String>) -> Result<Command, CliError> {
    let mut local_path = None;
    let mut folder = None;
    let mut file = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(CliError::Help),
            "-o" => local_path = Some(PathBuf::from(value_of(&arg, &mut args)?)),
            "-d" => folder = Some(value_of(&arg, &mut args)?),
            "-f" => file = Some(value_of(&arg, &mut args)?),
            _ => return Err(usage(format!("未知参数: {}", arg))),
        }
    }

    let local_path = local_path.ok_or_else(|| usage("download 需要 -o LOCAL"))?;
    match (folder, file) {
        (Some(remote_path), None) => Ok(Command::DownloadFolder {
            remote_path,
            local_path,
        }),
        (None, Some(remote_path)) => Ok(Command::DownloadFile {
            remote_path,
            local_path,
        }),
        (Some(_), Some(_)) => Err(usage("-d 和 -f 不能同时使用")),
        (None, None) => Err(usage("download 需要 -d 或 -f 之一")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Cli, CliError> {
        Cli::parse(line.split_whitespace().map(String::from))
    }

    #[test]
    fn test_parse_upload() {
        let cli = parse("-t secret upload -d /Results a.txt somedir").unwrap();
        assert_eq!(cli.token.as_deref(), Some("secret"));
        assert_eq!(cli.config_path, None);
        assert_eq!(
            cli.command,
            Command::Upload {
                remote_root: "/Results".to_string(),
                paths: vec![PathBuf::from("a.txt"), PathBuf::from("somedir")],
            }
        );
    }

    #[test]
    fn test_parse_download() {
        let cli = parse("--config my.toml download -o out/data -d /Data").unwrap();
        assert_eq!(cli.config_path, Some(PathBuf::from("my.toml")));
        assert_eq!(
            cli.command,
            Command::DownloadFolder {
                remote_path: "/Data".to_string(),
                local_path: PathBuf::from("out/data"),
            }
        );

        let cli = parse("download -f /report.csv -o report.csv").unwrap();
        assert_eq!(
            cli.command,
            Command::DownloadFile {
                remote_path: "/report.csv".to_string(),
                local_path: PathBuf::from("report.csv"),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse(""), Err(CliError::Usage(_))));
        assert!(matches!(parse("sync"), Err(CliError::Usage(_))));
        assert!(matches!(parse("upload a.txt"), Err(CliError::Usage(_))));
        assert!(matches!(parse("upload -d /Results"), Err(CliError::Usage(_))));
        assert!(matches!(parse("upload -d"), Err(CliError::Usage(_))));
        assert!(matches!(parse("download -d /Data"), Err(CliError::Usage(_))));
        assert!(matches!(
            parse("download -o x -d /Data -f /a.txt"),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(parse("download -o x"), Err(CliError::Usage(_))));
        assert!(matches!(parse("-t"), Err(CliError::Usage(_))));
        assert_eq!(parse("--help"), Err(CliError::Help));
        assert_eq!(parse("upload -h"), Err(CliError::Help));
    }
}
