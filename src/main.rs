//! Comic Photo Downloader（禁漫本子下载器）Rust 实现。
//!
//! 本 crate 负责：域名目录解析、会话鉴权、本子元数据拉取、图片并发下载、
//! 反打乱还原与产物打包（pdf/zip/cbz）。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志等基础设施
//! - `remote`：token 派生、响应解密、域名目录与会话客户端
//! - `scramble`：切片数推导与横条逆置换
//! - `download`：下载池、进度上报与端到端流水线
//! - `package`：JPEG 编码、ZIP/CBZ 归档与 PDF 文档
//! - `ui`：Web Server 模式（JSON API）

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

mod base_system;
mod download;
mod package;
mod remote;
mod scramble;
mod ui;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use download::pipeline::{artifact_file_name, build_artifact, fetch_photo_metadata};
use package::OutputFormat;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "comic-photo-downloader")]
#[command(about = "Comic Photo Downloader (pdf/zip/cbz)")]
struct Cli {
    /// 要下载的本子 id（服务器模式下省略）
    photo_id: Option<u32>,

    /// 输出格式, 可选: [pdf, zip, cbz], 缺省读配置
    #[arg(long)]
    format: Option<String>,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 启用服务器模式（JSON API）
    #[arg(long, default_value_t = false)]
    server: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs 等文件，方便 Docker 挂载）
    #[arg(long)]
    data_dir: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Comic Photo Downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let _log = init_logging(cli.debug, cli.server, data_dir)?;

    let config = load_or_create::<Config>(data_dir).map_err(|e| anyhow!(e.to_string()))?;

    if cli.server {
        return ui::web::run(config);
    }

    let Some(photo_id) = cli.photo_id else {
        return Err(anyhow!("缺少本子 id, 用法: comic-photo-downloader <photo_id> [--format pdf|zip|cbz]"));
    };

    let format: OutputFormat = cli
        .format
        .as_deref()
        .unwrap_or(&config.output_format)
        .parse()
        .map_err(|e: String| anyhow!(e))?;

    let metadata = fetch_photo_metadata(&config, photo_id)?;

    let save_dir = config.default_save_dir();
    std::fs::create_dir_all(&save_dir)
        .with_context(|| format!("创建保存目录失败: {}", save_dir.display()))?;
    let out_path = save_dir.join(artifact_file_name(&metadata, format));

    let mut out = File::create(&out_path)
        .with_context(|| format!("创建输出文件失败: {}", out_path.display()))?;
    build_artifact(&config, &metadata, format, &mut out, None)?;

    info!("已保存: {}", out_path.display());
    println!("已保存: {}", out_path.display());
    Ok(())
}

fn init_logging(debug: bool, server: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        // CLI 模式终端留给进度条, 日志只进文件
        console: server,
    };
    LogSystem::init(opts, base_dir).map_err(|e| anyhow!(e))
}
