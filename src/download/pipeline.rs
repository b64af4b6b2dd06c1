//! 端到端流水线：解析域名 → 建立会话 → 拉元数据 → 下载 → 还原 → 打包。

use std::io::{Seek, Write};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use super::fetch_pool::{FetchPool, HttpImageSource, ImageSource};
use super::progress::{ProgressCallback, ProgressReporter};
use crate::base_system::context::{Config, safe_fs_name};
use crate::package::archive::ArchiveBuilder;
use crate::package::pdf::PdfBuilder;
use crate::package::{OutputFormat, encode_jpeg};
use crate::remote::domain::DomainResolver;
use crate::remote::models::{PhotoImage, PhotoMetadata, image_url};
use crate::remote::session::SessionClient;
use crate::scramble::descramble::reconstruct;
use crate::scramble::slice_count::slice_count;

/// 走完远端协议, 组装一个本子的下载元数据。
pub fn fetch_photo_metadata(config: &Config, photo_id: u32) -> anyhow::Result<PhotoMetadata> {
    let resolver = DomainResolver::new(config.request_timeout())?;
    let host = resolver.resolve(&config.mirrors, &config.secret_domain)?;
    info!("API 主机: {host}");

    let client = SessionClient::new(&host, config)?;
    let session = client.open_session()?;
    let chapter = client.fetch_photo(&session, photo_id)?;
    let scramble_id = client.fetch_scramble_id(&session, photo_id)?;
    info!(
        "本子 {photo_id} 「{}」共 {} 页, scramble_id={scramble_id}",
        chapter.name,
        chapter.images.len()
    );

    let images = chapter
        .images
        .iter()
        .map(|name| PhotoImage {
            name: name.clone(),
            url: image_url(&session.image_base_url, photo_id, name),
        })
        .collect();

    Ok(PhotoMetadata {
        id: photo_id,
        name: chapter.name,
        scramble_id,
        images,
    })
}

/// 下载全部图片并把产物写进 `out`。
pub fn build_artifact<W: Write + Seek>(
    config: &Config,
    metadata: &PhotoMetadata,
    format: OutputFormat,
    out: &mut W,
    progress_callback: Option<ProgressCallback>,
) -> anyhow::Result<()> {
    let source = Arc::new(HttpImageSource::new(config.request_timeout())?);
    build_artifact_with_source(config, metadata, format, source, out, progress_callback)
}

pub fn build_artifact_with_source<W: Write + Seek>(
    config: &Config,
    metadata: &PhotoMetadata,
    format: OutputFormat,
    source: Arc<dyn ImageSource>,
    out: &mut W,
    progress_callback: Option<ProgressCallback>,
) -> anyhow::Result<()> {
    let mut progress = ProgressReporter::new(metadata.images.len(), progress_callback);
    let pool = FetchPool::new(config.max_workers);
    let raw_images = pool.download_all(source, &metadata.images, &mut progress);
    progress.finish();

    anyhow::ensure!(
        !raw_images.is_empty(),
        "本子 {} 没有成功下载任何图片",
        metadata.id
    );
    if raw_images.len() < metadata.images.len() {
        info!(
            "本子 {} 有 {} 页下载失败, 产物将缺页",
            metadata.id,
            metadata.images.len() - raw_images.len()
        );
    }

    let eras = config.era_thresholds();
    let mut pages = Vec::with_capacity(raw_images.len());
    for raw in &raw_images {
        let slices = slice_count(metadata.scramble_id, metadata.id, &raw.name, eras);
        let restored = reconstruct(&raw.bitmap, i64::from(slices));
        let page = encode_jpeg(&restored, config.jpeg_quality)
            .with_context(|| format!("编码 {} 失败", raw.name))?;
        pages.push(page);
    }

    match format {
        OutputFormat::Pdf => {
            let mut builder = PdfBuilder::new();
            for (jpeg, width, height) in &pages {
                builder.add_page(jpeg, *width, *height)?;
            }
            let bytes = builder.finish()?;
            out.write_all(&bytes)?;
        }
        OutputFormat::Zip | OutputFormat::Cbz => {
            let mut builder = ArchiveBuilder::new(&mut *out, pages.len());
            for (jpeg, _, _) in &pages {
                builder.add_page(jpeg)?;
            }
            builder.finish()?;
        }
    }
    out.flush()?;
    Ok(())
}

/// 产物文件名: `{id} {title}.{ext}`, 标题做文件系统安全化。
pub fn artifact_file_name(metadata: &PhotoMetadata, format: OutputFormat) -> String {
    let title = safe_fs_name(&metadata.name, "_", 120);
    format!("{} {}.{}", metadata.id, title, format.extension())
}
