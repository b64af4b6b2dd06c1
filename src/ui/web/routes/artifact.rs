use std::io::Seek;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::photo::{ApiError, map_pipeline_error, message, parse_photo_id};
use crate::download::pipeline::{artifact_file_name, build_artifact, fetch_photo_metadata};
use crate::download::progress::ProgressCallback;
use crate::package::OutputFormat;
use crate::ui::web::state::AppState;

#[derive(Deserialize)]
pub(crate) struct ArtifactQuery {
    format: Option<String>,
}

pub(crate) async fn get_artifact(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Response, ApiError> {
    let photo_id = parse_photo_id(&id)?;
    let format: OutputFormat = query
        .format
        .as_deref()
        .unwrap_or(&state.config.output_format)
        .parse()
        .map_err(|e: String| message(StatusCode::BAD_REQUEST, e))?;

    let config = state.config.clone();
    // 产物先落临时文件再流式返回, zip 写入需要 Seek
    let (temp_path, filename) = tokio::task::spawn_blocking(move || {
        let metadata = fetch_photo_metadata(&config, photo_id)?;
        let mut tmp = tempfile::Builder::new()
            .suffix(&format!(".{}", format.extension()))
            .tempfile()?;
        // 回调走日志, 不在服务端终端画进度条
        let progress: ProgressCallback = Box::new(move |s| {
            tracing::debug!(
                "本子 {photo_id} 下载进度 {}/{}",
                s.completed,
                s.total
            );
        });
        build_artifact(&config, &metadata, format, tmp.as_file_mut(), Some(progress))?;
        tmp.as_file_mut().rewind()?;
        let filename = artifact_file_name(&metadata, format);
        Ok::<_, anyhow::Error>((tmp.into_temp_path(), filename))
    })
    .await
    .map_err(|e| message(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(map_pipeline_error)?;

    let file = tokio::fs::File::open(&temp_path)
        .await
        .map_err(|e| message(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let stream = TempFileStream {
        _temp: temp_path,
        inner: ReaderStream::new(file),
    };
    let body = Body::from_stream(stream);

    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::OK;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(format.media_type()),
    );
    if let Some(hv) = make_content_disposition(&filename) {
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, hv);
    }

    Ok(resp)
}

/// 临时文件随流一起存活, 流被丢弃时文件才删除。
struct TempFileStream {
    _temp: tempfile::TempPath,
    inner: ReaderStream<tokio::fs::File>,
}

impl futures_core::Stream for TempFileStream {
    type Item = Result<axum::body::Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

fn make_content_disposition(filename: &str) -> Option<header::HeaderValue> {
    // RFC 5987 filename* for UTF-8 names, plus ASCII fallback for legacy clients.
    fn is_unreserved(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_')
    }

    let mut encoded = String::with_capacity(filename.len() * 3);
    for &b in filename.as_bytes() {
        if is_unreserved(b) {
            encoded.push(char::from(b));
        } else {
            encoded.push('%');
            encoded.push_str(&format!("{b:02X}"));
        }
    }

    let ascii_fallback = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback, encoded
    );
    header::HeaderValue::from_str(&value).ok()
}
