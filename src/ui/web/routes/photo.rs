use axum::Json;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::error;

use crate::download::pipeline::fetch_photo_metadata;
use crate::remote::RemoteError;
use crate::ui::web::state::AppState;

pub(crate) type ApiError = (StatusCode, Json<Value>);

pub(crate) fn message(status: StatusCode, text: impl Into<String>) -> ApiError {
    (status, Json(json!({ "message": text.into() })))
}

pub(crate) fn parse_photo_id(raw: &str) -> Result<u32, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| message(StatusCode::BAD_REQUEST, format!("非法本子 id: {raw}")))
}

/// 把流水线错误折算成 HTTP 状态码。
pub(crate) fn map_pipeline_error(err: anyhow::Error) -> ApiError {
    let status = match err.downcast_ref::<RemoteError>() {
        Some(RemoteError::PhotoNotFound(_)) => StatusCode::NOT_FOUND,
        Some(
            RemoteError::Transport { .. }
            | RemoteError::AllMirrorsFailed { .. }
            | RemoteError::NoMirrors,
        ) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("流水线失败: {err:#}");
    }
    message(status, format!("{err}"))
}

pub(crate) async fn get_photo(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, ApiError> {
    let photo_id = parse_photo_id(&id)?;
    let config = state.config.clone();

    let metadata = tokio::task::spawn_blocking(move || fetch_photo_metadata(&config, photo_id))
        .await
        .map_err(|e| message(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(map_pipeline_error)?;

    Ok(Json(json!({
        "id": metadata.id,
        "name": metadata.name,
        "scrambleId": metadata.scramble_id,
        "images": metadata
            .images
            .iter()
            .map(|img| json!({ "name": img.name, "url": img.url }))
            .collect::<Vec<_>>(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(parse_photo_id("abc").is_err());
        assert!(parse_photo_id("-3").is_err());
        assert_eq!(parse_photo_id(" 422866 ").unwrap(), 422_866);
    }

    #[test]
    fn photo_not_found_maps_to_404() {
        let err = anyhow::Error::new(RemoteError::PhotoNotFound(9));
        let (status, _) = map_pipeline_error(err);
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn mirror_outage_maps_to_502() {
        let err = anyhow::Error::new(RemoteError::NoMirrors);
        let (status, _) = map_pipeline_error(err);
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
