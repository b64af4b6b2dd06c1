//! 会话客户端：/setting 握手、/chapter 元数据与 scramble_id 抓取。

use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::SET_COOKIE;
use serde::Deserialize;
use tracing::debug;

use super::RemoteError;
use super::cipher;
use super::models::ChapterData;
use super::token::{timestamp_seconds, token, token_param};
use crate::base_system::context::Config;

/// /setting 握手后得到的会话状态。
#[derive(Debug, Clone)]
pub struct Session {
    pub version: String,
    pub cookie_header: String,
    pub image_base_url: String,
}

pub struct SessionClient {
    client: reqwest::blocking::Client,
    base_url: String,
    secret_request: String,
    secret_content: String,
    secret_app_data: String,
    bootstrap_version: String,
}

#[derive(Deserialize)]
struct Envelope {
    data: String,
}

#[derive(Deserialize)]
struct SettingData {
    version: String,
    img_host: String,
}

impl SessionClient {
    pub fn new(host_or_url: &str, config: &Config) -> Result<Self, RemoteError> {
        let base_url = if host_or_url.starts_with("http://") || host_or_url.starts_with("https://")
        {
            host_or_url.trim_end_matches('/').to_string()
        } else {
            format!("https://{host_or_url}")
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| RemoteError::Transport {
                stage: "client",
                source,
            })?;
        Ok(Self {
            client,
            base_url,
            secret_request: config.secret_request.clone(),
            secret_content: config.secret_content.clone(),
            secret_app_data: config.secret_app_data.clone(),
            bootstrap_version: config.bootstrap_version.clone(),
        })
    }

    /// 请求 /setting, 捕获会话 cookie 并解出服务端版本与图片主机。
    pub fn open_session(&self) -> Result<Session, RemoteError> {
        let stage = "setting";
        let ts = timestamp_seconds();

        let resp = self
            .client
            .get(format!("{}/setting", self.base_url))
            .header("token", token(ts, &self.secret_request))
            .header("tokenparam", token_param(ts, &self.bootstrap_version))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|source| RemoteError::Transport { stage, source })?;

        let cookie_header = collect_cookie_header(
            resp.headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        let envelope: Envelope = resp
            .json()
            .map_err(|source| RemoteError::Transport { stage, source })?;
        let decoded = cipher::decrypt(&envelope.data, &token(ts, &self.secret_app_data))
            .map_err(|source| RemoteError::Decrypt { stage, source })?;
        let setting: SettingData =
            serde_json::from_str(&decoded).map_err(|source| RemoteError::Json { stage, source })?;

        debug!("会话建立: version={} img_host={}", setting.version, setting.img_host);
        Ok(Session {
            version: setting.version,
            cookie_header,
            image_base_url: setting.img_host,
        })
    }

    /// 拉取本子元数据（名称与图片文件名列表）。
    pub fn fetch_photo(&self, session: &Session, photo_id: u32) -> Result<ChapterData, RemoteError> {
        let stage = "chapter";
        let ts = timestamp_seconds();

        let resp = self
            .client
            .get(format!("{}/chapter", self.base_url))
            .query(&[("id", photo_id.to_string())])
            .header("token", token(ts, &self.secret_request))
            .header("tokenparam", token_param(ts, &session.version))
            .header("cookie", session.cookie_header.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|source| RemoteError::Transport { stage, source })?;

        let envelope: Envelope = resp
            .json()
            .map_err(|source| RemoteError::Transport { stage, source })?;
        let decoded = cipher::decrypt(&envelope.data, &token(ts, &self.secret_app_data))
            .map_err(|source| RemoteError::Decrypt { stage, source })?;
        let chapter: ChapterData =
            serde_json::from_str(&decoded).map_err(|source| RemoteError::Json { stage, source })?;

        // 不存在的 id 服务端返回空壳而不是错误码
        if chapter.name.is_empty() && chapter.images.is_empty() {
            return Err(RemoteError::PhotoNotFound(photo_id));
        }
        Ok(chapter)
    }

    /// 从正文页面模板里抓取 scramble_id。
    pub fn fetch_scramble_id(&self, session: &Session, photo_id: u32) -> Result<u32, RemoteError> {
        let stage = "chapter_view_template";
        let ts = timestamp_seconds();

        let text = self
            .client
            .get(format!("{}/chapter_view_template", self.base_url))
            .query(&[
                ("id", photo_id.to_string()),
                ("mode", "vertical".to_string()),
                ("page", "0".to_string()),
                ("app_img_shunt", "1".to_string()),
                ("express", "off".to_string()),
                ("v", ts.to_string()),
            ])
            .header("token", token(ts, &self.secret_content))
            .header("tokenparam", token_param(ts, &session.version))
            .header("cookie", session.cookie_header.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|source| RemoteError::Transport { stage, source })?;

        scramble_id_regex()
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .ok_or(RemoteError::ScrambleIdNotFound)
    }
}

fn scramble_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"var scramble_id = (\d+);").unwrap())
}

/// 把若干 Set-Cookie 头压成一个 Cookie 头, 同名以后到者为准。
fn collect_cookie_header<'a>(set_cookies: impl Iterator<Item = &'a str>) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for raw in set_cookies {
        let Some(pair) = raw.split(';').next() else {
            continue;
        };
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim().to_string();
        let value = value.trim().to_string();
        if let Some(existing) = pairs.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value;
        } else {
            pairs.push((name, value));
        }
    }
    pairs
        .iter()
        .map(|(n, v)| format!("{n}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}
