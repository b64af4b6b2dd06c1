//! 域名目录解析。
//!
//! 官方 API 域名经常轮换, 当前可用域名以 AES 加密文本的形式挂在
//! 公有云对象存储上。按配置顺序逐个镜像尝试, 全部失败才报错。

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::RemoteError;
use super::cipher;
use super::token::{timestamp_seconds, token};

pub struct DomainResolver {
    client: reqwest::blocking::Client,
}

impl DomainResolver {
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| RemoteError::Transport {
                stage: "client",
                source,
            })?;
        Ok(Self { client })
    }

    /// 解析出当前 API 主机名（不含协议前缀）。
    pub fn resolve(&self, mirrors: &[String], secret: &str) -> Result<String, RemoteError> {
        if mirrors.is_empty() {
            return Err(RemoteError::NoMirrors);
        }

        let mut last_err: Option<RemoteError> = None;
        let mut last_mirror = String::new();

        for mirror in mirrors {
            match self.resolve_one(mirror, secret) {
                Ok(host) => {
                    debug!("域名目录命中: {} -> {}", mirror, host);
                    return Ok(host);
                }
                Err(err) => {
                    warn!("域名目录镜像不可用: {} ({err})", mirror);
                    last_mirror = mirror.clone();
                    last_err = Some(err);
                }
            }
        }

        Err(RemoteError::AllMirrorsFailed {
            mirror: last_mirror,
            source: Box::new(last_err.unwrap_or(RemoteError::NoMirrors)),
        })
    }

    fn resolve_one(&self, mirror: &str, secret: &str) -> Result<String, RemoteError> {
        let stage = "domain";
        let encoded = self
            .client
            .get(mirror)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|source| RemoteError::Transport { stage, source })?;

        // 镜像文本里没有时间戳, 只能用本地时钟派生密钥。秒边界上
        // 上传方与本机可能差一秒, 失败时回退一秒重试。
        let ts = timestamp_seconds();
        let decoded = cipher::decrypt(&encoded, &token(ts, secret))
            .or_else(|_| cipher::decrypt(&encoded, &token(ts.saturating_sub(1), secret)))
            .map_err(|source| RemoteError::Decrypt { stage, source })?;

        let value: Value =
            serde_json::from_str(&decoded).map_err(|source| RemoteError::Json { stage, source })?;

        // 旧格式 Server 是单个字符串, 新格式是列表取首个。
        let host = match &value["Server"] {
            Value::String(s) => Some(s.clone()),
            Value::Array(list) => list
                .iter()
                .find_map(|v| v.as_str())
                .map(|s| s.to_string()),
            _ => None,
        };

        host.filter(|h| !h.is_empty()).ok_or(RemoteError::MissingField {
            stage,
            field: "Server",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::cipher::encrypt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "diosfjckwpqpdfjkvnqQjsik";

    // 多线程 runtime 保活到测试结束, mock 服务挂在它的工作线程上
    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    fn encrypted_catalog(body: &str) -> String {
        encrypt(body, &token(timestamp_seconds(), SECRET))
    }

    #[test]
    fn resolves_string_server_field() {
        let rt = runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/newsvr-2025.txt"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(encrypted_catalog(r#"{"Server":"api.example.net"}"#)),
                )
                .mount(&server),
        );

        let resolver = DomainResolver::new(Duration::from_secs(5)).unwrap();
        let host = resolver
            .resolve(&[format!("{}/newsvr-2025.txt", server.uri())], SECRET)
            .unwrap();
        assert_eq!(host, "api.example.net");
    }

    #[test]
    fn falls_back_to_next_mirror() {
        let rt = runtime();
        let bad = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&bad),
        );

        let good = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(encrypted_catalog(r#"{"Server":["api2.example.net"]}"#)),
                )
                .mount(&good),
        );

        let resolver = DomainResolver::new(Duration::from_secs(5)).unwrap();
        let host = resolver
            .resolve(&[bad.uri(), good.uri()], SECRET)
            .unwrap();
        assert_eq!(host, "api2.example.net");
    }

    #[test]
    fn all_mirrors_failed_names_last_mirror() {
        let rt = runtime();
        let bad = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&bad),
        );

        let resolver = DomainResolver::new(Duration::from_secs(5)).unwrap();
        let err = resolver
            .resolve(&[bad.uri(), format!("{}/b", bad.uri())], SECRET)
            .unwrap_err();
        match err {
            RemoteError::AllMirrorsFailed { mirror, .. } => {
                assert!(mirror.ends_with("/b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_mirror_list_is_an_error() {
        let resolver = DomainResolver::new(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            resolver.resolve(&[], SECRET),
            Err(RemoteError::NoMirrors)
        ));
    }
}
