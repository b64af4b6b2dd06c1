//! 远端 API 接入层：token 派生、响应解密、域名目录解析与会话客户端。

pub mod cipher;
pub mod domain;
pub mod models;
pub mod session;
pub mod token;

use cipher::CipherError;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("{stage} 请求失败: {source}")]
    Transport {
        stage: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{stage} 响应解密失败: {source}")]
    Decrypt {
        stage: &'static str,
        #[source]
        source: CipherError,
    },
    #[error("{stage} 响应缺少字段 {field}")]
    MissingField {
        stage: &'static str,
        field: &'static str,
    },
    #[error("{stage} 响应不是合法 JSON: {source}")]
    Json {
        stage: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("正文页面中未找到 scramble_id")]
    ScrambleIdNotFound,
    #[error("本子 {0} 不存在或已下架")]
    PhotoNotFound(u32),
    #[error("全部域名目录镜像均不可用, 最后尝试 {mirror}: {source}")]
    AllMirrorsFailed {
        mirror: String,
        #[source]
        source: Box<RemoteError>,
    },
    #[error("未配置域名目录镜像")]
    NoMirrors,
}
