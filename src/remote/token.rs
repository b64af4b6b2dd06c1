//! 请求鉴权 token 派生。
//!
//! 每个请求携带一对头：`token = md5hex("{ts}{secret}")` 与
//! `tokenparam = "{ts},{version}"`，其中 `ts` 为十进制 Unix 秒。

use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};

/// 当前 Unix 秒时间戳。
pub fn timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 时间戳拼接密钥后取 md5 十六进制（小写）。
pub fn token(ts: u64, secret: &str) -> String {
    let digest = Md5::digest(format!("{ts}{secret}").as_bytes());
    hex::encode(digest)
}

/// `tokenparam` 头的值。
pub fn token_param(ts: u64, version: &str) -> String {
    format!("{ts},{version}")
}
