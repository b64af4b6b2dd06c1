//! 全局配置结构（Config）与默认值。
//!
//! 上游协议里散落的常量（各角色密钥、镜像目录、打乱纪元阈值）全部集中在这里，
//! 通过 `config.yml` 可在不改代码的情况下轮换。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use crate::scramble::slice_count::EraThresholds;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 网络配置
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    // 协议密钥（按角色区分）
    #[serde(default = "default_secret_request")]
    pub secret_request: String,
    #[serde(default = "default_secret_content")]
    pub secret_content: String,
    #[serde(default = "default_secret_app_data")]
    pub secret_app_data: String,
    #[serde(default = "default_secret_domain")]
    pub secret_domain: String,

    // 域名目录镜像，按顺序尝试
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,
    #[serde(default = "default_bootstrap_version")]
    pub bootstrap_version: String,

    // 图片打乱纪元阈值（历史上调整过多次，保持可配置）
    #[serde(default = "default_era_fixed")]
    pub scramble_era_fixed: u32,
    #[serde(default = "default_era_mod8")]
    pub scramble_era_mod8: u32,

    // 输出配置
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub save_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            request_timeout: default_request_timeout(),
            secret_request: default_secret_request(),
            secret_content: default_secret_content(),
            secret_app_data: default_secret_app_data(),
            secret_domain: default_secret_domain(),
            mirrors: default_mirrors(),
            bootstrap_version: default_bootstrap_version(),
            scramble_era_fixed: default_era_fixed(),
            scramble_era_mod8: default_era_mod8(),
            output_format: default_output_format(),
            jpeg_quality: default_jpeg_quality(),
            save_path: String::new(),
        }
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn era_thresholds(&self) -> EraThresholds {
        EraThresholds {
            fixed_era: self.scramble_era_fixed,
            mod8_era: self.scramble_era_mod8,
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 13] = [
            FieldMeta {
                name: "max_workers",
                description: "图片下载最大并发数",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "secret_request",
                description: "请求鉴权密钥（token 派生用）",
            },
            FieldMeta {
                name: "secret_content",
                description: "内容页鉴权密钥（scramble_id 页面用）",
            },
            FieldMeta {
                name: "secret_app_data",
                description: "应用数据解密密钥（setting/chapter 响应用）",
            },
            FieldMeta {
                name: "secret_domain",
                description: "域名目录解密密钥",
            },
            FieldMeta {
                name: "mirrors",
                description: "域名目录镜像地址，按顺序尝试",
            },
            FieldMeta {
                name: "bootstrap_version",
                description: "首次请求 /setting 时使用的客户端版本号",
            },
            FieldMeta {
                name: "scramble_era_fixed",
                description: "打乱纪元阈值 T1：低于此 id 的本子固定切 10 份",
            },
            FieldMeta {
                name: "scramble_era_mod8",
                description: "打乱纪元阈值 T2：高于此 id 的本子按模 8 计算切片数",
            },
            FieldMeta {
                name: "output_format",
                description: "默认输出格式, 可选: [pdf, zip, cbz]",
            },
            FieldMeta {
                name: "jpeg_quality",
                description: "输出 JPEG 质量 (1-100)",
            },
            FieldMeta {
                name: "save_path",
                description: "产物保存目录（留空表示当前目录）",
            },
        ];
        &FIELDS
    }
}

/// 清理文件名中不允许的字符（Windows 兼容）。
pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| match ch {
            ':' => '：',
            '"' => '“',
            '<' => '《',
            '>' => '》',
            '/' | '\\' => '、',
            '|' => '｜',
            '?' => '？',
            '*' => '＊',
            c if (c as u32) < 32 => replacement.chars().next().unwrap_or('_'),
            _ => ch,
        })
        .collect();

    let trimmed = cleaned.trim().trim_end_matches('.');
    let out: String = trimmed.chars().take(max_len).collect();
    if out.is_empty() {
        replacement.to_string()
    } else {
        out
    }
}

fn default_max_workers() -> usize {
    10
}
fn default_request_timeout() -> u64 {
    15
}
fn default_secret_request() -> String {
    "18comicAPP".to_string()
}
fn default_secret_content() -> String {
    "18comicAPPContent".to_string()
}
fn default_secret_app_data() -> String {
    "185Hcomic3PAPP7R".to_string()
}
fn default_secret_domain() -> String {
    "diosfjckwpqpdfjkvnqQjsik".to_string()
}
fn default_mirrors() -> Vec<String> {
    vec![
        "https://rup4a04-c01.tos-ap-southeast-1.bytepluses.com/newsvr-2025.txt".to_string(),
        "https://rup4a04-c02.tos-cn-hongkong.bytepluses.com/newsvr-2025.txt".to_string(),
    ]
}
fn default_bootstrap_version() -> String {
    "2.0.16".to_string()
}
fn default_era_fixed() -> u32 {
    268_850
}
fn default_era_mod8() -> u32 {
    421_926
}
fn default_output_format() -> String {
    "pdf".to_string()
}
fn default_jpeg_quality() -> u8 {
    90
}
