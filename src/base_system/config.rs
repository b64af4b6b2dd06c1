//! 配置文件读写与带注释生成。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

/// 配置字段元信息，用于生成带注释的 `config.yml`。
#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    fn fields() -> &'static [FieldMeta];
}

/// 读取配置；文件不存在时生成一份带注释的默认配置。
///
/// 用户文件里缺失的字段按默认值补齐（merge），避免升级后旧配置直接报错。
pub fn load_or_create<T: ConfigSpec>(base_dir: Option<&Path>) -> Result<T, ConfigError> {
    let path = match base_dir {
        Some(base) => base.join(T::FILE_NAME),
        None => PathBuf::from(T::FILE_NAME),
    };
    ensure_parent(&path)?;

    if !path.exists() {
        let default_config = T::default();
        let yaml = generate_yaml_with_comments(&default_config)?;
        fs::write(&path, yaml).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        return Ok(default_config);
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let user_yaml: Value = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;

    let mut merged = serde_yaml::to_value(T::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    merge_values(&mut merged, user_yaml);

    serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))
}

pub fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let Value::Mapping(mapping) = value else {
        return Err(ConfigError::Validation(
            "config must serialize to a mapping".to_string(),
        ));
    };

    let mut lines = Vec::new();
    for field in T::fields() {
        if !field.description.is_empty() {
            lines.push(format!("# {}", field.description.replace('\n', "\n# ")));
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml_line = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim().to_string());
    }
    lines.push(String::new());

    Ok(lines.join("\n"))
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        (dest, other) => {
            *dest = other;
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::Config;

    #[test]
    fn default_config_written_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: Config = load_or_create(Some(dir.path())).unwrap();
        assert_eq!(cfg.max_workers, 10);

        let raw = fs::read_to_string(dir.path().join(Config::FILE_NAME)).unwrap();
        assert!(raw.contains("max_workers: 10"));
        assert!(raw.lines().any(|l| l.starts_with('#')));
    }

    #[test]
    fn partial_user_config_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(Config::FILE_NAME), "max_workers: 3\n").unwrap();

        let cfg: Config = load_or_create(Some(dir.path())).unwrap();
        assert_eq!(cfg.max_workers, 3);
        // 未出现的字段取默认值
        assert_eq!(cfg.scramble_era_fixed, 268_850);
        assert_eq!(cfg.mirrors.len(), 2);
    }
}
