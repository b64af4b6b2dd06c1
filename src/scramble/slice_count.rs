//! 切片数推导。
//!
//! 服务端按本子 id 所处的"纪元"决定打乱方式：早期本子不打乱,
//! 中期固定切 10 份, 近期由 md5 摘要末位字符的 ASCII 码决定。

use md5::{Digest, Md5};

/// 打乱纪元阈值, 见配置项 scramble_era_fixed / scramble_era_mod8。
#[derive(Debug, Clone, Copy)]
pub struct EraThresholds {
    pub fixed_era: u32,
    pub mod8_era: u32,
}

impl Default for EraThresholds {
    fn default() -> Self {
        Self {
            fixed_era: 268_850,
            mod8_era: 421_926,
        }
    }
}

/// .gif 视为动图, 不参与打乱。
pub fn is_animated(filename: &str) -> bool {
    filename
        .rsplit('.')
        .next()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"))
}

/// 推导一张图的切片数, 0 表示未打乱。
pub fn slice_count(scramble_id: u32, photo_id: u32, filename: &str, eras: EraThresholds) -> u32 {
    if photo_id < scramble_id {
        return 0;
    }
    if is_animated(filename) {
        return 0;
    }
    if photo_id < eras.fixed_era {
        return 10;
    }

    let stem = filename.split('.').next().unwrap_or(filename);
    let digest = hex::encode(Md5::digest(format!("{photo_id}{stem}").as_bytes()));
    // 末位字符取 ASCII 码, 不是十六进制数值
    let last = digest.as_bytes()[digest.len() - 1] as u32;
    let modulo = if photo_id < eras.mod8_era { 10 } else { 8 };
    (last % modulo) * 2 + 2
}
