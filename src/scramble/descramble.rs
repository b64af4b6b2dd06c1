//! 横条逆置换。
//!
//! 打乱后的图是原图按高度切成 n 条后上下颠倒排列, 余数高度归入
//! 打乱图的最底部一条。这里把各条搬回原位。

use image::{DynamicImage, GenericImageView, imageops};

/// 还原一张被打乱的图。`slices < 1` 时原样返回。
pub fn reconstruct(bitmap: &DynamicImage, slices: i64) -> DynamicImage {
    if slices < 1 {
        return bitmap.clone();
    }
    let n = slices as u32;
    let (width, height) = bitmap.dimensions();
    if n > height || height == 0 {
        return bitmap.clone();
    }

    let band = height / n;
    let over = height % n;
    let mut canvas = DynamicImage::new_rgb8(width, height);

    for i in 0..n {
        let mut band_height = band;
        let s_y = height - band * (i + 1) - over;
        let mut d_y = band * i;
        if i == 0 {
            band_height += over;
        } else {
            d_y += over;
        }
        if band_height == 0 {
            continue;
        }

        let strip = bitmap.crop_imm(0, s_y, width, band_height);
        imageops::replace(&mut canvas, &strip, 0, i64::from(d_y));
    }

    canvas
}
