//! 产物打包：JPEG 编码、ZIP/CBZ 归档与 PDF 文档。

pub mod archive;
pub mod pdf;

use std::io::Cursor;
use std::str::FromStr;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("zip 写入失败: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("pdf 生成失败: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("图片编码失败: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    Zip,
    Cbz,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Zip => "zip",
            Self::Cbz => "cbz",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Zip => "application/zip",
            Self::Cbz => "application/x-cbz",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "zip" => Ok(Self::Zip),
            "cbz" => Ok(Self::Cbz),
            other => Err(format!("未知输出格式: {other}, 可选: [pdf, zip, cbz]")),
        }
    }
}

/// 统一转成 JPEG, 返回字节与像素尺寸。
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<(Vec<u8>, u32, u32), PackageError> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok((buf.into_inner(), width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats_case_insensitively() {
        assert_eq!("PDF".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!(" cbz ".parse::<OutputFormat>().unwrap(), OutputFormat::Cbz);
        assert!("epub".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn encode_jpeg_yields_decodable_bytes_with_same_dimensions() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            6,
            4,
            image::Rgb([200, 10, 10]),
        ));
        let (bytes, w, h) = encode_jpeg(&img, 90).unwrap();
        assert_eq!((w, h), (6, 4));
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 6);
        assert_eq!(decoded.height(), 4);
    }
}
