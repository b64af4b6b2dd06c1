//! ZIP / CBZ 归档。两种格式字节完全一致, 仅扩展名不同。

use std::io::{Seek, Write};

use zip::CompressionMethod;
use zip::write::FileOptions;

use super::PackageError;

/// 按页序号零填充命名写入 JPEG 的归档器。
///
/// `finish` 消费自身, 归档只能封口一次。
pub struct ArchiveBuilder<W: Write + Seek> {
    zip: zip::ZipWriter<W>,
    pad: usize,
    next_index: usize,
}

impl<W: Write + Seek> ArchiveBuilder<W> {
    pub fn new(out: W, total_pages: usize) -> Self {
        Self {
            zip: zip::ZipWriter::new(out),
            pad: digit_count(total_pages),
            next_index: 1,
        }
    }

    /// 追加一页, 条目名形如 `001.jpg`（宽度由总页数决定）。
    pub fn add_page(&mut self, jpeg: &[u8]) -> Result<(), PackageError> {
        let name = format!("{:0pad$}.jpg", self.next_index, pad = self.pad);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(name, options)?;
        self.zip.write_all(jpeg)?;
        self.next_index += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W, PackageError> {
        Ok(self.zip.finish()?)
    }
}

fn digit_count(n: usize) -> usize {
    n.max(1).to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::encode_jpeg;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::{Cursor, Read};

    fn solid_jpeg(shade: u8) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([shade, 0, 0])));
        encode_jpeg(&img, 90).unwrap().0
    }

    #[test]
    fn entries_are_zero_padded_and_ordered() {
        let mut builder = ArchiveBuilder::new(Cursor::new(Vec::new()), 12);
        for shade in 0..12u8 {
            builder.add_page(&solid_jpeg(shade)).unwrap();
        }
        let out = builder.finish().unwrap();

        let mut archive = zip::ZipArchive::new(out).unwrap();
        assert_eq!(archive.len(), 12);
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names[0], "01.jpg");
        assert_eq!(names[9], "10.jpg");
        assert_eq!(names[11], "12.jpg");
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn entry_bytes_round_trip() {
        let jpeg = solid_jpeg(99);
        let mut builder = ArchiveBuilder::new(Cursor::new(Vec::new()), 1);
        builder.add_page(&jpeg).unwrap();
        let out = builder.finish().unwrap();

        let mut archive = zip::ZipArchive::new(out).unwrap();
        let mut entry = archive.by_name("1.jpg").unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, jpeg);
    }

    #[test]
    fn single_digit_total_uses_single_digit_names() {
        let mut builder = ArchiveBuilder::new(Cursor::new(Vec::new()), 3);
        builder.add_page(&solid_jpeg(1)).unwrap();
        let out = builder.finish().unwrap();
        let mut archive = zip::ZipArchive::new(out).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "1.jpg");
    }
}
