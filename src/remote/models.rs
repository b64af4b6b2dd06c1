use image::DynamicImage;
use serde::Deserialize;

/// /chapter 响应中与下载相关的部分。
#[derive(Debug, Deserialize)]
pub struct ChapterData {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// 一张待下载的图片。
#[derive(Debug, Clone)]
pub struct PhotoImage {
    pub name: String,
    pub url: String,
}

/// 组装一个本子所需的全部远端信息。
#[derive(Debug, Clone)]
pub struct PhotoMetadata {
    pub id: u32,
    pub name: String,
    pub scramble_id: u32,
    pub images: Vec<PhotoImage>,
}

/// 已下载并解码的图片，顺序由下载池保证。
pub struct RawImage {
    pub name: String,
    pub bitmap: DynamicImage,
}

/// 拼出图片的完整下载地址。
pub fn image_url(img_host: &str, photo_id: u32, filename: &str) -> String {
    format!(
        "{}/media/photos/{photo_id}/{filename}",
        img_host.trim_end_matches('/')
    )
}

/// 上游有时把数字字段序列化为字符串, 两种都接受。
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(v) => Ok(v),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_id_accepts_string_and_int() {
        let a: ChapterData =
            serde_json::from_str(r#"{"id":"12345","name":"n","images":["1.jpg"]}"#).unwrap();
        assert_eq!(a.id, 12345);

        let b: ChapterData =
            serde_json::from_str(r#"{"id":12345,"name":"n","images":[]}"#).unwrap();
        assert_eq!(b.id, 12345);
    }

    #[test]
    fn image_url_strips_trailing_slash() {
        assert_eq!(
            image_url("https://img.example.net/", 422_866, "00001.webp"),
            "https://img.example.net/media/photos/422866/00001.webp"
        );
    }
}
