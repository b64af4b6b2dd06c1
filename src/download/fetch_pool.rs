//! 有界并发图片下载池。
//!
//! 固定数量的工作线程从任务队列取图下载解码, 单张失败只告警不中断,
//! 最终按原始顺序返回成活的图。

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::DynamicImage;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION};
use tracing::{debug, warn};

use super::progress::ProgressReporter;
use crate::remote::models::{PhotoImage, RawImage};
use crate::scramble::slice_count::is_animated;

/// 图片字节来源, 测试时可替换为内存桩。
pub trait ImageSource: Send + Sync {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

pub struct HttpImageSource {
    client: reqwest::blocking::Client,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "*/*")
            .header(ACCEPT_ENCODING, "identity")
            .header(CONNECTION, "keep-alive")
            .send()?
            .error_for_status()?;
        Ok(resp.bytes()?.to_vec())
    }
}

type FetchEvent = (usize, Option<DynamicImage>);

pub struct FetchPool {
    workers: usize,
}

impl FetchPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.clamp(1, 32),
        }
    }

    /// 并发下载全部图片, 返回按原始顺序排列的成活图。
    ///
    /// 动图不经过下载直接跳过; 失败与跳过都计入进度, 不计入结果。
    pub fn download_all(
        &self,
        source: Arc<dyn ImageSource>,
        images: &[PhotoImage],
        progress: &mut ProgressReporter,
    ) -> Vec<RawImage> {
        if images.is_empty() {
            return Vec::new();
        }

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, PhotoImage)>();
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<FetchEvent>();

        for (idx, img) in images.iter().enumerate() {
            if is_animated(&img.name) {
                debug!("跳过动图 {}", img.name);
                let _ = event_tx.send((idx, None));
            } else {
                let _ = job_tx.send((idx, img.clone()));
            }
        }
        drop(job_tx);

        let worker_count = self.workers.min(images.len());
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let job_rx = job_rx.clone();
            let event_tx = event_tx.clone();
            let source = Arc::clone(&source);
            handles.push(thread::spawn(move || {
                while let Ok((idx, img)) = job_rx.recv() {
                    let bitmap = match source.fetch(&img.url) {
                        Ok(bytes) => match image::load_from_memory(&bytes) {
                            Ok(decoded) => Some(decoded),
                            Err(err) => {
                                warn!("图片解码失败 {}: {err}", img.name);
                                None
                            }
                        },
                        Err(err) => {
                            warn!("图片下载失败 {}: {err}", img.name);
                            None
                        }
                    };
                    let _ = event_tx.send((idx, bitmap));
                }
            }));
        }
        drop(event_tx);

        let mut slots: Vec<Option<DynamicImage>> = Vec::new();
        slots.resize_with(images.len(), || None);
        for _ in 0..images.len() {
            match event_rx.recv() {
                Ok((idx, bitmap)) => {
                    slots[idx] = bitmap;
                    progress.inc_completed();
                }
                Err(_) => break,
            }
        }

        for handle in handles {
            let _ = handle.join();
        }

        images
            .iter()
            .zip(slots)
            .filter_map(|(img, slot)| {
                slot.map(|bitmap| RawImage {
                    name: img.name.clone(),
                    bitmap,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::ProgressSnapshot;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([7, 7, 7]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    struct StubSource {
        fail_on: Option<&'static str>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        total_fetches: AtomicUsize,
    }

    impl StubSource {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                fail_on,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                total_fetches: AtomicUsize::new(0),
            }
        }
    }

    impl ImageSource for StubSource {
        fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
            self.total_fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(25));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.is_some_and(|needle| url.contains(needle)) {
                anyhow::bail!("simulated fetch failure for {url}");
            }
            Ok(png_bytes())
        }
    }

    fn photo_images(names: &[&str]) -> Vec<PhotoImage> {
        names
            .iter()
            .map(|name| PhotoImage {
                name: name.to_string(),
                url: format!("https://img.example.net/media/photos/1/{name}"),
            })
            .collect()
    }

    #[test]
    fn concurrency_stays_within_worker_limit() {
        let source = Arc::new(StubSource::new(None));
        let images = photo_images(&["00001.webp", "00002.webp", "00003.webp", "00004.webp", "00005.webp"]);

        let events: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut progress = ProgressReporter::new(
            images.len(),
            Some(Box::new(move |s| sink.lock().unwrap().push(s))),
        );

        let survivors =
            FetchPool::new(2).download_all(Arc::clone(&source) as Arc<dyn ImageSource>, &images, &mut progress);

        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(survivors.len(), 5);
        let names: Vec<_> = survivors.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["00001.webp", "00002.webp", "00003.webp", "00004.webp", "00005.webp"]);
        assert_eq!(events.lock().unwrap().len(), 5);
    }

    #[test]
    fn failed_image_is_dropped_but_order_survives() {
        let source = Arc::new(StubSource::new(Some("00003")));
        let images = photo_images(&["00001.webp", "00002.webp", "00003.webp", "00004.webp", "00005.webp"]);

        let last: Arc<Mutex<Option<ProgressSnapshot>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&last);
        let mut progress = ProgressReporter::new(
            images.len(),
            Some(Box::new(move |s| *sink.lock().unwrap() = Some(s))),
        );

        let survivors =
            FetchPool::new(3).download_all(source as Arc<dyn ImageSource>, &images, &mut progress);

        let names: Vec<_> = survivors.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["00001.webp", "00002.webp", "00004.webp", "00005.webp"]);
        assert_eq!(
            last.lock().unwrap().unwrap(),
            ProgressSnapshot {
                completed: 5,
                remaining: 0,
                total: 5
            }
        );
    }

    #[test]
    fn animated_images_are_skipped_without_fetching() {
        let source = Arc::new(StubSource::new(None));
        let images = photo_images(&["00001.webp", "00002.gif", "00003.webp"]);

        let mut progress = ProgressReporter::new(images.len(), Some(Box::new(|_| {})));
        let survivors =
            FetchPool::new(4).download_all(Arc::clone(&source) as Arc<dyn ImageSource>, &images, &mut progress);

        assert_eq!(source.total_fetches.load(Ordering::SeqCst), 2);
        let names: Vec<_> = survivors.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["00001.webp", "00003.webp"]);
        assert_eq!(progress.snapshot().completed, 3);
    }

    #[test]
    fn http_source_construction_succeeds() {
        assert!(HttpImageSource::new(Duration::from_secs(1)).is_ok());
    }
}
