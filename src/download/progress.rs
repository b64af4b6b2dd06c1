use indicatif::{ProgressBar, ProgressStyle};

/// 下载进度快照, 每完成一张图更新一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub remaining: usize,
    pub total: usize,
}

pub type ProgressCallback = Box<dyn Fn(ProgressSnapshot) + Send>;

/// 进度上报器。带回调时走回调（web 场景）, 否则落到终端进度条。
pub struct ProgressReporter {
    completed: usize,
    total: usize,
    callback: Option<ProgressCallback>,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(total: usize, callback: Option<ProgressCallback>) -> Self {
        let bar = if callback.is_none() {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            Some(bar)
        } else {
            None
        };
        Self {
            completed: 0,
            total,
            callback,
            bar,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed,
            remaining: self.total - self.completed,
            total: self.total,
        }
    }

    /// 记一张完成（成功失败都算, 容错统计在上层做）。
    pub fn inc_completed(&mut self) {
        if self.completed < self.total {
            self.completed += 1;
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
        if let Some(cb) = &self.callback {
            cb(self.snapshot());
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn callback_sees_each_completion() {
        let seen: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut reporter = ProgressReporter::new(
            3,
            Some(Box::new(move |s| sink.lock().unwrap().push(s))),
        );

        reporter.inc_completed();
        reporter.inc_completed();
        reporter.inc_completed();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[2],
            ProgressSnapshot {
                completed: 3,
                remaining: 0,
                total: 3
            }
        );
    }

    #[test]
    fn callback_mode_does_not_create_terminal_bar() {
        let reporter = ProgressReporter::new(3, Some(Box::new(|_| {})));
        assert!(reporter.bar.is_none());

        let reporter = ProgressReporter::new(3, None);
        assert!(reporter.bar.is_some());
    }

    #[test]
    fn completed_never_exceeds_total() {
        let mut reporter = ProgressReporter::new(1, Some(Box::new(|_| {})));
        reporter.inc_completed();
        reporter.inc_completed();
        assert_eq!(reporter.snapshot().completed, 1);
    }
}
