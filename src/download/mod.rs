//! 图片下载池与端到端流水线。

pub mod fetch_pool;
pub mod pipeline;
pub mod progress;
