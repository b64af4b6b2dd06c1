//! 图片反打乱：切片数推导与横条逆置换。

pub mod descramble;
pub mod slice_count;
