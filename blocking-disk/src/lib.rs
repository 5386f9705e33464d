//! # 阻塞磁盘驱动
//!
//! 包装轮询式控制器：读写请求立即发往设备，但调用者随即让出处理器，
//! 直到调度器在某次分派前发现设备就绪、替它搬运完数据，调用才返回。
//!
//! 驱动不自行轮询，只通过 [`IoCompletion`](scheduler::IoCompletion)
//! 向调度器报告“哪个线程有哪些请求未完成”，并按槽位完成搬运。

#![no_std]

extern crate alloc;

mod disk;
mod request;

pub use self::{
    disk::BlockingDisk,
    request::{DiskRequest, RequestState, RequestTable},
};

/// 未完成请求表的容量
pub const MAX_REQUESTS: usize = 20;
