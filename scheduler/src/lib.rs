//! # 协作式调度器
//!
//! 线程只在显式的让出点交出处理器。调度器除了决定下一个运行的线程，
//! 还兼任轮询式磁盘的“完成泵”：分派某个线程之前，先替它检查未完成的
//! 磁盘请求，设备就绪就搬运数据，未就绪就把它放回队尾。
//!
//! 上下文切换由外部的 [`Dispatcher`] 提供，磁盘驱动通过
//! [`IoCompletion`] 向调度器暴露最小的完成接口。

#![no_std]

extern crate alloc;

mod ready_queue;
mod manager;

use alloc::vec::Vec;
use core::fmt;

use derive_more::{From, Into};

pub use self::{
    ready_queue::{Enqueue, ReadyQueue},
    manager::Scheduler,
};

/// 预备队列容量
pub const MAX_QUEUE_SIZE: usize = 20;

/// 线程句柄，只用于存储与比较
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct Tid(usize);

impl Tid {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn id(self) -> usize {
        self.0
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 上下文切换边界
pub trait Dispatcher: Send + Sync {
    /// 把处理器交给 `thread`。
    /// 直到调用者自己再次被分派才返回；分派给自己则立即返回。
    fn dispatch_to(&self, thread: Tid);

    /// 当前正在运行的线程
    fn current_thread(&self) -> Tid;
}

/// 磁盘驱动交给调度器的完成接口
pub trait IoCompletion: Send + Sync {
    /// `thread` 名下已发出、尚未完成搬运的请求槽位，按发出顺序
    fn pending_for(&self, thread: Tid) -> Vec<usize>;

    fn is_device_ready(&self) -> bool;

    /// 为槽位 `slot` 搬运数据。只应在设备就绪后调用。
    fn complete(&self, slot: usize);
}
