//! 未完成请求表
//!
//! 定长槽位池，按 `front`/`rear` 形成 FIFO 窗口。
//! 每个槽位拥有自己的块缓冲，从发出到退役都不与其它请求共享。

use alloc::vec::Vec;
use core::fmt;

use block_dev::{BLOCK_SIZE, DiskOperation};
use scheduler::Tid;

use crate::MAX_REQUESTS;

/// 槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// 已发往设备，尚未搬运
    Issued,
    /// 已搬运，等待发起者取走
    Ready,
    /// 空闲
    Retired,
}

#[derive(Clone)]
pub struct DiskRequest {
    thread: Tid,
    op: DiskOperation,
    block_id: usize,
    buffer: [u8; BLOCK_SIZE],
    state: RequestState,
}

impl DiskRequest {
    const RETIRED: Self = Self {
        thread: Tid::new(0),
        op: DiskOperation::Read,
        block_id: 0,
        buffer: [0; BLOCK_SIZE],
        state: RequestState::Retired,
    };

    #[inline]
    pub fn thread(&self) -> Tid {
        self.thread
    }

    #[inline]
    pub fn op(&self) -> DiskOperation {
        self.op
    }

    #[inline]
    pub fn block_id(&self) -> usize {
        self.block_id
    }

    #[inline]
    pub fn state(&self) -> RequestState {
        self.state
    }

    #[inline]
    pub fn buffer(&self) -> &[u8; BLOCK_SIZE] {
        &self.buffer
    }

    #[inline]
    pub(crate) fn buffer_mut(&mut self) -> &mut [u8; BLOCK_SIZE] {
        &mut self.buffer
    }

    #[inline]
    pub(crate) fn set_ready(&mut self) {
        self.state = RequestState::Ready;
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.state != RequestState::Retired
    }
}

impl fmt::Debug for DiskRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskRequest")
            .field("thread", &self.thread)
            .field("op", &self.op)
            .field("block_id", &self.block_id)
            .field("state", &self.state)
            .finish()
    }
}

#[derive(Debug)]
pub struct RequestTable {
    slots: [DiskRequest; MAX_REQUESTS],
    /// 最早的活跃槽位
    front: usize,
    /// 下一次分配从此处开始查找
    rear: usize,
    count: usize,
}

impl RequestTable {
    pub const fn new() -> Self {
        Self {
            slots: [DiskRequest::RETIRED; MAX_REQUESTS],
            front: 0,
            rear: 0,
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == MAX_REQUESTS
    }

    /// 登记一个已发出的请求，返回其槽位；表满时返回空。
    /// 写请求的数据在此复制进槽位缓冲。
    pub fn push(
        &mut self,
        thread: Tid,
        op: DiskOperation,
        block_id: usize,
        payload: Option<&[u8]>,
    ) -> Option<usize> {
        if self.is_full() {
            return None;
        }

        let slot = (0..MAX_REQUESTS)
            .map(|i| (self.rear + i) % MAX_REQUESTS)
            .find(|&slot| !self.slots[slot].is_live())?;

        let request = &mut self.slots[slot];
        request.thread = thread;
        request.op = op;
        request.block_id = block_id;
        request.state = RequestState::Issued;
        match payload {
            Some(data) => request.buffer.copy_from_slice(data),
            None => request.buffer.fill(0),
        }

        if self.is_empty() {
            self.front = slot;
        }
        self.rear = (slot + 1) % MAX_REQUESTS;
        self.count += 1;
        Some(slot)
    }

    /// 退役槽位 `slot`，返回其中的请求。
    /// 槽位本就空闲时返回空。
    pub fn pop(&mut self, slot: usize) -> Option<DiskRequest> {
        if !self.slots[slot].is_live() {
            return None;
        }

        let request = self.slots[slot].clone();
        self.slots[slot].state = RequestState::Retired;
        self.count -= 1;

        // 窗口前沿越过已退役的槽位
        if self.is_empty() {
            self.front = self.rear;
        } else {
            while !self.slots[self.front].is_live() {
                self.front = (self.front + 1) % MAX_REQUESTS;
            }
        }

        Some(request)
    }

    #[inline]
    pub fn get(&self, slot: usize) -> &DiskRequest {
        &self.slots[slot]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, slot: usize) -> &mut DiskRequest {
        &mut self.slots[slot]
    }

    /// 活跃槽位，自最早者起
    pub fn live_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_REQUESTS)
            .map(|i| (self.front + i) % MAX_REQUESTS)
            .filter(|&slot| self.slots[slot].is_live())
    }

    /// `thread` 名下尚未搬运的槽位
    pub fn pending_for(&self, thread: Tid) -> Vec<usize> {
        self.live_slots()
            .filter(|&slot| {
                let request = &self.slots[slot];
                request.thread == thread && request.state == RequestState::Issued
            })
            .collect()
    }

    /// 退役 `thread` 名下的所有请求，返回数量
    pub fn cancel(&mut self, thread: Tid) -> usize {
        let slots: Vec<usize> = self
            .live_slots()
            .filter(|&slot| self.slots[slot].thread == thread)
            .collect();
        for &slot in &slots {
            self.pop(slot);
        }
        slots.len()
    }
}

impl Default for RequestTable {
    fn default() -> Self {
        Self::new()
    }
}
