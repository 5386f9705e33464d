//! 定长环形预备队列
//!
//! 除了 `front`/`next` 两个下标，另记活跃项数 `count`，
//! 空与满因此不会混淆。

use crate::{MAX_QUEUE_SIZE, Tid};

/// [`ReadyQueue::push_back`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    /// 已在队列中，未作改动
    Duplicate,
    /// 队列已满，丢弃
    Full,
}

#[derive(Debug)]
pub struct ReadyQueue {
    slots: [Option<Tid>; MAX_QUEUE_SIZE],
    /// 队首
    front: usize,
    /// 下一个入队位置
    next: usize,
    count: usize,
}

impl ReadyQueue {
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_QUEUE_SIZE],
            front: 0,
            next: 0,
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
        self.count == MAX_QUEUE_SIZE
    }

    pub fn contains(&self, thread: Tid) -> bool {
        self.iter().any(|t| t == thread)
    }

    /// 自队首至队尾
    pub fn iter(&self) -> impl Iterator<Item = Tid> + '_ {
        (0..self.count).filter_map(move |i| self.slots[self.index(i)])
    }

    pub fn push_back(&mut self, thread: Tid) -> Enqueue {
        if self.is_full() {
            return Enqueue::Full;
        }
        if self.contains(thread) {
            return Enqueue::Duplicate;
        }

        self.slots[self.next] = Some(thread);
        self.next = (self.next + 1) % MAX_QUEUE_SIZE;
        self.count += 1;
        Enqueue::Queued
    }

    pub fn pop_front(&mut self) -> Option<Tid> {
        if self.is_empty() {
            return None;
        }

        let thread = self.slots[self.front].take();
        self.front = (self.front + 1) % MAX_QUEUE_SIZE;
        self.count -= 1;
        thread
    }

    /// 移除 `thread`，其后各项依次前移一格。
    /// 未找到则返回 `false`。
    pub fn remove(&mut self, thread: Tid) -> bool {
        let Some(pos) = self.iter().position(|t| t == thread) else {
            return false;
        };

        for i in pos..self.count - 1 {
            self.slots[self.index(i)] = self.slots[self.index(i + 1)];
        }
        let last = self.index(self.count - 1);
        self.slots[last] = None;
        self.next = last;
        self.count -= 1;
        true
    }

    /// 队内第 `i` 项在环形数组中的下标
    #[inline]
    fn index(&self, i: usize) -> usize {
        (self.front + i) % MAX_QUEUE_SIZE
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    fn tids(queue: &ReadyQueue) -> Vec<usize> {
        queue.iter().map(Tid::id).collect()
    }

    #[test]
    fn fifo_order() {
        let mut queue = ReadyQueue::new();
        for i in 1..=3 {
            assert_eq!(queue.push_back(Tid::new(i)), Enqueue::Queued);
        }

        assert_eq!(queue.pop_front(), Some(Tid::new(1)));
        assert_eq!(queue.pop_front(), Some(Tid::new(2)));
        assert_eq!(queue.pop_front(), Some(Tid::new(3)));
        assert_eq!(queue.pop_front(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicate_push_changes_nothing() {
        let mut queue = ReadyQueue::new();
        queue.push_back(Tid::new(1));
        queue.push_back(Tid::new(2));

        assert_eq!(queue.push_back(Tid::new(1)), Enqueue::Duplicate);
        assert_eq!(tids(&queue), [1, 2]);
    }

    #[test]
    fn full_queue_rejects() {
        let mut queue = ReadyQueue::new();
        for i in 0..MAX_QUEUE_SIZE {
            assert_eq!(queue.push_back(Tid::new(i)), Enqueue::Queued);
        }

        assert!(queue.is_full());
        assert_eq!(queue.push_back(Tid::new(MAX_QUEUE_SIZE)), Enqueue::Full);
        assert_eq!(queue.len(), MAX_QUEUE_SIZE);
    }

    #[test]
    fn remove_compacts_across_wraparound() {
        let mut queue = ReadyQueue::new();
        // 让队首移动到数组末尾附近
        for i in 0..MAX_QUEUE_SIZE - 2 {
            queue.push_back(Tid::new(100 + i));
            queue.pop_front();
        }
        for i in 1..=5 {
            queue.push_back(Tid::new(i));
        }

        assert!(queue.remove(Tid::new(2)));
        assert_eq!(tids(&queue), [1, 3, 4, 5]);
        assert!(!queue.remove(Tid::new(2)));

        queue.push_back(Tid::new(6));
        assert_eq!(tids(&queue), [1, 3, 4, 5, 6]);
    }

    #[test]
    fn remove_last_then_refill() {
        let mut queue = ReadyQueue::new();
        queue.push_back(Tid::new(1));
        queue.push_back(Tid::new(2));

        assert!(queue.remove(Tid::new(2)));
        assert!(queue.remove(Tid::new(1)));
        assert!(queue.is_empty());

        queue.push_back(Tid::new(3));
        assert_eq!(queue.pop_front(), Some(Tid::new(3)));
    }
}
