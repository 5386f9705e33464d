//! 内存盘：带有固定轮询延迟的 [`PolledDevice`]

use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::{BLOCK_SIZE, DiskOperation, PolledDevice};

type Sector = [u8; BLOCK_SIZE];

/// 每次发出操作后，需要被轮询 `latency` 次才报告就绪
#[derive(Debug)]
pub struct RamDisk {
    sectors: Mutex<Vec<Sector>>,
    latency: usize,
    /// 距离就绪还需的轮询次数
    remaining: AtomicUsize,
}

impl RamDisk {
    pub fn new(blocks: usize, latency: usize) -> Self {
        Self {
            sectors: Mutex::new(vec![[0; BLOCK_SIZE]; blocks]),
            latency,
            remaining: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn latency(&self) -> usize {
        self.latency
    }
}

impl PolledDevice for RamDisk {
    fn issue_operation(&self, op: DiskOperation, block_id: usize) {
        log::trace!("ram disk: issue {op:?} block={block_id}");
        self.remaining.store(self.latency, Ordering::Release);
    }

    fn is_ready(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_err()
    }

    fn read_sector(&self, block_id: usize, buf: &mut [u8]) {
        assert_eq!(buf.len(), BLOCK_SIZE, "not a complete block!");
        buf.copy_from_slice(&self.sectors.lock()[block_id]);
    }

    fn write_sector(&self, block_id: usize, buf: &[u8]) {
        assert_eq!(buf.len(), BLOCK_SIZE, "not a complete block!");
        self.sectors.lock()[block_id].copy_from_slice(buf);
    }

    #[inline]
    fn blocks(&self) -> usize {
        self.sectors.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_after_latency_polls() {
        let disk = RamDisk::new(4, 2);
        assert!(disk.is_ready());

        disk.issue_operation(DiskOperation::Read, 1);
        assert!(!disk.is_ready());
        assert!(!disk.is_ready());
        assert!(disk.is_ready());
        assert!(disk.is_ready());
    }

    #[test]
    fn sectors_keep_their_data() {
        let disk = RamDisk::new(4, 0);
        disk.write_sector(3, &[7; BLOCK_SIZE]);

        let mut buf = [0; BLOCK_SIZE];
        disk.read_sector(3, &mut buf);
        assert_eq!(buf, [7; BLOCK_SIZE]);
        disk.read_sector(2, &mut buf);
        assert_eq!(buf, [0; BLOCK_SIZE]);
    }
}
