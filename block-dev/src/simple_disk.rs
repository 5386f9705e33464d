//! 忙等磁盘：发出操作后原地轮询，直到控制器就绪再搬运数据。
//! 没有调度器参与，调用者在等待期间独占处理器。

use alloc::sync::Arc;

use crate::{BlockDevice, DiskOperation, PolledDevice};

#[derive(Debug)]
pub struct SimpleDisk<D: ?Sized = dyn PolledDevice> {
    device: Arc<D>,
}

impl<D: PolledDevice + ?Sized> SimpleDisk<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    fn wait_until_ready(&self) {
        while !self.device.is_ready() {
            core::hint::spin_loop();
        }
    }
}

impl<D: PolledDevice + ?Sized> BlockDevice for SimpleDisk<D> {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        self.device.issue_operation(DiskOperation::Read, block_id);
        self.wait_until_ready();
        self.device.read_sector(block_id, buf);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        self.device.issue_operation(DiskOperation::Write, block_id);
        self.wait_until_ready();
        self.device.write_sector(block_id, buf);
    }

    #[inline]
    fn blocks(&self) -> usize {
        self.device.blocks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BLOCK_SIZE, RamDisk};

    #[test]
    fn busy_waits_through_latency() {
        let ram = Arc::new(RamDisk::new(8, 5));
        let disk = SimpleDisk::new(ram.clone());

        disk.write_block(6, &[0xAB; BLOCK_SIZE]);
        let mut buf = [0; BLOCK_SIZE];
        disk.read_block(6, &mut buf);

        assert_eq!(buf, [0xAB; BLOCK_SIZE]);
        // 每次操作都已把延迟耗尽
        assert!(ram.is_ready());
    }
}
