use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::{BLOCK_SIZE, BlockDevice, DiskOperation, PolledDevice};
use scheduler::{IoCompletion, Scheduler, Tid};
use spin::Mutex;

use crate::{DiskRequest, RequestState, RequestTable};

pub struct BlockingDisk {
    device: Arc<dyn PolledDevice>,
    scheduler: Arc<Scheduler>,
    requests: Mutex<RequestTable>,
}

impl BlockingDisk {
    /// 创建驱动并登记到调度器
    pub fn new(device: Arc<dyn PolledDevice>, scheduler: Arc<Scheduler>) -> Arc<Self> {
        let disk = Arc::new(Self {
            device,
            scheduler: scheduler.clone(),
            requests: Mutex::new(RequestTable::new()),
        });
        scheduler.attach(&disk);
        disk
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn PolledDevice> {
        &self.device
    }

    /// 读出一整块。返回时数据已经到达 `buf`。
    pub fn read(&self, block_id: usize, buf: &mut [u8]) {
        assert_eq!(buf.len(), BLOCK_SIZE, "not a complete block!");
        if let Some(request) = self.submit(DiskOperation::Read, block_id, None) {
            buf.copy_from_slice(request.buffer());
        }
    }

    /// 写入一整块。返回时数据已经到达设备。
    pub fn write(&self, block_id: usize, buf: &[u8]) {
        assert_eq!(buf.len(), BLOCK_SIZE, "not a complete block!");
        self.submit(DiskOperation::Write, block_id, Some(buf));
    }

    /// 登记请求。表满时丢弃并返回空，操作就此丢失。
    pub fn push(
        &self,
        thread: Tid,
        op: DiskOperation,
        block_id: usize,
        payload: Option<&[u8]>,
    ) -> Option<usize> {
        let slot = self.requests.lock().push(thread, op, block_id, payload);
        if slot.is_none() {
            log::warn!("max request count exceeded, {op:?} of block {block_id} by thread {thread} dropped");
        }
        slot
    }

    /// 退役槽位 `slot`
    pub fn pop(&self, slot: usize) -> Option<DiskRequest> {
        let request = self.requests.lock().pop(slot);
        if request.is_none() {
            log::warn!("no blocked request in slot {slot}");
        }
        request
    }

    /// 从设备读出槽位 `slot` 对应的块
    pub fn read_from_port(&self, slot: usize) {
        self.transfer(slot, DiskOperation::Read);
    }

    /// 把槽位 `slot` 的数据写入设备
    pub fn write_to_port(&self, slot: usize) {
        self.transfer(slot, DiskOperation::Write);
    }

    #[inline]
    pub fn is_device_ready(&self) -> bool {
        self.device.is_ready()
    }

    /// 撤销 `thread` 名下的所有请求，线程退出时使用
    pub fn cancel(&self, thread: Tid) {
        let count = self.requests.lock().cancel(thread);
        if count == 0 {
            log::debug!("thread {thread} has no blocked request");
        } else {
            log::info!("cancelled {count} request(s) of thread {thread}");
        }
    }

    /// 活跃请求的快照，自最早者起
    pub fn requests(&self) -> Vec<DiskRequest> {
        let requests = self.requests.lock();
        requests
            .live_slots()
            .map(|slot| requests.get(slot).clone())
            .collect()
    }

    /// 发出操作、登记请求，然后反复让出处理器，
    /// 直到调度器替本线程完成搬运。
    fn submit(
        &self,
        op: DiskOperation,
        block_id: usize,
        payload: Option<&[u8]>,
    ) -> Option<DiskRequest> {
        let me = self.scheduler.current();
        self.device.issue_operation(op, block_id);
        let Some(slot) = self.push(me, op, block_id, payload) else {
            // 丢弃的操作同样经过一次让出点
            self.scheduler.reschedule();
            return None;
        };
        log::trace!("thread {me} blocked on {op:?} of block {block_id}");

        loop {
            self.scheduler.reschedule();

            let requests = self.requests.lock();
            let request = requests.get(slot);
            if request.thread() != me || request.state() == RequestState::Retired {
                log::warn!("{op:?} of block {block_id} by thread {me} was cancelled");
                return None;
            }
            if request.state() == RequestState::Ready {
                break;
            }
        }

        self.pop(slot)
    }

    fn transfer(&self, slot: usize, op: DiskOperation) {
        let mut requests = self.requests.lock();
        let request = requests.get_mut(slot);
        if request.state() != RequestState::Issued || request.op() != op {
            log::warn!("slot {slot} holds no issued {op:?}");
            return;
        }

        let block_id = request.block_id();
        match op {
            DiskOperation::Read => self.device.read_sector(block_id, request.buffer_mut()),
            DiskOperation::Write => self.device.write_sector(block_id, request.buffer()),
        }
        request.set_ready();
    }
}

impl IoCompletion for BlockingDisk {
    fn pending_for(&self, thread: Tid) -> Vec<usize> {
        self.requests.lock().pending_for(thread)
    }

    fn is_device_ready(&self) -> bool {
        BlockingDisk::is_device_ready(self)
    }

    fn complete(&self, slot: usize) {
        let op = self.requests.lock().get(slot).op();
        match op {
            DiskOperation::Read => self.read_from_port(slot),
            DiskOperation::Write => self.write_to_port(slot),
        }
    }
}

impl BlockDevice for BlockingDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        self.read(block_id, buf);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        self.write(block_id, buf);
    }

    #[inline]
    fn blocks(&self) -> usize {
        self.device.blocks()
    }
}
