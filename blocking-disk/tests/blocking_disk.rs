use std::sync::{Arc, Mutex};

use block_dev::{BLOCK_SIZE, BlockDevice, DiskOperation, PolledDevice, RamDisk};
use blocking_disk::{BlockingDisk, MAX_REQUESTS};
use scheduler::{Dispatcher, Scheduler, Tid};

/// 只记录分派顺序，立即返回；当前线程固定
struct Recorder {
    current: Tid,
    dispatched: Mutex<Vec<usize>>,
}

impl Recorder {
    fn new(current: usize) -> Arc<Self> {
        Arc::new(Self {
            current: Tid::new(current),
            dispatched: Mutex::new(Vec::new()),
        })
    }

    fn dispatched(&self) -> Vec<usize> {
        self.dispatched.lock().unwrap().clone()
    }
}

impl Dispatcher for Recorder {
    fn dispatch_to(&self, thread: Tid) {
        self.dispatched.lock().unwrap().push(thread.id());
    }

    fn current_thread(&self) -> Tid {
        self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Issue,
    Poll(bool),
    Transfer,
}

/// 记录控制器上发生的每个动作
struct Probe {
    inner: RamDisk,
    events: Mutex<Vec<Event>>,
}

impl Probe {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl PolledDevice for Probe {
    fn issue_operation(&self, op: DiskOperation, block_id: usize) {
        self.events.lock().unwrap().push(Event::Issue);
        self.inner.issue_operation(op, block_id);
    }

    fn is_ready(&self) -> bool {
        let ready = self.inner.is_ready();
        self.events.lock().unwrap().push(Event::Poll(ready));
        ready
    }

    fn read_sector(&self, block_id: usize, buf: &mut [u8]) {
        self.events.lock().unwrap().push(Event::Transfer);
        self.inner.read_sector(block_id, buf);
    }

    fn write_sector(&self, block_id: usize, buf: &[u8]) {
        self.events.lock().unwrap().push(Event::Transfer);
        self.inner.write_sector(block_id, buf);
    }

    fn blocks(&self) -> usize {
        self.inner.blocks()
    }
}

fn setup(
    current: usize,
    device: Arc<dyn PolledDevice>,
) -> (Arc<Recorder>, Arc<Scheduler>, Arc<BlockingDisk>) {
    let recorder = Recorder::new(current);
    let scheduler = Arc::new(Scheduler::new(recorder.clone()));
    let disk = BlockingDisk::new(device, scheduler.clone());
    (recorder, scheduler, disk)
}

#[test]
fn read_waits_for_device_ready() {
    let ram = RamDisk::new(16, 2);
    ram.write_sector(4, &[b'R'; BLOCK_SIZE]);
    let probe = Arc::new(Probe {
        inner: ram,
        events: Mutex::new(Vec::new()),
    });
    let (recorder, scheduler, disk) = setup(1, probe.clone());
    scheduler.add(Tid::new(2));

    let mut buf = [0; BLOCK_SIZE];
    disk.read(4, &mut buf);

    // 线程 1 的请求未就绪，先让给排在后面的线程 2
    assert_eq!(recorder.dispatched(), [2, 1]);
    assert_eq!(buf, [b'R'; BLOCK_SIZE]);

    let events = probe.events();
    assert_eq!(events[0], Event::Issue);
    assert_eq!(events[1], Event::Poll(false));
    let first_ready = events.iter().position(|&e| e == Event::Poll(true)).unwrap();
    let transfer = events.iter().position(|&e| e == Event::Transfer).unwrap();
    assert!(first_ready < transfer);
    assert!(disk.requests().is_empty());
}

#[test]
fn write_reaches_device_before_returning() {
    let ram = Arc::new(RamDisk::new(16, 3));
    let (recorder, _scheduler, disk) = setup(1, ram.clone());

    disk.write(7, &[0x42; BLOCK_SIZE]);

    let mut buf = [0; BLOCK_SIZE];
    ram.read_sector(7, &mut buf);
    assert_eq!(buf, [0x42; BLOCK_SIZE]);
    assert_eq!(recorder.dispatched(), [1]);
    assert!(disk.requests().is_empty());
}

#[test]
fn consecutive_requests_reuse_slots() {
    let ram = Arc::new(RamDisk::new(16, 1));
    let (_recorder, _scheduler, disk) = setup(3, ram.clone());
    let dev: Arc<dyn BlockDevice> = disk.clone();

    for block in 0..MAX_REQUESTS + 5 {
        dev.write_block(block % 16, &[block as u8; BLOCK_SIZE]);
    }

    let mut buf = [0; BLOCK_SIZE];
    dev.read_block(15, &mut buf);
    assert_eq!(buf, [15; BLOCK_SIZE]);
    dev.read_block(0, &mut buf);
    assert_eq!(buf, [16; BLOCK_SIZE]);
}

#[test]
fn full_request_table_drops_operation() {
    let ram = Arc::new(RamDisk::new(16, 0));
    let (recorder, scheduler, disk) = setup(1, ram);
    for i in 0..MAX_REQUESTS {
        assert!(disk.push(Tid::new(100 + i), DiskOperation::Read, i % 16, None).is_some());
    }

    let mut buf = [9; BLOCK_SIZE];
    disk.read(3, &mut buf);

    assert_eq!(buf, [9; BLOCK_SIZE]);
    // 被丢弃的操作仍然让出一次
    assert_eq!(recorder.dispatched(), [1]);
    assert!(scheduler.is_empty());
    assert_eq!(disk.requests().len(), MAX_REQUESTS);
}

#[test]
fn cancel_only_touches_that_thread() {
    let ram = Arc::new(RamDisk::new(16, 0));
    let (_recorder, _scheduler, disk) = setup(1, ram);
    disk.push(Tid::new(5), DiskOperation::Read, 1, None);
    disk.push(Tid::new(6), DiskOperation::Write, 2, Some(&[1; BLOCK_SIZE]));
    disk.push(Tid::new(5), DiskOperation::Read, 3, None);

    disk.cancel(Tid::new(5));

    let requests = disk.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].thread(), Tid::new(6));
    assert_eq!(requests[0].block_id(), 2);
}

#[test]
fn scheduler_completes_requests_of_other_threads_when_they_reach_front() {
    let ram = Arc::new(RamDisk::new(16, 0));
    ram.write_sector(9, &[0xEE; BLOCK_SIZE]);
    let (recorder, scheduler, disk) = setup(1, ram);

    // 线程 2 此前发出的读请求仍挂在表上
    let slot = disk.push(Tid::new(2), DiskOperation::Read, 9, None).unwrap();
    scheduler.add(Tid::new(2));
    scheduler.yield_now();

    assert_eq!(recorder.dispatched(), [2]);
    let request = disk.pop(slot).unwrap();
    assert_eq!(request.buffer(), &[0xEE; BLOCK_SIZE]);
}
