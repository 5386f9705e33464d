use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use block_dev::{BLOCK_SIZE, DiskOperation, PolledDevice};

/// A disk image posing as a polled controller: every issued operation
/// needs `latency` polls before the controller reports ready.
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    blocks: usize,
    latency: usize,
    remaining: AtomicUsize,
}

impl BlockFile {
    pub fn new(fd: File, latency: usize) -> std::io::Result<Self> {
        let blocks = fd.metadata()?.len() as usize / BLOCK_SIZE;
        Ok(Self {
            file: Mutex::new(fd),
            blocks,
            latency,
            remaining: AtomicUsize::new(0),
        })
    }
}

impl PolledDevice for BlockFile {
    fn issue_operation(&self, op: DiskOperation, block_id: usize) {
        log::trace!("block file: issue {op:?} block={block_id}");
        self.remaining.store(self.latency, Ordering::Release);
    }

    fn is_ready(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_err()
    }

    fn read_sector(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .expect("seeking error");
        assert_eq!(file.read(buf).unwrap(), BLOCK_SIZE, "not a complete block!");
    }

    fn write_sector(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .expect("seeking error");
        assert_eq!(
            file.write(buf).unwrap(),
            BLOCK_SIZE,
            "not a complete block!"
        );
    }

    fn blocks(&self) -> usize {
        self.blocks
    }
}
