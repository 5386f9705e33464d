//! The boot demo: four cooperative threads passing the CPU around through
//! the scheduler, one of them reading the disk and one exercising the file
//! system.

use std::sync::Arc;

use blocking_disk::BlockingDisk;
use block_dev::{BLOCK_SIZE, BlockDevice};
use scheduler::{Scheduler, Tid};
use simple_fs::{FileSystem, YieldMutex};

use crate::dispatcher::{BOOT, HostDispatcher};

pub struct Kernel {
    pub dispatcher: Arc<HostDispatcher>,
    pub scheduler: Arc<Scheduler>,
    pub disk: Option<Arc<BlockingDisk>>,
    pub fs: Option<Arc<YieldMutex<FileSystem>>>,
    pub rounds: usize,
    /// Bytes formatted for the file system
    pub volume_size: usize,
}

pub type ThreadBody = fn(&Kernel);

pub const THREADS: [ThreadBody; 4] = [fun1, fun2, fun3, fun4];

impl Kernel {
    /// A file system whose lock hands the CPU to other threads while it
    /// is held elsewhere, so a holder blocked on the disk can finish.
    pub fn file_system(scheduler: &Arc<Scheduler>) -> Arc<YieldMutex<FileSystem>> {
        let scheduler = scheduler.clone();
        FileSystem::with_yield(Arc::new(move || scheduler.reschedule()))
    }

    /// Starts one kernel thread per body, numbered from 1, then gives the
    /// CPU away and waits until the last of them has exited.
    pub fn boot(self: &Arc<Self>, bodies: &[ThreadBody]) {
        let threads: Vec<_> = bodies
            .iter()
            .enumerate()
            .map(|(i, &body)| {
                let thread = Tid::new(i + 1);
                let kernel = self.clone();
                let handle = self.dispatcher.spawn(thread, move || {
                    body(&kernel);
                    kernel.exit();
                });
                self.scheduler.add(thread);
                handle
            })
            .collect();

        // the CPU comes back here once the last kernel thread has exited
        self.scheduler.yield_now();

        for thread in threads {
            thread.join().expect("kernel thread panicked");
        }
    }

    /// Puts the running thread back on the ready queue and yields.
    #[inline]
    pub fn pass_on_cpu(&self) {
        self.scheduler.reschedule();
    }

    /// Leaves the ready queue for good, dropping any disk request still
    /// outstanding, and hands the CPU to whoever is next. The last thread
    /// out returns the CPU to the boot thread.
    pub fn exit(&self) {
        let me = self.scheduler.current();
        if self.scheduler.contains(me) {
            self.scheduler.terminate(me);
        }
        if let Some(disk) = &self.disk {
            disk.cancel(me);
        }
        log::info!("thread {me} exits");

        self.dispatcher.retire();
        while self.dispatcher.is_running(me) {
            if self.scheduler.is_empty() {
                self.dispatcher.hand_off(BOOT);
            } else {
                self.scheduler.yield_now();
            }
        }
    }
}

fn ticks(name: &str, me: Tid) {
    for i in 0..10 {
        log::debug!("{name} (thread {me}): TICK [{i}]");
    }
}

fn fun1(kernel: &Kernel) {
    let me = kernel.scheduler.current();
    log::info!("FUN 1 INVOKED on thread {me}");

    for j in 0..kernel.rounds {
        log::info!("FUN 1 IN ITERATION[{j}]");
        ticks("FUN 1", me);
        kernel.pass_on_cpu();
    }
}

fn fun2(kernel: &Kernel) {
    let me = kernel.scheduler.current();
    log::info!("FUN 2 INVOKED on thread {me}");

    let mut buf = [0; BLOCK_SIZE];
    let mut read_block = 1;
    let mut write_block = 0;

    for j in 0..kernel.rounds {
        log::info!("FUN 2 IN ITERATION[{j}]");

        if let Some(disk) = &kernel.disk {
            log::info!("reading block {read_block} from disk");
            disk.read(read_block, &mut buf);
            println!("Read data = {}", String::from_utf8_lossy(&buf).trim_end_matches('\0'));

            // writing raw blocks would corrupt a file system on the same disk
            if kernel.fs.is_none() {
                for (k, byte) in buf.iter_mut().enumerate() {
                    *byte = b'A' + (k % 20) as u8;
                }
                log::info!("writing block {write_block} to disk");
                disk.write(write_block, &buf);
            }

            write_block = read_block;
            read_block = (read_block + 1) % 10;
        } else {
            ticks("FUN 2", me);
        }

        kernel.pass_on_cpu();
    }
}

fn fun3(kernel: &Kernel) {
    let me = kernel.scheduler.current();
    log::info!("FUN 3 INVOKED on thread {me}");

    if let (Some(disk), Some(fs)) = (&kernel.disk, &kernel.fs) {
        let device: Arc<dyn BlockDevice> = disk.clone();
        if let Err(err) = exercise_file_system(fs, device, kernel.volume_size) {
            log::error!("file system exercise aborted: {err}");
        }
    }

    for j in 0..kernel.rounds {
        log::info!("FUN 3 IN BURST[{j}]");
        ticks("FUN 3", me);
        kernel.pass_on_cpu();
    }
}

fn fun4(kernel: &Kernel) {
    let me = kernel.scheduler.current();
    log::info!("FUN 4 INVOKED on thread {me}");

    for j in 0..kernel.rounds {
        log::info!("FUN 4 IN BURST[{j}]");
        ticks("FUN 4", me);
        kernel.pass_on_cpu();
    }
}

fn exercise_file_system(
    fs: &Arc<YieldMutex<FileSystem>>,
    device: Arc<dyn BlockDevice>,
    volume_size: usize,
) -> simple_fs::Result<()> {
    log::info!("initializing file system");
    fs.lock().mount(device.clone())?;
    fs.lock().format(&device, volume_size)?;
    fs.lock().create_file(1)?;
    println!("File 1 created successfully");

    let mut f1 = FileSystem::lookup_file(fs, 1)?;
    println!("File 1 exists in the file system");

    let written = f1.write(&[b'X'; 700]);
    println!("Wrote {written} characters into file-1");

    f1.reset();
    let mut read_buf = [0; 1024];
    let read = f1.read(&mut read_buf[..700]);
    println!("Read {read} characters from file-1");
    println!("Read data = {}", String::from_utf8_lossy(&read_buf[..read]));
    println!("eof={}", f1.eof());

    println!("File Attributes\n===============\n{}", f1.attributes()?);

    f1.reset();
    f1.write(b"C");
    f1.rewrite()?;
    println!("File 1 rewritten, size={}", f1.size());

    fs.lock().delete_file(1)?;
    println!("Deleted file-1 successfully from the file system");

    match FileSystem::lookup_file(fs, 1) {
        Err(_) => println!("Lookup of file-1 failed! Deletion was successful!"),
        Ok(_) => println!("File-1 still present in the INode tables. Deletion did not succeed!"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;

    const VOLUME_BLOCKS: usize = 100;

    fn kernel_with_file_system(latency: usize) -> Arc<Kernel> {
        let dispatcher = HostDispatcher::new();
        let scheduler = Arc::new(Scheduler::new(dispatcher.clone()));
        let disk = BlockingDisk::new(Arc::new(RamDisk::new(VOLUME_BLOCKS, latency)), scheduler.clone());

        Arc::new(Kernel {
            dispatcher,
            fs: Some(Kernel::file_system(&scheduler)),
            scheduler,
            disk: Some(disk),
            rounds: 1,
            volume_size: VOLUME_BLOCKS * BLOCK_SIZE,
        })
    }

    /// Formats the volume and writes file 1, handing the CPU over between
    /// writing and reading it back.
    fn writer(kernel: &Kernel) {
        let (Some(disk), Some(fs)) = (&kernel.disk, &kernel.fs) else {
            return;
        };
        let device: Arc<dyn BlockDevice> = disk.clone();

        let setup = || -> simple_fs::Result<()> {
            let mut fs = fs.lock();
            fs.mount(device.clone())?;
            fs.format(&device, kernel.volume_size)?;
            fs.create_file(1)
        };
        if let Err(err) = setup() {
            log::error!("writer setup failed: {err}");
            return;
        }

        let Ok(mut file) = FileSystem::lookup_file(fs, 1) else {
            return;
        };
        file.write(&[b'w'; 700]);
        kernel.pass_on_cpu();

        file.reset();
        let mut buf = [0; 700];
        file.read(&mut buf);
    }

    /// Creates file 2 while the writer is still using the file system.
    fn creator(kernel: &Kernel) {
        let Some(fs) = &kernel.fs else {
            return;
        };
        if let Err(err) = fs.lock().create_file(2) {
            log::error!("creator failed: {err}");
        }
    }

    #[test]
    fn two_threads_share_the_file_system() {
        let kernel = kernel_with_file_system(2);
        let bodies: [ThreadBody; 2] = [writer, creator];
        kernel.boot(&bodies);

        let fs = kernel.fs.as_ref().unwrap();
        assert!(!fs.is_locked());
        assert!(fs.lock().get_file_blocks(2).is_ok());

        let mut file = FileSystem::lookup_file(fs, 1).unwrap();
        let mut buf = [0; 1024];
        assert_eq!(file.read(&mut buf), 700);
        assert!(buf[..700].iter().all(|&b| b == b'w'));

        assert!(kernel.scheduler.is_empty());
        assert!(kernel.disk.as_ref().unwrap().requests().is_empty());
    }
}
