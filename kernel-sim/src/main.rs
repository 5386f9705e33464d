mod block_file;
mod cli;
mod dispatcher;
mod kernel;

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use block_dev::{BLOCK_SIZE, PolledDevice, RamDisk};
use blocking_disk::BlockingDisk;
use clap::Parser;
use scheduler::Scheduler;
use typed_bytesize::ByteSizeIec;

pub use self::{
    block_file::BlockFile,
    cli::{Cli, Subsystem},
    dispatcher::HostDispatcher,
    kernel::Kernel,
};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    run(&cli)
}

fn run(cli: &Cli) -> io::Result<()> {
    let subsystems = cli.subsystems();
    log::info!("subsystems={subsystems:?}");

    let dispatcher = HostDispatcher::new();
    let scheduler = Arc::new(Scheduler::new(dispatcher.clone()));

    let disk = if subsystems.contains(Subsystem::Disk) {
        let disk_size = ByteSizeIec::mib(10).0;
        let device: Arc<dyn PolledDevice> = match &cli.image {
            Some(image) => {
                println!("image={image:?}");
                let fd = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(image)?;
                fd.set_len(disk_size)?;
                Arc::new(BlockFile::new(fd, cli.latency)?)
            }
            None => Arc::new(RamDisk::new(disk_size as usize / BLOCK_SIZE, cli.latency)),
        };
        Some(BlockingDisk::new(device, scheduler.clone()))
    } else {
        None
    };

    let kernel = Arc::new(Kernel {
        dispatcher,
        scheduler: scheduler.clone(),
        disk,
        fs: subsystems
            .contains(Subsystem::FileSystem)
            .then(|| Kernel::file_system(&scheduler)),
        rounds: cli.rounds,
        volume_size: cli.blocks * BLOCK_SIZE,
    });

    kernel.boot(&kernel::THREADS);
    println!("all kernel threads exited");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_to_completion() {
        let cli = Cli::parse_from(["kernel-sim", "--rounds", "2", "--latency", "2", "--blocks", "200"]);
        run(&cli).unwrap();
    }

    #[test]
    fn demo_runs_without_disk() {
        let cli = Cli::parse_from(["kernel-sim", "--rounds", "3", "--without", "disk"]);
        run(&cli).unwrap();
    }

    #[test]
    fn demo_runs_on_disk_image() {
        let image = std::env::temp_dir().join(format!("kernel-sim-{}.img", std::process::id()));
        let cli = Cli::parse_from([
            "kernel-sim",
            "--rounds",
            "1",
            "--without",
            "file-system",
            "--image",
            image.to_str().unwrap(),
        ]);
        run(&cli).unwrap();
        std::fs::remove_file(image).unwrap();
    }
}
