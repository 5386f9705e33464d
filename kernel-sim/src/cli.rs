use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use enumflags2::{BitFlags, bitflags};

#[derive(Parser)]
pub struct Cli {
    /// Disk image backing the controller; an in-memory disk is used when absent
    #[arg(long, short)]
    pub image: Option<PathBuf>,

    /// Polls the controller needs before it reports ready
    #[arg(long, short, default_value_t = 3)]
    pub latency: usize,

    /// Iterations each demo thread runs before it exits
    #[arg(long, short, default_value_t = 3)]
    pub rounds: usize,

    /// Number of blocks formatted for the file system
    #[arg(long, short, default_value_t = 1000)]
    pub blocks: usize,

    /// Subsystems left out of the demo
    #[arg(long, value_enum, value_delimiter = ',')]
    pub without: Vec<Subsystem>,
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Subsystem {
    Disk = 0b01,
    FileSystem = 0b10,
}

impl Cli {
    /// Enabled subsystems. The file system needs the disk.
    pub fn subsystems(&self) -> BitFlags<Subsystem> {
        let mut subsystems = BitFlags::all();
        for &subsystem in &self.without {
            subsystems.remove(subsystem);
        }
        if !subsystems.contains(Subsystem::Disk) {
            subsystems.remove(Subsystem::FileSystem);
        }

        subsystems
    }
}
