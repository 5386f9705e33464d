#![no_std]

extern crate alloc;

/* simple-fs 的整体架构，自上而下 */

// 文件层：带游标的顺序读写
mod file;
pub use file::{File, FileAttributes};

// 文件系统层：格式化、挂载以及 inode 的增删查改
mod fs;
pub use fs::FileSystem;

// 空闲块位图：仅存在于内存中
mod bitmap;
pub use bitmap::Bitmap;

// 协作式锁：锁被占用时让出处理器
mod sync;
pub use sync::{YieldHook, YieldMutex};

// 磁盘数据结构层：inode 表的编解码
mod layout;
pub use layout::{DiskInode, INODE_SIZE, INODES_PER_BLOCK};

mod error;
pub use error::{Error, Result};

pub use block_dev::{BLOCK_SIZE, BlockDevice};

/// 卷的最大字节数
pub const MAX_DISK_SIZE: usize = 10 << 20;
/// 每个文件的直接块数，也是文件的块数上限
pub const DIRECT_BLOCKS: usize = 10;
/// 格式化时每这么多块配一个 inode
pub const BLOCKS_PER_INODE: usize = 10;
/// 带内文件结束标记
pub const EOF_SENTINEL: u8 = 0xFF;

type DataBlock = [u8; BLOCK_SIZE];
