//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘等。
//! 本层有两种抽象：
//!
//! - [`PolledDevice`]：轮询式控制器。发出操作后设备异步完成，
//!   是否就绪只能靠轮询得知，数据搬运是另一个原语；
//! - [`BlockDevice`]：同步读写块，调用返回时数据已经搬运完毕。
//!   文件系统只认识这一层。
//!
//! [`SimpleDisk`] 以忙等的方式把前者包装成后者。

#![no_std]

extern crate alloc;

mod ram_disk;
mod simple_disk;

use core::any::Any;

pub use self::{ram_disk::RamDisk, simple_disk::SimpleDisk};

/// 块大小（字节）
pub const BLOCK_SIZE: usize = 512;

/// 磁盘操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiskOperation {
    Read,
    Write,
}

/// 轮询式磁盘控制器
pub trait PolledDevice: Send + Sync + Any {
    /// 向控制器发出操作，仅仅是开始，不保证完成
    fn issue_operation(&self, op: DiskOperation, block_id: usize);

    /// 控制器是否已就绪，可以搬运数据
    fn is_ready(&self) -> bool;

    /// 从控制器读出一整块，不检查就绪
    fn read_sector(&self, block_id: usize, buf: &mut [u8]);

    /// 向控制器写入一整块，不检查就绪
    fn write_sector(&self, block_id: usize, buf: &[u8]);

    /// 设备总块数
    fn blocks(&self) -> usize;
}

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, block_id: usize, buf: &mut [u8]);
    fn write_block(&self, block_id: usize, buf: &[u8]);

    /// 设备总块数
    fn blocks(&self) -> usize;
}
