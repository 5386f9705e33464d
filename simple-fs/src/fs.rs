//! # 文件系统层
//!
//! 卷的状态：未格式化 → 已格式化/未挂载 → 已挂载。
//! 格式化与挂载的先后不限；格式化之后才有几何参数，
//! 挂载一个已知几何参数的卷会从 inode 表重建位图。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use log::{debug, info, warn};

use crate::layout::{DiskInode, INODES_PER_BLOCK, InodeBlock};
use crate::sync::YieldHook;
use crate::{
    BLOCK_SIZE, BLOCKS_PER_INODE, Bitmap, DataBlock, EOF_SENTINEL, Error, File, MAX_DISK_SIZE, Result,
    YieldMutex,
};

/// 格式化时确定的卷几何参数
#[derive(Debug, Clone, Copy)]
struct Geometry {
    number_of_blocks: usize,
    number_of_inodes: usize,
    /// inode 表占用的块数，从 0 号块开始
    inode_mgmt_blocks: usize,
}

/// inode 在表中的位置
#[derive(Debug, Clone, Copy)]
struct InodePos {
    block_id: usize,
    index: usize,
}

#[derive(Default)]
pub struct FileSystem {
    device: Option<Arc<dyn BlockDevice>>,
    geometry: Option<Geometry>,
    free_block_map: Bitmap,
}

impl FileSystem {
    /// 只初始化内存中的结构，不接触磁盘。锁被占用时原地自旋。
    pub fn new() -> Arc<YieldMutex<Self>> {
        Arc::new(YieldMutex::new(Self::default()))
    }

    /// 同 [`FileSystem::new`]，但锁被占用时调用 `yield_hook` 让出处理器。
    /// 多个线程共用文件系统、且磁盘 I/O 会让出处理器时必须用这个。
    pub fn with_yield(yield_hook: YieldHook) -> Arc<YieldMutex<Self>> {
        Arc::new(YieldMutex::with_yield(Self::default(), yield_hook))
    }

    /// 挂载到 `device`。一个文件系统同时只能挂载一个设备。
    pub fn mount(&mut self, device: Arc<dyn BlockDevice>) -> Result<()> {
        if self.device.is_some() {
            warn!("file system is already mounted");
            return Err(Error::AlreadyMounted);
        }

        self.device = Some(device);
        if self.geometry.is_some() {
            self.rebuild_free_block_map()?;
        }
        info!("file system mounted");
        Ok(())
    }

    /// 卸下设备，几何参数保留
    pub fn unmount(&mut self) -> Result<()> {
        if self.device.take().is_none() {
            warn!("unmounting a file system that is not mounted");
            return Err(Error::NotMounted);
        }

        info!("file system unmounted");
        Ok(())
    }

    /// 清零 `device` 的前 `size` 字节并建立空的文件系统。
    /// 已挂载时，挂载的设备换成 `device`。
    pub fn format(&mut self, device: &Arc<dyn BlockDevice>, size: usize) -> Result<()> {
        if size > MAX_DISK_SIZE {
            warn!("file system size {size} exceeds the maximum disk size {MAX_DISK_SIZE}");
            return Err(Error::VolumeTooLarge);
        }

        let number_of_blocks = size / BLOCK_SIZE;
        if number_of_blocks > device.blocks() {
            warn!(
                "file system of {number_of_blocks} blocks does not fit a device of {} blocks",
                device.blocks()
            );
            return Err(Error::VolumeTooLarge);
        }

        let number_of_inodes = number_of_blocks / BLOCKS_PER_INODE;
        // 记录不跨块
        let inode_mgmt_blocks = number_of_inodes.div_ceil(INODES_PER_BLOCK);
        if number_of_inodes == 0 || inode_mgmt_blocks >= number_of_blocks {
            warn!("{number_of_blocks} block(s) cannot hold an inode table");
            return Err(Error::VolumeTooSmall);
        }

        let zero: DataBlock = [0; BLOCK_SIZE];
        for block_id in 0..number_of_blocks {
            device.write_block(block_id, &zero);
        }

        self.free_block_map = Bitmap::new(number_of_blocks);
        self.free_block_map.reserve_prefix(inode_mgmt_blocks);
        self.geometry = Some(Geometry {
            number_of_blocks,
            number_of_inodes,
            inode_mgmt_blocks,
        });
        if self.device.is_some() {
            self.device = Some(device.clone());
        }

        info!(
            "formatted {number_of_blocks} blocks, {number_of_inodes} inodes in {inode_mgmt_blocks} block(s)"
        );
        Ok(())
    }

    /// 查找文件并打开一个指向其首块的游标。`file_id` 为 0 永不命中。
    pub fn lookup_file(fs: &Arc<YieldMutex<Self>>, file_id: u32) -> Result<File> {
        let guard = fs.lock();
        let (_, inode) = guard.find_inode(file_id).inspect_err(|_| {
            warn!("lookup of file {file_id} failed");
        })?;

        let starting_block = inode.blocks().first().copied().ok_or(Error::NotFound)?;
        let mut cached_block = [0; BLOCK_SIZE];
        guard.read_block(starting_block as usize, &mut cached_block)?;
        drop(guard);

        debug!("file {file_id} opened at block {starting_block}");
        Ok(File::new(fs.clone(), &inode, cached_block))
    }

    pub fn create_file(&mut self, file_id: u32) -> Result<()> {
        if file_id == 0 {
            warn!("file id 0 is reserved");
            return Err(Error::ReservedFileId);
        }
        self.check_usable()?;
        if self.find_inode(file_id).is_ok() {
            warn!("file {file_id} already exists, not creating again");
            return Err(Error::AlreadyExists);
        }

        let pos = self.find_free_inode().inspect_err(|_| {
            warn!("no free inode for file {file_id}");
        })?;
        let block_id = self.alloc_block()?;

        let mut data_block = [0; BLOCK_SIZE];
        data_block[0] = EOF_SENTINEL;
        self.write_block(block_id, &data_block)?;

        self.modify_inode_at(pos, |inode| inode.init(file_id, block_id as u32))?;
        info!("created file {file_id} with block {block_id}");
        Ok(())
    }

    /// 删除文件并归还它的所有块
    pub fn delete_file(&mut self, file_id: u32) -> Result<()> {
        let (pos, inode) = self.find_inode(file_id).inspect_err(|_| {
            warn!("cannot delete file {file_id}: not found");
        })?;

        for &block_id in inode.blocks() {
            if block_id != 0 {
                self.release_block(block_id as usize);
            }
        }
        self.modify_inode_at(pos, DiskInode::clear)?;

        info!("deleted file {file_id}");
        Ok(())
    }

    /// 首次适配分配一个块，卷满时返回 0。
    /// 0 号块总是属于 inode 表，因此不会与真实的块混淆。
    pub fn get_free_block_number(&mut self) -> usize {
        match self.free_block_map.alloc() {
            Some(block_id) => block_id,
            None => {
                warn!("no free block left on the volume");
                0
            }
        }
    }

    /// 归还一个块，重复归还无害
    pub fn release_block(&mut self, block_id: usize) {
        if !self.free_block_map.dealloc(block_id) {
            debug!("block {block_id} was not allocated");
        }
    }

    /// 文件已用的直接块
    pub fn get_file_blocks(&self, file_id: u32) -> Result<Vec<u32>> {
        let (_, inode) = self.find_inode(file_id)?;
        Ok(inode.blocks().to_vec())
    }

    /// 给文件追加一个直接块
    pub fn update_inode_with_new_block_number(&mut self, file_id: u32, block_id: u32) -> Result<()> {
        let (pos, _) = self.find_inode(file_id)?;
        self.modify_inode_at(pos, |inode| inode.push_block(block_id))?
            .then_some(())
            .ok_or_else(|| {
                warn!("file {file_id} has no direct block left for block {block_id}");
                Error::FileTooLarge
            })
    }

    pub fn update_inode_with_new_file_size(&mut self, file_id: u32, file_size: u32) -> Result<()> {
        let (pos, _) = self.find_inode(file_id)?;
        self.modify_inode_at(pos, |inode| inode.file_size = file_size)
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.device.is_some()
    }

    #[inline]
    pub fn is_formatted(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn number_of_blocks(&self) -> usize {
        self.geometry.map_or(0, |g| g.number_of_blocks)
    }

    pub fn number_of_inodes(&self) -> usize {
        self.geometry.map_or(0, |g| g.number_of_inodes)
    }

    pub fn inode_mgmt_blocks(&self) -> usize {
        self.geometry.map_or(0, |g| g.inode_mgmt_blocks)
    }

    #[inline]
    pub fn is_block_allocated(&self, block_id: usize) -> bool {
        self.free_block_map.is_set(block_id)
    }

    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.free_block_map.count_free()
    }

    pub(crate) fn read_block(&self, block_id: usize, buf: &mut DataBlock) -> Result<()> {
        self.device()?.read_block(block_id, buf);
        Ok(())
    }

    pub(crate) fn write_block(&self, block_id: usize, buf: &DataBlock) -> Result<()> {
        self.device()?.write_block(block_id, buf);
        Ok(())
    }

    /// 就地修改文件的 inode 并写回所在的块
    pub(crate) fn modify_inode<R>(
        &mut self,
        file_id: u32,
        f: impl FnOnce(&mut DiskInode) -> R,
    ) -> Result<R> {
        let (pos, _) = self.find_inode(file_id)?;
        self.modify_inode_at(pos, f)
    }

    fn device(&self) -> Result<&Arc<dyn BlockDevice>> {
        self.device.as_ref().ok_or(Error::NotMounted)
    }

    fn geometry(&self) -> Result<Geometry> {
        self.geometry.ok_or(Error::NotFormatted)
    }

    fn check_usable(&self) -> Result<()> {
        self.device().inspect_err(|_| warn!("file system is not mounted"))?;
        self.geometry().inspect_err(|_| warn!("file system is not formatted"))?;
        Ok(())
    }

    pub(crate) fn alloc_block(&mut self) -> Result<usize> {
        match self.get_free_block_number() {
            0 => Err(Error::NoFreeBlock),
            block_id => Ok(block_id),
        }
    }

    fn read_inode_block(&self, block_id: usize) -> Result<InodeBlock> {
        let mut data_block = [0; BLOCK_SIZE];
        self.read_block(block_id, &mut data_block)?;
        Ok(InodeBlock::load(&data_block))
    }

    /// 读改写：只覆盖块内的 inode 记录
    fn modify_inode_at<R>(&mut self, pos: InodePos, f: impl FnOnce(&mut DiskInode) -> R) -> Result<R> {
        let mut data_block = [0; BLOCK_SIZE];
        self.read_block(pos.block_id, &mut data_block)?;
        let mut inode_block = InodeBlock::load(&data_block);

        let ret = f(&mut inode_block.inodes[pos.index]);

        inode_block.store(&mut data_block);
        self.write_block(pos.block_id, &data_block)?;
        Ok(ret)
    }

    /// 依次扫描 inode 表，对每个 inode 调用 `f`，直到它给出结果
    fn scan_inodes<T>(&self, mut f: impl FnMut(InodePos, &DiskInode) -> Option<T>) -> Result<Option<T>> {
        let geometry = self.geometry()?;
        for block_id in 0..geometry.inode_mgmt_blocks {
            let inode_block = self.read_inode_block(block_id)?;
            for (index, inode) in inode_block.inodes.iter().enumerate() {
                if block_id * INODES_PER_BLOCK + index >= geometry.number_of_inodes {
                    return Ok(None);
                }
                if let Some(found) = f(InodePos { block_id, index }, inode) {
                    return Ok(Some(found));
                }
            }
        }

        Ok(None)
    }

    fn find_inode(&self, file_id: u32) -> Result<(InodePos, DiskInode)> {
        if file_id == 0 {
            return Err(Error::NotFound);
        }
        self.scan_inodes(|pos, inode| (inode.file_id == file_id).then_some((pos, *inode)))?
            .ok_or(Error::NotFound)
    }

    fn find_free_inode(&self) -> Result<InodePos> {
        self.scan_inodes(|pos, inode| inode.is_free().then_some(pos))?
            .ok_or(Error::NoFreeInode)
    }

    /// 位图只在内存中，重新挂载时按 inode 表恢复
    fn rebuild_free_block_map(&mut self) -> Result<()> {
        let geometry = self.geometry()?;
        let mut free_block_map = Bitmap::new(geometry.number_of_blocks);
        free_block_map.reserve_prefix(geometry.inode_mgmt_blocks);

        self.scan_inodes(|_, inode| {
            if !inode.is_free() {
                for &block_id in inode.blocks() {
                    free_block_map.set(block_id as usize);
                }
            }
            None::<()>
        })?;

        debug!(
            "free block map rebuilt, {} of {} blocks free",
            free_block_map.count_free(),
            geometry.number_of_blocks
        );
        self.free_block_map = free_block_map;
        Ok(())
    }
}
