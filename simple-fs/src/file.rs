//! # 文件层
//!
//! 游标式的顺序读写。文件内容以带内的 [`EOF_SENTINEL`] 结束，
//! 因此文件里不能出现这个字节。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use log::{debug, trace, warn};

use crate::layout::DiskInode;
use crate::{BLOCK_SIZE, DIRECT_BLOCKS, DataBlock, EOF_SENTINEL, FileSystem, Result, YieldMutex};

/// 打开的文件
pub struct File {
    fs: Arc<YieldMutex<FileSystem>>,
    file_id: u32,
    starting_block: u32,
    current_block: u32,
    /// 从 1 开始
    current_block_index: usize,
    /// 当前块内的字节偏移
    current_position: usize,
    file_size: u32,
    cached_block: DataBlock,
}

/// 文件的属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    pub file_id: u32,
    pub file_size: u32,
    pub blocks: Vec<u32>,
    pub position: usize,
}

impl File {
    pub(crate) fn new(fs: Arc<YieldMutex<FileSystem>>, inode: &DiskInode, cached_block: DataBlock) -> Self {
        let starting_block = inode.blocks()[0];
        Self {
            fs,
            file_id: inode.file_id,
            starting_block,
            current_block: starting_block,
            current_block_index: 1,
            current_position: 0,
            file_size: inode.file_size,
            cached_block,
        }
    }

    #[inline]
    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.file_size
    }

    /// 游标距文件开头的字节数
    #[inline]
    pub fn position(&self) -> usize {
        (self.current_block_index - 1) * BLOCK_SIZE + self.current_position
    }

    /// 从游标处读出至多 `buf.len()` 个字节，返回实际读出的字节数。
    /// 遇到结束标记或没有后续块时停止。
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let fs = self.fs.clone();
        let mut fs = fs.lock();

        let mut read_size = 0;
        while read_size < buf.len() {
            if self.current_position == BLOCK_SIZE && !self.next_block(&mut fs, false) {
                break;
            }

            let byte = self.cached_block[self.current_position];
            if byte == EOF_SENTINEL {
                break;
            }
            buf[read_size] = byte;
            read_size += 1;
            self.current_position += 1;
        }

        trace!("read {read_size} bytes from file {}", self.file_id);
        read_size
    }

    /// 从游标处写入 `buf`，块写满时换到下一块，没有就分配新块。
    /// 返回实际写入的字节数。
    pub fn write(&mut self, buf: &[u8]) -> usize {
        self.write_bytes(buf, None)
    }

    /// 同 [`File::write`]，但遇到 `terminator` 即停止，`terminator` 本身不写入
    pub fn write_until(&mut self, buf: &[u8], terminator: u8) -> usize {
        self.write_bytes(buf, Some(terminator))
    }

    /// 游标是否位于文件末尾。
    /// 游标停在块尾时先移到下一块的开头，绝对位置不变。
    pub fn eof(&mut self) -> bool {
        if self.current_position == BLOCK_SIZE {
            let fs = self.fs.clone();
            let mut fs = fs.lock();
            if !self.next_block(&mut fs, false) {
                return true;
            }
        }

        self.cached_block[self.current_position] == EOF_SENTINEL
    }

    /// 游标回到首块开头
    pub fn reset(&mut self) {
        let fs = self.fs.clone();
        let fs = fs.lock();
        if let Err(err) = self.load_block(&fs, self.starting_block, 1) {
            warn!("cannot reset file {}: {err}", self.file_id);
        }
    }

    /// 清空文件内容：归还并清零所有块，再给文件一个只有结束标记的新块。
    /// inode 保留。
    pub fn rewrite(&mut self) -> Result<()> {
        let fs = self.fs.clone();
        let mut fs = fs.lock();

        let zero: DataBlock = [0; BLOCK_SIZE];
        for block_id in fs.get_file_blocks(self.file_id)? {
            fs.write_block(block_id as usize, &zero)?;
            fs.release_block(block_id as usize);
        }

        // 刚归还了至少一块，首次适配不会失败
        let block_id = fs.alloc_block()? as u32;
        fs.modify_inode(self.file_id, |inode| {
            inode.truncate();
            inode.push_block(block_id);
        })?;

        self.cached_block = zero;
        self.cached_block[0] = EOF_SENTINEL;
        fs.write_block(block_id as usize, &self.cached_block)?;

        self.starting_block = block_id;
        self.current_block = block_id;
        self.current_block_index = 1;
        self.current_position = 0;
        self.file_size = 0;
        debug!("file {} rewritten, now at block {block_id}", self.file_id);
        Ok(())
    }

    pub fn attributes(&self) -> Result<FileAttributes> {
        let blocks = self.fs.lock().get_file_blocks(self.file_id)?;
        Ok(FileAttributes {
            file_id: self.file_id,
            file_size: self.file_size,
            blocks,
            position: self.position(),
        })
    }

    fn write_bytes(&mut self, buf: &[u8], terminator: Option<u8>) -> usize {
        let fs = self.fs.clone();
        let mut fs = fs.lock();

        let mut write_size = 0;
        for &byte in buf {
            if Some(byte) == terminator {
                break;
            }
            if self.current_position == BLOCK_SIZE && !self.next_block(&mut fs, true) {
                break;
            }

            self.cached_block[self.current_position] = byte;
            self.current_position += 1;
            write_size += 1;
        }

        let end = self.position() as u32;
        // 结束标记紧跟最后一个字节，块恰好写满时落在下一块的开头
        if self.current_position == BLOCK_SIZE {
            self.next_block(&mut fs, true);
        }
        if self.current_position < BLOCK_SIZE {
            self.cached_block[self.current_position] = EOF_SENTINEL;
        }
        if let Err(err) = fs.write_block(self.current_block as usize, &self.cached_block) {
            warn!("cannot flush block {} of file {}: {err}", self.current_block, self.file_id);
        }

        if end > self.file_size {
            self.file_size = end;
            if let Err(err) = fs.update_inode_with_new_file_size(self.file_id, end) {
                warn!("cannot update the size of file {}: {err}", self.file_id);
            }
        }

        trace!("wrote {write_size} bytes into file {}", self.file_id);
        write_size
    }

    /// 游标移到下一块的开头。块表每次都重新读取。
    ///
    /// 写时先把当前块刷回磁盘，没有下一块就分配一个新块追加到 inode。
    /// 无法前进时返回 `false`，游标不动。
    fn next_block(&mut self, fs: &mut FileSystem, for_write: bool) -> bool {
        if for_write {
            if let Err(err) = fs.write_block(self.current_block as usize, &self.cached_block) {
                warn!("cannot flush block {} of file {}: {err}", self.current_block, self.file_id);
                return false;
            }
        }

        let blocks = match fs.get_file_blocks(self.file_id) {
            Ok(blocks) => blocks,
            Err(err) => {
                warn!("cannot fetch blocks of file {}: {err}", self.file_id);
                return false;
            }
        };

        // 下一块在块表中的下标恰好是当前块从 1 开始的序号
        let next_index = self.current_block_index;
        if let Some(&block_id) = blocks.get(next_index) {
            return self.load_block(fs, block_id, next_index + 1).is_ok();
        }
        if !for_write {
            return false;
        }
        if next_index >= DIRECT_BLOCKS {
            debug!("file {} reached its last direct block", self.file_id);
            return false;
        }

        let block_id = match fs.get_free_block_number() {
            0 => return false,
            block_id => block_id as u32,
        };
        if fs.update_inode_with_new_block_number(self.file_id, block_id).is_err() {
            fs.release_block(block_id as usize);
            return false;
        }

        self.cached_block.fill(0);
        self.current_block = block_id;
        self.current_block_index = next_index + 1;
        self.current_position = 0;
        true
    }

    fn load_block(&mut self, fs: &FileSystem, block_id: u32, block_index: usize) -> Result<()> {
        fs.read_block(block_id as usize, &mut self.cached_block)?;
        self.current_block = block_id;
        self.current_block_index = block_index;
        self.current_position = 0;
        Ok(())
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("file_id", &self.file_id)
            .field("file_size", &self.file_size)
            .field("current_block", &self.current_block)
            .field("current_block_index", &self.current_block_index)
            .field("current_position", &self.current_position)
            .finish()
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "file id   : {}", self.file_id)?;
        writeln!(f, "file size : {} bytes", self.file_size)?;
        writeln!(f, "blocks    : {:?}", self.blocks)?;
        write!(f, "position  : {}", self.position)
    }
}
