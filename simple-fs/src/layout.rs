//! # 磁盘数据结构层
//!
//! 卷从 0 号块开始是 inode 表，每块顺序存放 [`INODES_PER_BLOCK`] 个 inode，
//! 块尾余下的字节不用；其后都是数据块。
//!
//! inode 的所有字段都是小端序 `u32`：
//!
//! | 偏移 | 字段                   |
//! |------|------------------------|
//! | 0    | `file_id`              |
//! | 4    | `file_size`            |
//! | 8    | `block_no[10]`         |
//! | 48   | `number_of_blocks_used`|
//!
//! 一条记录 52 字节，一块放 9 条，块尾 44 字节不用。

use crate::{BLOCK_SIZE, DIRECT_BLOCKS, DataBlock};

/// inode 记录的字节数
pub const INODE_SIZE: usize = 4 * (DIRECT_BLOCKS + 3);
/// 每个 inode 表块容纳的 inode 数
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiskInode {
    /// 为 0 表示该 inode 空闲
    pub file_id: u32,
    pub file_size: u32,
    /// 直接块编号，未用的为 0
    pub block_no: [u32; DIRECT_BLOCKS],
    pub number_of_blocks_used: u32,
}

impl DiskInode {
    #[inline]
    pub fn is_free(&self) -> bool {
        self.file_id == 0
    }

    /// 占用本 inode，文件只有一个块
    pub fn init(&mut self, file_id: u32, first_block: u32) {
        *self = Self {
            file_id,
            ..Default::default()
        };
        self.push_block(first_block);
    }

    /// 抹去身份、大小与块表
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 抹去块表，大小归零，身份保留
    pub fn truncate(&mut self) {
        self.file_size = 0;
        self.block_no = [0; DIRECT_BLOCKS];
        self.number_of_blocks_used = 0;
    }

    /// 已用的直接块
    pub fn blocks(&self) -> &[u32] {
        let used = (self.number_of_blocks_used as usize).min(DIRECT_BLOCKS);
        &self.block_no[..used]
    }

    /// 追加一个直接块，直接块已满则返回 `false`
    pub fn push_block(&mut self, block_id: u32) -> bool {
        let used = self.number_of_blocks_used as usize;
        if used >= DIRECT_BLOCKS {
            return false;
        }

        self.block_no[used] = block_id;
        self.number_of_blocks_used += 1;
        true
    }

    pub fn decode(raw: &[u8]) -> Self {
        let mut words = raw[..INODE_SIZE]
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        let mut next = || words.next().unwrap_or_default();

        let file_id = next();
        let file_size = next();
        let mut block_no = [0; DIRECT_BLOCKS];
        block_no.fill_with(&mut next);
        let number_of_blocks_used = next();

        Self {
            file_id,
            file_size,
            block_no,
            number_of_blocks_used,
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        let words = [self.file_id, self.file_size]
            .into_iter()
            .chain(self.block_no)
            .chain([self.number_of_blocks_used]);
        for (chunk, word) in raw[..INODE_SIZE].chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }
}

/// 一个 inode 表块
#[derive(Debug, Default, Clone, Copy)]
pub struct InodeBlock {
    pub inodes: [DiskInode; INODES_PER_BLOCK],
}

impl InodeBlock {
    pub fn load(data_block: &DataBlock) -> Self {
        let mut inode_block = Self::default();
        for (inode, raw) in inode_block
            .inodes
            .iter_mut()
            .zip(data_block.chunks_exact(INODE_SIZE))
        {
            *inode = DiskInode::decode(raw);
        }
        inode_block
    }

    /// 写回前 `INODES_PER_BLOCK` 条记录，块尾不动
    pub fn store(&self, data_block: &mut DataBlock) {
        for (inode, raw) in self
            .inodes
            .iter()
            .zip(data_block.chunks_exact_mut(INODE_SIZE))
        {
            inode.encode(raw);
        }
    }
}
