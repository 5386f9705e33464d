use alloc::vec;
use alloc::vec::Vec;

/// 位组的位数
const GROUP_BITS: usize = u64::BITS as usize;

/// 空闲块位图，置位表示块已被占用
#[derive(Debug, Default, Clone)]
pub struct Bitmap {
    groups: Vec<u64>,
    /// 位图所指示的块数，末尾位组中超出的位永不分配
    blocks: usize,
}

impl Bitmap {
    pub fn new(blocks: usize) -> Self {
        Self {
            groups: vec![0; blocks.div_ceil(GROUP_BITS)],
            blocks,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks
    }

    /// 把前 `count` 块标记为占用：整组整组地置位，最后不足一组的逐位置位
    pub fn reserve_prefix(&mut self, count: usize) {
        let count = count.min(self.blocks);
        let full_groups = count / GROUP_BITS;
        self.groups[..full_groups].fill(u64::MAX);
        for bit in 0..count % GROUP_BITS {
            self.groups[full_groups] |= 1 << bit;
        }
    }

    /// 首次适配：找到编号最小的空闲块，置位并返回其编号。
    /// 位图用尽时返回空。
    pub fn alloc(&mut self) -> Option<usize> {
        let (group_index, ingroup_index) = self
            .groups
            .iter()
            .enumerate()
            .find_map(|(group_index, &bits)| {
                (bits != u64::MAX).then_some((group_index, bits.trailing_ones() as usize))
            })?;

        let block_id = group_index * GROUP_BITS + ingroup_index;
        if block_id >= self.blocks {
            return None;
        }

        self.groups[group_index] |= 1 << ingroup_index;
        Some(block_id)
    }

    /// 清除 `block_id` 的占用位，返回它原先是否被占用
    pub fn dealloc(&mut self, block_id: usize) -> bool {
        if !self.is_set(block_id) {
            return false;
        }

        let (group_index, ingroup_index) = Self::decode(block_id);
        self.groups[group_index] &= !(1 << ingroup_index);
        true
    }

    /// 直接标记占用，重建位图时使用
    pub fn set(&mut self, block_id: usize) {
        if block_id < self.blocks {
            let (group_index, ingroup_index) = Self::decode(block_id);
            self.groups[group_index] |= 1 << ingroup_index;
        }
    }

    pub fn is_set(&self, block_id: usize) -> bool {
        if block_id >= self.blocks {
            return false;
        }

        let (group_index, ingroup_index) = Self::decode(block_id);
        self.groups[group_index] & (1 << ingroup_index) != 0
    }

    pub fn count_free(&self) -> usize {
        let used: usize = self.groups.iter().map(|bits| bits.count_ones() as usize).sum();
        self.blocks - used
    }

    #[inline]
    fn decode(block_id: usize) -> (usize, usize) {
        (block_id / GROUP_BITS, block_id % GROUP_BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_prefix_spans_groups() {
        let mut bitmap = Bitmap::new(200);
        bitmap.reserve_prefix(70);

        assert!((0..70).all(|b| bitmap.is_set(b)));
        assert!(!bitmap.is_set(70));
        assert_eq!(bitmap.count_free(), 130);
        assert_eq!(bitmap.alloc(), Some(70));
    }

    #[test]
    fn alloc_is_first_fit() {
        let mut bitmap = Bitmap::new(10);
        bitmap.reserve_prefix(2);

        assert_eq!(bitmap.alloc(), Some(2));
        assert_eq!(bitmap.alloc(), Some(3));
        assert_eq!(bitmap.alloc(), Some(4));
        assert!(bitmap.dealloc(3));
        assert_eq!(bitmap.alloc(), Some(3));
    }

    #[test]
    fn alloc_never_passes_capacity() {
        let mut bitmap = Bitmap::new(5);
        for expected in 0..5 {
            assert_eq!(bitmap.alloc(), Some(expected));
        }
        assert_eq!(bitmap.alloc(), None);
        assert_eq!(bitmap.count_free(), 0);
    }

    #[test]
    fn double_free_is_absorbed() {
        let mut bitmap = Bitmap::new(64);
        let block = bitmap.alloc().unwrap();

        assert!(bitmap.dealloc(block));
        assert!(!bitmap.dealloc(block));
        assert!(!bitmap.dealloc(1000));
        assert_eq!(bitmap.count_free(), 64);
    }
}
