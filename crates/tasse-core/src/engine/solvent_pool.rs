use super::error::EngineError;
use crate::core::models::atom::AtomSphere;

/// Blocks added whenever a grab finds the free list empty.
pub const POOL_GROWTH: usize = 2048;
/// Blocks reserved for every thread when the engine is set up.
pub const POOL_PREALLOCATION: usize = 4096;

/// Index of a block inside its owning [`SolventBlockPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHandle(u32);

impl BlockHandle {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Header of one pooled solvent placement. The atom spheres live in the
/// pool's flat sphere buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SolventBlock {
    /// Logical index of the bridging solvent atom.
    pub solvent: u32,
    pub energy: f64,
    pub snaps: u32,
    /// Next block of the same score chain.
    pub chain: Option<BlockHandle>,
    next_free: Option<BlockHandle>,
    in_use: bool,
}

impl SolventBlock {
    fn vacant(next_free: Option<BlockHandle>) -> Self {
        Self {
            solvent: 0,
            energy: 0.0,
            snaps: 0,
            chain: None,
            next_free,
            in_use: false,
        }
    }
}

/// Per-thread block allocator for candidate solvent placements.
///
/// Blocks are recycled through an intrusive free list and never shrink the
/// backing storage until [`clear`](Self::clear). Every block carries `stride`
/// atom spheres, the atom count of one solvent residue.
#[derive(Debug, Clone, Default)]
pub struct SolventBlockPool {
    stride: usize,
    blocks: Vec<SolventBlock>,
    spheres: Vec<AtomSphere>,
    free_head: Option<BlockHandle>,
    in_use: usize,
}

impl SolventBlockPool {
    pub fn new(stride: usize) -> Self {
        Self {
            stride,
            ..Self::default()
        }
    }

    pub fn with_capacity(stride: usize, blocks: usize) -> Result<Self, EngineError> {
        let mut pool = Self::new(stride);
        pool.grow(blocks)?;
        Ok(pool)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Appends `count` vacant blocks to the front of the free list.
    pub fn grow(&mut self, count: usize) -> Result<(), EngineError> {
        let start = self.blocks.len();
        let end = start
            .checked_add(count)
            .filter(|&end| end <= u32::MAX as usize)
            .ok_or(EngineError::PoolExhausted { requested: count })?;

        self.blocks
            .try_reserve(count)
            .map_err(|_| EngineError::PoolExhausted { requested: count })?;
        self.spheres
            .try_reserve(count * self.stride)
            .map_err(|_| EngineError::PoolExhausted { requested: count })?;

        for i in start..end {
            let next = if i + 1 < end {
                Some(BlockHandle((i + 1) as u32))
            } else {
                self.free_head
            };
            self.blocks.push(SolventBlock::vacant(next));
        }
        self.spheres
            .resize(end * self.stride, AtomSphere::default());
        if count > 0 {
            self.free_head = Some(BlockHandle(start as u32));
        }
        Ok(())
    }

    /// Takes a block off the free list, growing the pool when it is empty.
    /// The block starts with one snapshot and no chain successor.
    pub fn grab(&mut self, solvent: u32, energy: f64) -> Result<BlockHandle, EngineError> {
        if self.free_head.is_none() {
            self.grow(POOL_GROWTH)?;
        }
        let handle = self
            .free_head
            .ok_or_else(|| EngineError::Internal("solvent pool free list is empty".into()))?;

        let block = &mut self.blocks[handle.index()];
        self.free_head = block.next_free.take();
        block.solvent = solvent;
        block.energy = energy;
        block.snaps = 1;
        block.chain = None;
        block.in_use = true;
        self.in_use += 1;
        Ok(handle)
    }

    /// Returns a block to the free list.
    pub fn release(&mut self, handle: BlockHandle) {
        let block = &mut self.blocks[handle.index()];
        debug_assert!(block.in_use, "block released twice");
        if !block.in_use {
            return;
        }
        block.in_use = false;
        block.chain = None;
        block.next_free = self.free_head;
        self.free_head = Some(handle);
        self.in_use -= 1;
    }

    /// Releases every block while keeping the storage.
    pub fn reset(&mut self) {
        let len = self.blocks.len();
        for (i, block) in self.blocks.iter_mut().enumerate() {
            *block = SolventBlock::vacant(if i + 1 < len {
                Some(BlockHandle((i + 1) as u32))
            } else {
                None
            });
        }
        self.free_head = (len > 0).then_some(BlockHandle(0));
        self.in_use = 0;
    }

    /// Drops all storage. A changed `stride` takes effect for later growth.
    pub fn clear(&mut self, stride: usize) {
        self.blocks = Vec::new();
        self.spheres = Vec::new();
        self.free_head = None;
        self.in_use = 0;
        self.stride = stride;
    }

    #[inline]
    pub fn block(&self, handle: BlockHandle) -> &SolventBlock {
        &self.blocks[handle.index()]
    }

    #[inline]
    pub fn block_mut(&mut self, handle: BlockHandle) -> &mut SolventBlock {
        &mut self.blocks[handle.index()]
    }

    #[inline]
    pub fn spheres(&self, handle: BlockHandle) -> &[AtomSphere] {
        let start = handle.index() * self.stride;
        &self.spheres[start..start + self.stride]
    }

    #[inline]
    pub fn spheres_mut(&mut self, handle: BlockHandle) -> &mut [AtomSphere] {
        let start = handle.index() * self.stride;
        &mut self.spheres[start..start + self.stride]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn grab_grows_an_empty_pool_by_one_chunk() {
        let mut pool = SolventBlockPool::new(3);
        let handle = pool.grab(7, -2.5).unwrap();
        assert_eq!(pool.capacity(), POOL_GROWTH);
        assert_eq!(pool.in_use(), 1);

        let block = pool.block(handle);
        assert_eq!(block.solvent, 7);
        assert_eq!(block.energy, -2.5);
        assert_eq!(block.snaps, 1);
        assert_eq!(block.chain, None);
        assert_eq!(pool.spheres(handle).len(), 3);
    }

    #[test]
    fn released_blocks_are_reused_first() {
        let mut pool = SolventBlockPool::with_capacity(1, 4).unwrap();
        let a = pool.grab(1, -1.0).unwrap();
        let b = pool.grab(2, -1.0).unwrap();
        assert_ne!(a, b);

        pool.release(a);
        assert_eq!(pool.in_use(), 1);
        let c = pool.grab(3, -1.0).unwrap();
        assert_eq!(c, a);
        assert_eq!(pool.block(c).solvent, 3);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn exhausting_preallocated_blocks_grows_the_pool() {
        let mut pool = SolventBlockPool::with_capacity(2, 2).unwrap();
        for i in 0..3 {
            pool.grab(i, -1.0).unwrap();
        }
        assert_eq!(pool.capacity(), 2 + POOL_GROWTH);
        assert_eq!(pool.in_use(), 3);
    }

    #[test]
    fn sphere_slots_do_not_alias() {
        let mut pool = SolventBlockPool::with_capacity(2, 2).unwrap();
        let a = pool.grab(0, -1.0).unwrap();
        let b = pool.grab(1, -1.0).unwrap();
        pool.spheres_mut(a)[1] = AtomSphere::new(Point3::new(1.0, 2.0, 3.0), 1.4);
        pool.spheres_mut(b)[0] = AtomSphere::new(Point3::new(4.0, 5.0, 6.0), 1.0);

        assert_eq!(pool.spheres(a)[1].position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(pool.spheres(a)[0], AtomSphere::default());
        assert_eq!(pool.spheres(b)[0].radius, 1.0);
    }

    #[test]
    fn reset_frees_every_block_and_keeps_storage() {
        let mut pool = SolventBlockPool::with_capacity(1, 8).unwrap();
        let handles: Vec<_> = (0..5).map(|i| pool.grab(i, -1.0).unwrap()).collect();
        pool.block_mut(handles[0]).chain = Some(handles[1]);

        pool.reset();
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.capacity(), 8);
        for i in 0..8 {
            pool.grab(i, -1.0).unwrap();
        }
        assert_eq!(pool.capacity(), 8);
    }

    #[test]
    fn clear_drops_storage_and_changes_stride() {
        let mut pool = SolventBlockPool::with_capacity(3, 16).unwrap();
        pool.grab(0, -1.0).unwrap();
        pool.clear(4);
        assert_eq!(pool.capacity(), 0);
        assert_eq!(pool.in_use(), 0);

        let handle = pool.grab(0, -1.0).unwrap();
        assert_eq!(pool.stride(), 4);
        assert_eq!(pool.spheres(handle).len(), 4);
    }
}
