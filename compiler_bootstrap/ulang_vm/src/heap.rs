//! First-fit free-list heap allocator with coalescing, backing a single
//! fixed-size byte pool allocated at VM startup.

use crate::error::VmError;
use hashbrown::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeBlock {
    offset: u32,
    size: u32,
}

pub struct Heap {
    pool: Vec<u8>,
    limit_bytes: Option<usize>,
    free: Vec<FreeBlock>,
    allocated: HashMap<u32, u32>,
    used: usize,
}

impl Heap {
    pub fn new(start_kb: u32, limit_kb: u32) -> Self {
        let size = start_kb as usize * 1024;
        log::debug!("HEAP: Heap initialization");
        log::debug!("HEAP: Heap size starting: {start_kb}K, max: {limit_kb}K");

        Self {
            pool: vec![0u8; size],
            limit_bytes: if limit_kb == 0 { None } else { Some(limit_kb as usize * 1024) },
            free: vec![FreeBlock { offset: 0, size: size as u32 }],
            allocated: HashMap::new(),
            used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// First-fit walk of the free list; splits the remainder back in.
    pub fn alloc(&mut self, n: u32) -> Result<u32, VmError> {
        if n == 0 {
            return Ok(0);
        }
        if let Some(limit) = self.limit_bytes {
            if self.used + n as usize > limit {
                return Err(VmError::OutOfMemory { requested: n });
            }
        }

        let idx = self
            .free
            .iter()
            .position(|b| b.size >= n)
            .ok_or(VmError::OutOfMemory { requested: n })?;
        let block = self.free[idx];

        if block.size == n {
            self.free.remove(idx);
        } else {
            self.free[idx] = FreeBlock { offset: block.offset + n, size: block.size - n };
        }

        self.allocated.insert(block.offset, n);
        self.used += n as usize;
        log::debug!("HEAP: alloc: {n}, now occupied {}", self.used);
        log::trace!("HEAP:   --> addr: {:#x}", block.offset);
        Ok(block.offset)
    }

    /// Prepends the block to the free list and coalesces adjacent physical
    /// neighbors.
    pub fn free(&mut self, ptr: u32) -> Result<(), VmError> {
        let size = self
            .allocated
            .remove(&ptr)
            .ok_or(VmError::HeapOob { offset: ptr, heap_size: self.pool.len() as u32 })?;

        self.used -= size as usize;
        self.free.push(FreeBlock { offset: ptr, size });
        self.free.sort_by_key(|b| b.offset);
        self.coalesce();
        log::debug!("HEAP: free: offset={ptr:#x}");
        Ok(())
    }

    fn coalesce(&mut self) {
        let mut merged: Vec<FreeBlock> = Vec::with_capacity(self.free.len());
        for block in self.free.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.offset + last.size == block.offset {
                    last.size += block.size;
                    continue;
                }
            }
            merged.push(block);
        }
        self.free = merged;
    }

    fn bounds_check(&self, offset: u32, width: u32) -> Result<(), VmError> {
        if offset as usize + width as usize > self.pool.len() {
            return Err(VmError::HeapOob { offset, heap_size: self.pool.len() as u32 });
        }
        Ok(())
    }

    pub fn read_u64(&self, offset: u32) -> Result<u64, VmError> {
        self.bounds_check(offset, 8)?;
        let bytes: [u8; 8] = self.pool[offset as usize..offset as usize + 8].try_into().unwrap();
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn write_u64(&mut self, offset: u32, value: u64) -> Result<(), VmError> {
        self.bounds_check(offset, 8)?;
        self.pool[offset as usize..offset as usize + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_free_restores_used_bytes() {
        let mut heap = Heap::new(4, 0);
        let before = heap.used();
        let p = heap.alloc(64).unwrap();
        assert_eq!(heap.used(), before + 64);
        heap.free(p).unwrap();
        assert_eq!(heap.used(), before);
        assert_eq!(heap.free.len(), 1);
    }

    #[test]
    fn out_of_memory_when_limit_exceeded() {
        let mut heap = Heap::new(4, 1);
        assert!(matches!(heap.alloc(2000), Err(VmError::OutOfMemory { .. })));
    }

    #[test]
    fn read_write_round_trips_and_bounds_check() {
        let mut heap = Heap::new(1, 0);
        let p = heap.alloc(8).unwrap();
        heap.write_u64(p, 0xdead_beef).unwrap();
        assert_eq!(heap.read_u64(p).unwrap(), 0xdead_beef);
        assert!(matches!(heap.read_u64(heap.len() as u32), Err(VmError::HeapOob { .. })));
    }

    proptest::proptest! {
        #[test]
        fn alloc_free_sequences_always_coalesce_to_one_block(sizes in proptest::collection::vec(8u32..256, 1..12)) {
            let mut heap = Heap::new(64, 0);
            let mut ptrs = Vec::new();
            for &size in &sizes {
                if let Ok(p) = heap.alloc(size) {
                    ptrs.push(p);
                }
            }
            for p in ptrs {
                heap.free(p).unwrap();
            }
            proptest::prop_assert_eq!(heap.used(), 0);
            proptest::prop_assert_eq!(heap.free.len(), 1);
        }
    }
}
