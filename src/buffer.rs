//! Aligned staging buffer between the caller's samples and the kernels.
//!
//! The buffer is always full: staging `N` samples copies them to the front and
//! fills the remaining slots with +infinity, which a strict `<` comparison can
//! never select. Every stage rewrites the whole buffer, so nothing from an
//! earlier batch survives into the next one.

use crate::error::BottomError;

/// Slots per aligned block. Equal to the widest lane count (AVX-512).
pub const BLOCK_LANES: usize = 16;

/// Byte alignment of the buffer, one cache line.
pub const BUFFER_ALIGN: usize = 64;

/// Padding value; never smaller than any sample.
pub const NEUTRAL: f32 = f32::INFINITY;

#[derive(Clone, Copy)]
#[repr(C, align(64))]
struct Block([f32; BLOCK_LANES]);

const PADDING: Block = Block([NEUTRAL; BLOCK_LANES]);

/// Fixed-capacity, cache-line aligned working buffer.
///
/// Owned by one caller at a time; pass it by `&mut` to
/// [`crate::BottomSearch::find_with`] to reuse the allocation across calls.
#[derive(Clone)]
pub struct WorkingBuffer {
    blocks: Box<[Block]>,
    len: usize,
}

impl WorkingBuffer {
    /// Allocates a buffer of `capacity` slots, all set to the neutral value.
    pub fn new(capacity: usize) -> Result<Self, BottomError> {
        check_capacity(capacity)?;
        Ok(Self::with_checked_capacity(capacity))
    }

    pub(crate) fn with_checked_capacity(capacity: usize) -> Self {
        debug_assert!(check_capacity(capacity).is_ok());
        Self {
            blocks: vec![PADDING; capacity / BLOCK_LANES].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len() * BLOCK_LANES
    }

    /// Number of real samples from the last stage.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies `samples` to the front of the buffer and pads the rest.
    ///
    /// Returns the full, padded buffer.
    pub fn stage(&mut self, samples: &[f32]) -> Result<&[f32], BottomError> {
        let capacity = self.capacity();
        if samples.len() > capacity {
            return Err(BottomError::InvalidLength {
                len: samples.len(),
                capacity,
            });
        }

        let (head, pad) = self.slots_mut().split_at_mut(samples.len());
        head.copy_from_slice(samples);
        pad.fill(NEUTRAL);
        self.len = samples.len();

        let slots = self.as_slice();
        debug_assert_eq!(slots.as_ptr() as usize % BUFFER_ALIGN, 0);
        Ok(slots)
    }

    /// The whole buffer, padding included.
    pub fn as_slice(&self) -> &[f32] {
        // SAFETY: `Block` is `repr(C)` around `[f32; BLOCK_LANES]` and its size
        // is exactly 64 bytes, so the blocks form one contiguous run of f32s.
        unsafe { std::slice::from_raw_parts(self.blocks.as_ptr().cast::<f32>(), self.capacity()) }
    }

    /// Only the samples from the last stage.
    pub fn real(&self) -> &[f32] {
        &self.as_slice()[..self.len]
    }

    fn slots_mut(&mut self) -> &mut [f32] {
        let capacity = self.capacity();
        // SAFETY: see `as_slice`; the exclusive borrow of `self` covers every block.
        unsafe { std::slice::from_raw_parts_mut(self.blocks.as_mut_ptr().cast::<f32>(), capacity) }
    }
}

impl std::fmt::Debug for WorkingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish()
    }
}

/// Capacities must fill whole blocks and keep indices within `i32` lanes.
pub(crate) fn check_capacity(capacity: usize) -> Result<(), BottomError> {
    if capacity == 0 || capacity % BLOCK_LANES != 0 || capacity > i32::MAX as usize {
        return Err(BottomError::InvalidCapacity {
            capacity,
            lanes: BLOCK_LANES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_layout_is_one_cache_line() {
        assert_eq!(std::mem::size_of::<Block>(), BUFFER_ALIGN);
        assert_eq!(std::mem::align_of::<Block>(), BUFFER_ALIGN);
    }

    #[test]
    fn stage_pads_with_neutral() {
        let mut buffer = WorkingBuffer::new(32).unwrap();
        let staged = buffer.stage(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(staged.len(), 32);
        assert_eq!(&staged[..3], &[1.0, 2.0, 3.0]);
        assert!(staged[3..].iter().all(|&v| v == NEUTRAL));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.real(), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.as_slice().as_ptr() as usize % BUFFER_ALIGN, 0);
    }

    #[test]
    fn restaging_clears_previous_batch() {
        let mut buffer = WorkingBuffer::new(16).unwrap();
        buffer.stage(&[-7.0; 16]).unwrap();
        let staged = buffer.stage(&[4.0, 5.0]).unwrap();
        assert_eq!(&staged[..2], &[4.0, 5.0]);
        assert!(staged[2..].iter().all(|&v| v == NEUTRAL));

        buffer.stage(&[]).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.as_slice().iter().all(|&v| v == NEUTRAL));
    }

    #[test]
    fn stage_full_capacity() {
        let samples: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let mut buffer = WorkingBuffer::new(64).unwrap();
        assert_eq!(buffer.stage(&samples).unwrap(), samples.as_slice());
    }

    #[test]
    fn stage_rejects_oversized_batch() {
        let mut buffer = WorkingBuffer::new(16).unwrap();
        buffer.stage(&[1.0; 4]).unwrap();
        assert_eq!(
            buffer.stage(&[0.0; 17]),
            Err(BottomError::InvalidLength {
                len: 17,
                capacity: 16
            })
        );
        // A rejected stage leaves the previous batch untouched.
        assert_eq!(buffer.real(), &[1.0; 4]);
    }

    #[test]
    fn capacity_validation() {
        for capacity in [0, 8, 1000, 1025] {
            assert_eq!(
                WorkingBuffer::new(capacity).map(|b| b.capacity()),
                Err(BottomError::InvalidCapacity {
                    capacity,
                    lanes: BLOCK_LANES
                })
            );
        }
        assert_eq!(WorkingBuffer::new(1024).unwrap().capacity(), 1024);
    }
}
