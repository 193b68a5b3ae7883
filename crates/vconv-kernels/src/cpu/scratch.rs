//! Heap scratch storage for the vector kernels
//!
//! All buffers here start on a 32-byte boundary, which covers both 16-byte
//! SSE loads and 32-byte AVX loads. Nothing is placed on the stack, so input
//! length is bounded only by available memory.

use bytemuck::{Pod, Zeroable};

/// Alignment guaranteed for the start of every scratch buffer, in bytes.
pub const ALIGNMENT: usize = 32;

const BLOCK_FLOATS: usize = ALIGNMENT / size_of::<f32>();

#[derive(Clone, Copy, Default)]
#[repr(C, align(32))]
struct AlignedBlock([f32; BLOCK_FLOATS]);

// SAFETY: `AlignedBlock` is `repr(C)` over `[f32; 8]`; its 32 bytes exactly
// fill the 32-byte alignment, so there is no padding and every bit pattern
// is a valid value.
unsafe impl Zeroable for AlignedBlock {}
unsafe impl Pod for AlignedBlock {}

/// Zero-initialised `f32` buffer whose first element is 32-byte aligned.
#[derive(Clone, Default)]
pub struct AlignedBuffer {
    blocks: Vec<AlignedBlock>,
    len: usize,
}

impl AlignedBuffer {
    pub fn zeroed(len: usize) -> Self {
        Self { blocks: vec![AlignedBlock::zeroed(); len.div_ceil(BLOCK_FLOATS)], len }
    }

    pub fn from_slice(data: &[f32]) -> Self {
        let mut buffer = Self::zeroed(data.len());
        buffer.as_mut_slice().copy_from_slice(data);
        buffer
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        &bytemuck::cast_slice::<AlignedBlock, f32>(&self.blocks)[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut bytemuck::cast_slice_mut::<AlignedBlock, f32>(&mut self.blocks)[..self.len]
    }
}

/// Kernel taps expanded into vector-register-sized entries.
///
/// Entries are stored back to back, each `lanes` floats wide, so entry `e`
/// starts at float offset `e * lanes` and inherits the buffer alignment.
pub struct BroadcastKernel {
    lanes: usize,
    entries: usize,
    data: AlignedBuffer,
}

impl BroadcastKernel {
    /// One entry per tap: entry `k` is `kernel[K - 1 - k]` repeated `lanes` times.
    pub fn broadcast(kernel: &[f32], lanes: usize) -> Self {
        let mut data = AlignedBuffer::zeroed(kernel.len() * lanes);
        for (entry, &weight) in data.as_mut_slice().chunks_exact_mut(lanes).zip(kernel.iter().rev()) {
            entry.fill(weight);
        }
        Self { lanes, entries: kernel.len(), data }
    }

    /// Two taps per 8-wide entry, for kernels whose length is a multiple of 8.
    ///
    /// With `rev` the reversed kernel, entry `e` holds `rev[t]` in its low four
    /// lanes and `rev[t + 4]` in its high four lanes, where `t` is
    /// [`paired_tap(e)`](Self::paired_tap). Any trailing taps that do not fill
    /// a group of eight are left out.
    pub fn paired(kernel: &[f32]) -> Self {
        let reversed: Vec<f32> = kernel.iter().rev().copied().collect();
        let entries = kernel.len() / 8 * 4;
        let mut data = AlignedBuffer::zeroed(entries * 8);
        for (e, entry) in data.as_mut_slice().chunks_exact_mut(8).enumerate() {
            let t = Self::paired_tap(e);
            let (low, high) = entry.split_at_mut(4);
            low.fill(reversed[t]);
            high.fill(reversed[t + 4]);
        }
        Self { lanes: 8, entries, data }
    }

    /// Reversed-kernel index held in the low half of paired entry `entry`.
    #[inline(always)]
    pub const fn paired_tap(entry: usize) -> usize {
        (entry / 4) * 8 + entry % 4
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn entry(&self, index: usize) -> &[f32] {
        &self.data.as_slice()[index * self.lanes..(index + 1) * self.lanes]
    }

    pub fn as_ptr(&self) -> *const f32 {
        self.data.as_slice().as_ptr()
    }
}

/// Shifted copies of the input signal.
///
/// Copy `j` holds `input[j..]` in its own aligned buffer. Input position `p`
/// is then found in copy `p % count` at offset `p - p % count`, which is a
/// multiple of `count`; with `count` floats matching the load width every
/// such read is aligned.
pub struct ShadowCopies {
    copies: Vec<AlignedBuffer>,
}

impl ShadowCopies {
    pub fn build(input: &[f32], count: usize) -> Self {
        let copies = (0..count).map(|j| AlignedBuffer::from_slice(input.get(j..).unwrap_or(&[]))).collect();
        Self { copies }
    }

    pub fn count(&self) -> usize {
        self.copies.len()
    }

    pub fn copy(&self, j: usize) -> &[f32] {
        self.copies[j].as_slice()
    }

    /// `(copy, offset)` holding input position `position`.
    #[inline(always)]
    pub fn locate(&self, position: usize) -> (usize, usize) {
        let copy = position % self.copies.len();
        (copy, position - copy)
    }
}
