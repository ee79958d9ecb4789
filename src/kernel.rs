//! Finding the bottom (minimum value and its index) of an `f32` slice.
//!
//! Both paths share one contract: strict `<` comparisons, first occurrence wins
//! on ties, and NaN never wins a comparison. The reported value is always read
//! back from the input at the winning index, so every path is bit-identical.
//!
//! # Strategies
//!
//! | Function | Strategy | Lanes |
//! |----------|----------|-------|
//! | [`bottom_scalar`] | Sequential scan | 1 |
//! | [`bottom_vectorized`] | Parallel value/index tracking with `blendv` | 4 (SSE4.1/NEON), 8 (AVX2), 16 (AVX-512) |
//!
//! # Lane-wise index tracking
//!
//! The vector path keeps two registers: running minimum values (seeded with
//! +infinity) and the indices where they were found (seeded with -1). Each
//! chunk is compared against the running minimum with an ordered, quiet
//! less-than; the resulting mask blends the chunk into the value register and
//! the chunk's indices into the index register. Because each lane only ever
//! moves forward through the slice, a lane holds the first occurrence of its
//! own minimum, and a horizontal pass that breaks ties by lowest index
//! reproduces the sequential answer exactly.
//!
//! # The +infinity corner
//!
//! +infinity is both the seed and the padding sentinel, so a slice whose
//! smallest comparable value is +infinity never updates a lane. In that case
//! the result resolves to the first element equal to +infinity, which is
//! exactly where a sequential scan would have stopped.

use crate::strategy::{SimdLevel, VectorIsa};

/// Index marker for "no comparable element seen yet".
const UNSET: usize = usize::MAX;

/// The bottom of a batch: its smallest value and the first index holding it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bottom {
    pub value: f32,
    pub index: usize,
}

impl Bottom {
    /// Bit pattern of the value, for comparisons that must treat `-0.0` and
    /// `0.0` as distinct.
    pub fn value_bits(&self) -> u32 {
        self.value.to_bits()
    }
}

/// Sequential bottom search.
///
/// This is the reference every vector kernel must agree with, and the path
/// taken when the CPU has no usable vector extension.
pub fn bottom_scalar(values: &[f32]) -> Option<Bottom> {
    let mut best_min = f32::INFINITY;
    let mut best_idx = UNSET;

    for (i, &v) in values.iter().enumerate() {
        if v < best_min {
            best_min = v;
            best_idx = i;
        }
    }

    resolve(values, best_idx)
}

/// Vectorized bottom search using the best vector extension this CPU offers.
///
/// Falls back to [`bottom_scalar`] when no extension is available. Unlike
/// [`crate::Strategy::detected`], this ignores `BOTTOM_FORCE_SCALAR`.
pub fn bottom_vectorized(values: &[f32]) -> Option<Bottom> {
    match VectorIsa::best() {
        Some(isa) => bottom_with(isa, values),
        None => bottom_scalar(values),
    }
}

/// Runs the kernel for a specific, already verified, vector extension.
pub(crate) fn bottom_with(isa: VectorIsa, values: &[f32]) -> Option<Bottom> {
    if values.len() < isa.lanes() || values.len() > i32::MAX as usize {
        return bottom_scalar(values);
    }

    match isa.level() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        // SAFETY: `VectorIsa` is only constructed after SSE4.1 runtime detection.
        SimdLevel::Sse41 => unsafe { x86_sse41::bottom_sse41(values) },
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        // SAFETY: `VectorIsa` is only constructed after AVX2 runtime detection.
        SimdLevel::Avx2 => unsafe { x86_avx2::bottom_avx2(values) },
        #[cfg(target_arch = "x86_64")]
        // SAFETY: `VectorIsa` is only constructed after AVX-512 runtime detection.
        SimdLevel::Avx512 => unsafe { x86_avx512::bottom_avx512(values) },
        #[cfg(target_arch = "aarch64")]
        // SAFETY: aarch64 guarantees NEON availability.
        SimdLevel::Neon => unsafe { aarch64_neon::bottom_neon(values) },
        _ => bottom_scalar(values),
    }
}

/// Runtime detection for SSE4.1 support.
pub fn sse41_available() -> bool {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        std::arch::is_x86_feature_detected!("sse4.1")
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        false
    }
}

/// Runtime detection for AVX2 support.
pub fn avx2_available() -> bool {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        std::arch::is_x86_feature_detected!("avx2")
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        false
    }
}

/// Runtime detection for AVX-512 support.
pub fn avx512_available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        std::arch::is_x86_feature_detected!("avx512f")
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

/// Runtime availability for any vector kernel (SSE4.1/AVX2/AVX-512 on x86, NEON on aarch64).
pub fn simd_available() -> bool {
    VectorIsa::best().is_some()
}

/// Horizontal reduction of per-lane partial results, then a scalar pass over
/// `values[tail_start..]`.
///
/// Lanes whose index is still negative never saw a comparable element.
#[inline]
fn finish(values: &[f32], mins: &[f32], idxs: &[i32], tail_start: usize) -> Option<Bottom> {
    let mut best_min = f32::INFINITY;
    let mut best_idx = UNSET;

    for (&v, &idx) in mins.iter().zip(idxs) {
        if idx < 0 {
            continue;
        }
        let idx = idx as usize;
        // Tie-break by index so the first occurrence wins.
        if v < best_min || (v == best_min && idx < best_idx) {
            best_min = v;
            best_idx = idx;
        }
    }

    for (offset, &v) in values[tail_start..].iter().enumerate() {
        if v < best_min {
            best_min = v;
            best_idx = tail_start + offset;
        }
    }

    resolve(values, best_idx)
}

#[inline]
fn resolve(values: &[f32], best_idx: usize) -> Option<Bottom> {
    if best_idx != UNSET {
        return Some(Bottom {
            value: values[best_idx],
            index: best_idx,
        });
    }

    // Nothing compared below +infinity: either every element is NaN, or the
    // smallest comparable element is +infinity itself.
    values
        .iter()
        .position(|&v| v == f32::INFINITY)
        .map(|index| Bottom {
            value: f32::INFINITY,
            index,
        })
}

/// SSE4.1 kernel for x86/x86_64 (4 lanes).
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[allow(unsafe_op_in_unsafe_fn)]
mod x86_sse41 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86 as arch;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64 as arch;

    use arch::{
        __m128i, _mm_add_epi32, _mm_blendv_epi8, _mm_blendv_ps, _mm_castps_si128, _mm_cmplt_ps,
        _mm_loadu_ps, _mm_set1_epi32, _mm_set1_ps, _mm_setr_epi32, _mm_storeu_ps,
        _mm_storeu_si128,
    };

    use super::Bottom;

    /// Parallel bottom search tracking values and indices in 4-lane registers.
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn bottom_sse41(values: &[f32]) -> Option<Bottom> {
        let len = values.len();
        let ptr = values.as_ptr();
        let mut i = 0usize;
        let vec_len = len & !3;

        let mut min_v = _mm_set1_ps(f32::INFINITY);
        let mut idx_v = _mm_set1_epi32(-1);
        let mut cur = _mm_setr_epi32(0, 1, 2, 3);
        let step = _mm_set1_epi32(4);

        while i < vec_len {
            let x = _mm_loadu_ps(ptr.add(i));
            // cmplt is ordered: NaN lanes compare false and never blend in.
            let mask = _mm_cmplt_ps(x, min_v);
            min_v = _mm_blendv_ps(min_v, x, mask);
            idx_v = _mm_blendv_epi8(idx_v, cur, _mm_castps_si128(mask));
            cur = _mm_add_epi32(cur, step);
            i += 4;
        }

        let mut min_arr = [0f32; 4];
        let mut idx_arr = [0i32; 4];
        _mm_storeu_ps(min_arr.as_mut_ptr(), min_v);
        _mm_storeu_si128(idx_arr.as_mut_ptr() as *mut __m128i, idx_v);

        super::finish(values, &min_arr, &idx_arr, i)
    }
}

/// AVX2 kernel for x86/x86_64 (8 lanes).
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[allow(unsafe_op_in_unsafe_fn)]
mod x86_avx2 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86 as arch;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64 as arch;

    use arch::{
        __m256i, _CMP_LT_OQ, _mm256_add_epi32, _mm256_blendv_epi8, _mm256_blendv_ps,
        _mm256_castps_si256, _mm256_cmp_ps, _mm256_loadu_ps, _mm256_set1_epi32, _mm256_set1_ps,
        _mm256_setr_epi32, _mm256_storeu_ps, _mm256_storeu_si256,
    };

    use super::Bottom;

    /// Parallel bottom search tracking both values and indices in SIMD registers.
    ///
    /// Maintains two 8-lane vectors:
    /// - `min_v`: current minimum values for each lane
    /// - `idx_v`: indices where those minimums were found, -1 until a lane updates
    ///
    /// `_CMP_LT_OQ` builds a mask of lanes where the new value is strictly
    /// smaller (false for NaN), and `blendv` uses it to update both vectors.
    #[target_feature(enable = "avx2")]
    pub unsafe fn bottom_avx2(values: &[f32]) -> Option<Bottom> {
        let len = values.len();
        let ptr = values.as_ptr();
        let mut i = 0usize;
        let vec_len = len & !7;

        let mut min_v = _mm256_set1_ps(f32::INFINITY);
        let mut idx_v = _mm256_set1_epi32(-1);
        // Current indices: [0, 1, 2, 3, 4, 5, 6, 7], incremented by 8 each iteration
        let mut cur = _mm256_setr_epi32(0, 1, 2, 3, 4, 5, 6, 7);
        let step = _mm256_set1_epi32(8);

        while i < vec_len {
            let x = _mm256_loadu_ps(ptr.add(i));
            let mask = _mm256_cmp_ps::<_CMP_LT_OQ>(x, min_v);
            min_v = _mm256_blendv_ps(min_v, x, mask);
            idx_v = _mm256_blendv_epi8(idx_v, cur, _mm256_castps_si256(mask));
            cur = _mm256_add_epi32(cur, step);
            i += 8;
        }

        let mut min_arr = [0f32; 8];
        let mut idx_arr = [0i32; 8];
        _mm256_storeu_ps(min_arr.as_mut_ptr(), min_v);
        _mm256_storeu_si256(idx_arr.as_mut_ptr() as *mut __m256i, idx_v);

        super::finish(values, &min_arr, &idx_arr, i)
    }
}

/// AVX-512 kernel for x86_64 (16 lanes).
#[cfg(target_arch = "x86_64")]
#[allow(unsafe_op_in_unsafe_fn)]
mod x86_avx512 {
    use std::arch::x86_64 as arch;

    use arch::{
        __m512i, _CMP_LT_OQ, _mm512_add_epi32, _mm512_cmp_ps_mask, _mm512_loadu_ps,
        _mm512_mask_blend_epi32, _mm512_mask_blend_ps, _mm512_set1_epi32, _mm512_set1_ps,
        _mm512_setr_epi32, _mm512_storeu_ps, _mm512_storeu_si512,
    };

    use super::Bottom;

    /// Parallel bottom search using AVX-512 mask registers.
    #[target_feature(enable = "avx512f")]
    pub unsafe fn bottom_avx512(values: &[f32]) -> Option<Bottom> {
        let len = values.len();
        let ptr = values.as_ptr();
        let mut i = 0usize;
        let vec_len = len & !15;

        let mut min_v = _mm512_set1_ps(f32::INFINITY);
        let mut idx_v = _mm512_set1_epi32(-1);
        let mut cur = _mm512_setr_epi32(0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15);
        let step = _mm512_set1_epi32(16);

        while i < vec_len {
            let x = _mm512_loadu_ps(ptr.add(i));
            let mask = _mm512_cmp_ps_mask::<_CMP_LT_OQ>(x, min_v);
            min_v = _mm512_mask_blend_ps(mask, min_v, x);
            idx_v = _mm512_mask_blend_epi32(mask, idx_v, cur);
            cur = _mm512_add_epi32(cur, step);
            i += 16;
        }

        let mut min_arr = [0f32; 16];
        let mut idx_arr = [0i32; 16];
        _mm512_storeu_ps(min_arr.as_mut_ptr(), min_v);
        _mm512_storeu_si512(idx_arr.as_mut_ptr() as *mut __m512i, idx_v);

        super::finish(values, &min_arr, &idx_arr, i)
    }
}

/// NEON kernel for aarch64 (4 lanes).
#[cfg(target_arch = "aarch64")]
#[allow(unsafe_op_in_unsafe_fn)]
mod aarch64_neon {
    use std::arch::aarch64::*;

    use super::Bottom;

    /// Parallel bottom search tracking both values and indices in NEON registers.
    #[target_feature(enable = "neon")]
    pub unsafe fn bottom_neon(values: &[f32]) -> Option<Bottom> {
        let len = values.len();
        let ptr = values.as_ptr();
        let mut i = 0usize;
        let vec_len = len & !3;

        let mut min_v = vdupq_n_f32(f32::INFINITY);
        let mut idx_v = vdupq_n_s32(-1);
        let indices = [0i32, 1, 2, 3];
        let mut cur = vld1q_s32(indices.as_ptr());
        let step = vdupq_n_s32(4);

        while i < vec_len {
            let x = vld1q_f32(ptr.add(i));
            let mask = vcltq_f32(x, min_v);
            min_v = vbslq_f32(mask, x, min_v);
            idx_v = vbslq_s32(mask, cur, idx_v);
            cur = vaddq_s32(cur, step);
            i += 4;
        }

        let mut min_arr = [0f32; 4];
        let mut idx_arr = [0i32; 4];
        vst1q_f32(min_arr.as_mut_ptr(), min_v);
        vst1q_s32(idx_arr.as_mut_ptr(), idx_v);

        super::finish(values, &min_arr, &idx_arr, i)
    }
}
