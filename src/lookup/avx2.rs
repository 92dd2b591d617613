//! AVX2 + FMA row kernels for `f32` accumulation.
//!
//! Only reached through [`reduce`], which the dispatcher calls after
//! [`available`] returned true.

use super::element::Element;
use super::index::LookupIndex;
use super::kernel::reduce_blocked;
use super::rows::Rows;
use super::Lookup;
use std::arch::x86_64::*;

const LANES: usize = 8;
const CACHE_LINE: usize = 64;

#[inline]
pub(crate) fn available() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

/// Driver compiled with AVX2 enabled so the row kernels below inline into it.
///
/// # Safety
/// The CPU must support `avx2` and `fma` (see [`available`]).
#[target_feature(enable = "avx2", enable = "fma")]
pub(crate) unsafe fn reduce<I, E>(lookup: &Lookup<'_, I, E>, out: &mut [f32])
where
    I: LookupIndex,
    E: Element,
    Avx2: Rows<E, f32>,
{
    reduce_blocked::<I, E, f32, Avx2>(lookup, out)
}

pub(crate) struct Avx2;

// SAFETY (all impls below): `Avx2` only runs inside `reduce`, whose caller
// checked `available()`.
impl Rows<f32, f32> for Avx2 {
    const PREFETCH: bool = true;

    #[inline(always)]
    fn add(dst: &mut [f32], src: &[f32]) { unsafe { add_f32(dst, src) } }

    #[inline(always)]
    fn scale_add(dst: &mut [f32], src: &[f32], a: f32) { unsafe { scale_add_f32(dst, src, a) } }

    #[inline(always)]
    fn affine_add(dst: &mut [f32], src: &[f32], a: f32, b: f32) { unsafe { affine_add_f32(dst, src, a, b) } }

    #[inline(always)]
    fn prefetch(row: &[f32]) { unsafe { prefetch_row(row) } }
}

impl Rows<u8, f32> for Avx2 {
    const PREFETCH: bool = true;

    #[inline(always)]
    fn add(dst: &mut [f32], src: &[u8]) { unsafe { affine_add_u8(dst, src, 1.0, 0.0) } }

    #[inline(always)]
    fn scale_add(dst: &mut [f32], src: &[u8], a: f32) { unsafe { affine_add_u8(dst, src, a, 0.0) } }

    #[inline(always)]
    fn affine_add(dst: &mut [f32], src: &[u8], a: f32, b: f32) { unsafe { affine_add_u8(dst, src, a, b) } }

    #[inline(always)]
    fn prefetch(row: &[u8]) { unsafe { prefetch_row(row) } }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn prefetch_row<T>(row: &[T]) {
    let step = (CACHE_LINE / std::mem::size_of::<T>()).max(1);
    for line in row.chunks(step) {
        _mm_prefetch::<_MM_HINT_T0>(line.as_ptr() as *const i8);
    }
}

#[inline]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn add_f32(dst: &mut [f32], src: &[f32]) {
    let n = dst.len().min(src.len());
    let d = dst.as_mut_ptr();
    let s = src.as_ptr();
    let mut i = 0;
    while i + LANES <= n {
        let acc = _mm256_loadu_ps(d.add(i));
        _mm256_storeu_ps(d.add(i), _mm256_add_ps(acc, _mm256_loadu_ps(s.add(i))));
        i += LANES;
    }
    while i < n {
        *d.add(i) += *s.add(i);
        i += 1;
    }
}

#[inline]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn scale_add_f32(dst: &mut [f32], src: &[f32], a: f32) {
    let n = dst.len().min(src.len());
    let d = dst.as_mut_ptr();
    let s = src.as_ptr();
    let va = _mm256_set1_ps(a);
    let mut i = 0;
    while i + LANES <= n {
        let acc = _mm256_loadu_ps(d.add(i));
        _mm256_storeu_ps(d.add(i), _mm256_fmadd_ps(va, _mm256_loadu_ps(s.add(i)), acc));
        i += LANES;
    }
    while i < n {
        *d.add(i) = a.mul_add(*s.add(i), *d.add(i));
        i += 1;
    }
}

// dst = a * src + (b + dst), fused; the tail uses the same association.
#[inline]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn affine_add_f32(dst: &mut [f32], src: &[f32], a: f32, b: f32) {
    let n = dst.len().min(src.len());
    let d = dst.as_mut_ptr();
    let s = src.as_ptr();
    let va = _mm256_set1_ps(a);
    let vb = _mm256_set1_ps(b);
    let mut i = 0;
    while i + LANES <= n {
        let acc = _mm256_add_ps(vb, _mm256_loadu_ps(d.add(i)));
        _mm256_storeu_ps(d.add(i), _mm256_fmadd_ps(va, _mm256_loadu_ps(s.add(i)), acc));
        i += LANES;
    }
    while i < n {
        *d.add(i) = a.mul_add(*s.add(i), b + *d.add(i));
        i += 1;
    }
}

#[inline]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn affine_add_u8(dst: &mut [f32], src: &[u8], a: f32, b: f32) {
    let n = dst.len().min(src.len());
    let d = dst.as_mut_ptr();
    let s = src.as_ptr();
    let va = _mm256_set1_ps(a);
    let vb = _mm256_set1_ps(b);
    let mut i = 0;
    while i + LANES <= n {
        let bytes = _mm_loadl_epi64(s.add(i) as *const __m128i);
        let x = _mm256_cvtepi32_ps(_mm256_cvtepu8_epi32(bytes));
        let acc = _mm256_add_ps(vb, _mm256_loadu_ps(d.add(i)));
        _mm256_storeu_ps(d.add(i), _mm256_fmadd_ps(va, x, acc));
        i += LANES;
    }
    while i < n {
        *d.add(i) = a.mul_add(*s.add(i) as f32, b + *d.add(i));
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_rows_match_scalar_decode() {
        if !available() { return; }
        let src: Vec<u8> = (0..37u32).map(|v| (v * 7 % 256) as u8).collect();
        let mut dst = vec![0.5f32; src.len()];
        unsafe { affine_add_u8(&mut dst, &src, 0.25, -1.0) };
        for (d, &s) in dst.iter().zip(&src) {
            assert_eq!(*d, 0.25 * s as f32 + (-1.0 + 0.5));
        }
    }

    #[test]
    fn f32_add_covers_tail() {
        if !available() { return; }
        let src: Vec<f32> = (0..19).map(|v| v as f32).collect();
        let mut dst = vec![1.0f32; 19];
        unsafe { add_f32(&mut dst, &src) };
        assert_eq!(dst, (0..19).map(|v| v as f32 + 1.0).collect::<Vec<_>>());
    }
}
