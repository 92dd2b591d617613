use super::element::{Accum, Element};
use super::index::LookupIndex;
use super::rows::{Portable, Rows};
use super::Lookup;
use half::f16;

/// Positions ahead of the current one whose table row gets prefetched.
pub const PREFETCH_DISTANCE: usize = 16;

/// Block widths with a dedicated, fully unrolled instantiation.
pub const SPECIALIZED_BLOCK_SIZES: [usize; 4] = [16, 32, 64, 128];

/// A reduction from table elements `Self` into accumulator `O`.
///
/// One impl per supported `(element, accumulator)` pair; each picks its
/// fastest row kernels once per call.
pub trait Kernel<O: Accum>: Element {
    /// Reduces an already validated lookup into `out`.
    ///
    /// Callers go through [`super::embedding_lookup`]; this panics instead of
    /// reporting when handed a lookup that fails [`Lookup::validate`].
    ///
    /// # Panics
    ///
    /// If `out.len() != output_size * block_size`. Debug builds also re-run
    /// [`Lookup::validate`] and panic on any violation it reports.
    fn reduce<I: LookupIndex>(lookup: &Lookup<'_, I, Self>, out: &mut [O]);
}

/// Picks the block-width instantiation. Paid once per call.
#[inline(always)]
pub(crate) fn reduce_blocked<I, E, O, R>(lookup: &Lookup<'_, I, E>, out: &mut [O])
where
    I: LookupIndex,
    E: Element,
    O: Accum,
    R: Rows<E, O>,
{
    debug_assert_eq!(lookup.validate(), Ok(()), "kernel handed an invalid lookup");
    assert_eq!(
        Some(out.len()),
        lookup.output_size.checked_mul(lookup.block_size),
        "output buffer does not hold output_size * block_size values"
    );
    match lookup.block_size {
        16 => reduce_variant::<I, E, O, R, 16>(lookup, out),
        32 => reduce_variant::<I, E, O, R, 32>(lookup, out),
        64 => reduce_variant::<I, E, O, R, 64>(lookup, out),
        128 => reduce_variant::<I, E, O, R, 128>(lookup, out),
        _ => reduce_variant::<I, E, O, R, 0>(lookup, out),
    }
}

/// Picks one of the four loop bodies: raw or dequantizing, unweighted or
/// weighted. `BLOCK == 0` means the width is only known at run time.
#[inline(always)]
fn reduce_variant<I, E, O, R, const BLOCK: usize>(lookup: &Lookup<'_, I, E>, out: &mut [O])
where
    I: LookupIndex,
    E: Element,
    O: Accum,
    R: Rows<E, O>,
{
    let scale_bias = if E::QUANTIZED { lookup.scale_bias } else { None };
    match (scale_bias, lookup.weights) {
        (None, None) => for_each_bag::<I, E, O, R, BLOCK, _>(lookup, out, |dst, src, _, _| R::add(dst, src)),
        (None, Some(w)) => for_each_bag::<I, E, O, R, BLOCK, _>(lookup, out, |dst, src, _, pos| {
            R::scale_add(dst, src, O::from_f32(w[pos]))
        }),
        (Some(sb), None) => for_each_bag::<I, E, O, R, BLOCK, _>(lookup, out, |dst, src, row, _| {
            R::affine_add(dst, src, O::from_f32(sb[2 * row]), O::from_f32(sb[2 * row + 1]))
        }),
        (Some(sb), Some(w)) => for_each_bag::<I, E, O, R, BLOCK, _>(lookup, out, |dst, src, row, pos| {
            let w = O::from_f32(w[pos]);
            R::affine_add(dst, src, w * O::from_f32(sb[2 * row]), w * O::from_f32(sb[2 * row + 1]))
        }),
    }
}

/// Walks the bags in order. Within a bag rows are accumulated left to right
/// in index order; normalization runs on the finished row.
#[inline(always)]
fn for_each_bag<I, E, O, R, const BLOCK: usize, F>(lookup: &Lookup<'_, I, E>, out: &mut [O], mut accumulate: F)
where
    I: LookupIndex,
    E: Element,
    O: Accum,
    R: Rows<E, O>,
    F: FnMut(&mut [O], &[E], usize, usize),
{
    let bs = if BLOCK > 0 { BLOCK } else { lookup.block_size };
    let input = lookup.input;
    let indices = lookup.indices;
    let mut pos = 0usize;
    for (dst, &len) in out.chunks_exact_mut(bs).zip(lookup.lengths) {
        dst.fill(O::ZERO);
        let end = pos + len as usize;
        for j in pos..end {
            if R::PREFETCH {
                if let Some(ahead) = indices.get(j + PREFETCH_DISTANCE).and_then(|i| i.to_row()) {
                    if let Some(row) = input.get(ahead * bs..ahead * bs + bs) {
                        R::prefetch(row);
                    }
                }
            }
            let Some(row) = indices[j].to_row() else {
                unreachable!("negative index {} survived validation", indices[j].to_i64())
            };
            accumulate(dst, &input[row * bs..row * bs + bs], row, j);
        }
        if lookup.normalize_by_lengths && len > 0 {
            let n = O::from_len(len as usize);
            for v in dst.iter_mut() {
                *v = *v / n;
            }
        }
        pos = end;
    }
}

fn trace_dispatch<I, E: Element, O: Accum>(lookup: &Lookup<'_, I, E>, path: &str) {
    log::trace!(
        "embedding lookup {} -> {}: block={} bags={} indices={} weighted={} path={}",
        E::NAME,
        O::NAME,
        lookup.block_size,
        lookup.output_size,
        lookup.index_size,
        lookup.weights.is_some(),
        path
    );
}

macro_rules! portable_kernel {
    ($($elem:ty => $acc:ty),* $(,)?) => {$(
        impl Kernel<$acc> for $elem {
            fn reduce<I: LookupIndex>(lookup: &Lookup<'_, I, Self>, out: &mut [$acc]) {
                trace_dispatch::<I, $elem, $acc>(lookup, "portable");
                reduce_blocked::<I, $elem, $acc, Portable>(lookup, out)
            }
        }
    )*};
}

portable_kernel!(f16 => f32, f16 => f64, f32 => f64, u8 => f64);

macro_rules! simd_kernel {
    ($($elem:ty),* $(,)?) => {$(
        impl Kernel<f32> for $elem {
            fn reduce<I: LookupIndex>(lookup: &Lookup<'_, I, Self>, out: &mut [f32]) {
                #[cfg(all(target_arch = "x86_64", feature = "simd-avx2"))]
                {
                    if super::avx2::available() {
                        trace_dispatch::<I, $elem, f32>(lookup, "avx2");
                        // SAFETY: avx2 and fma were detected just above.
                        unsafe { super::avx2::reduce::<I, $elem>(lookup, out) };
                        return;
                    }
                }
                trace_dispatch::<I, $elem, f32>(lookup, "portable");
                reduce_blocked::<I, $elem, f32, Portable>(lookup, out)
            }
        }
    )*};
}

simd_kernel!(f32, u8);
