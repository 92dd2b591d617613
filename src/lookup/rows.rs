use super::element::{Accum, Element};

/// Row-at-a-time accumulation primitives. `dst` and `src` have equal length
/// (one table row); elements are visited in order.
pub(crate) trait Rows<E: Element, O: Accum> {
    /// Whether [`Rows::prefetch`] does anything; lets the driver skip the
    /// look-ahead address computation entirely.
    const PREFETCH: bool = false;

    /// `dst += src`
    fn add(dst: &mut [O], src: &[E]);

    /// `dst += a * src`
    fn scale_add(dst: &mut [O], src: &[E], a: O);

    /// `dst += a * src + b`
    fn affine_add(dst: &mut [O], src: &[E], a: O, b: O);

    #[inline(always)]
    fn prefetch(_row: &[E]) {}
}

/// Plain Rust loops; with a constant row length LLVM unrolls and vectorizes
/// these for the target's baseline instruction set.
pub(crate) struct Portable;

impl<E: Element, O: Accum> Rows<E, O> for Portable {
    #[inline(always)]
    fn add(dst: &mut [O], src: &[E]) {
        for (d, &s) in dst.iter_mut().zip(src) {
            *d += O::from_f32(s.to_f32());
        }
    }

    #[inline(always)]
    fn scale_add(dst: &mut [O], src: &[E], a: O) {
        for (d, &s) in dst.iter_mut().zip(src) {
            *d += a * O::from_f32(s.to_f32());
        }
    }

    #[inline(always)]
    fn affine_add(dst: &mut [O], src: &[E], a: O, b: O) {
        for (d, &s) in dst.iter_mut().zip(src) {
            *d += a * O::from_f32(s.to_f32()) + b;
        }
    }
}
