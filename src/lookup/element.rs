use half::f16;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul};

/// Stored table element.
///
/// Quantized elements carry no value on their own: row `k` decodes as
/// `scale[k] * raw + bias[k]` with the pair taken from the table's scale/bias
/// buffer.
pub trait Element: Copy + Send + Sync + 'static {
    const QUANTIZED: bool;
    const NAME: &'static str;
    fn to_f32(self) -> f32;
}

impl Element for f32 {
    const QUANTIZED: bool = false;
    const NAME: &'static str = "f32";
    #[inline(always)]
    fn to_f32(self) -> f32 { self }
}

impl Element for f16 {
    const QUANTIZED: bool = false;
    const NAME: &'static str = "f16";
    #[inline(always)]
    fn to_f32(self) -> f32 { f16::to_f32(self) }
}

impl Element for u8 {
    const QUANTIZED: bool = true;
    const NAME: &'static str = "u8";
    #[inline(always)]
    fn to_f32(self) -> f32 { self as f32 }
}

/// Accumulation and output type.
pub trait Accum:
    Copy
    + Send
    + Sync
    + 'static
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
{
    const ZERO: Self;
    const NAME: &'static str;
    fn from_f32(v: f32) -> Self;
    fn from_len(n: usize) -> Self;
    fn to_f64(self) -> f64;
}

impl Accum for f32 {
    const ZERO: Self = 0.0;
    const NAME: &'static str = "f32";
    #[inline(always)]
    fn from_f32(v: f32) -> Self { v }
    #[inline(always)]
    fn from_len(n: usize) -> Self { n as f32 }
    #[inline(always)]
    fn to_f64(self) -> f64 { self as f64 }
}

impl Accum for f64 {
    const ZERO: Self = 0.0;
    const NAME: &'static str = "f64";
    #[inline(always)]
    fn from_f32(v: f32) -> Self { v as f64 }
    #[inline(always)]
    fn from_len(n: usize) -> Self { n as f64 }
    #[inline(always)]
    fn to_f64(self) -> f64 { self }
}
