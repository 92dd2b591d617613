/// Integer type of the index stream.
///
/// Indices are signed to match the producers upstream; a negative value is a
/// contract violation, never a wrap-around.
pub trait LookupIndex: Copy + Send + Sync + 'static {
    /// Row number as `usize`, or `None` if negative or unrepresentable.
    fn to_row(self) -> Option<usize>;
    /// Raw value, for error reports.
    fn to_i64(self) -> i64;
}

impl LookupIndex for i32 {
    #[inline(always)]
    fn to_row(self) -> Option<usize> { usize::try_from(self).ok() }
    #[inline(always)]
    fn to_i64(self) -> i64 { self as i64 }
}

impl LookupIndex for i64 {
    #[inline(always)]
    fn to_row(self) -> Option<usize> { usize::try_from(self).ok() }
    #[inline(always)]
    fn to_i64(self) -> i64 { self }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_indices_have_no_row() {
        assert_eq!((-1i32).to_row(), None);
        assert_eq!(i64::MIN.to_row(), None);
        assert_eq!(7i32.to_row(), Some(7));
        assert_eq!((1i64 << 40).to_i64(), 1i64 << 40);
    }
}
