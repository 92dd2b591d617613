/// Contract violations detected by [`crate::lookup::Lookup::validate`].
///
/// Each one is fatal to the call: validation runs before any write, so the
/// output buffer is untouched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("block_size must be positive")]
    ZeroBlockSize,

    #[error("shape overflow: {rows} rows x {block_size} columns does not fit in usize")]
    ShapeOverflow { rows: usize, block_size: usize },

    #[error("{buffer} buffer has {actual} elements, expected {expected}")]
    BufferLength { buffer: &'static str, expected: usize, actual: usize },

    #[error("bag {bag} has negative length {length}")]
    NegativeLength { bag: usize, length: i32 },

    #[error("lengths sum to {actual}, expected index_size {expected}")]
    LengthSum { expected: usize, actual: u64 },

    #[error("index {index} at position {position} is outside [0, {data_size})")]
    IndexOutOfRange { position: usize, index: i64, data_size: usize },

    #[error("quantized table requires per-row scale/bias")]
    MissingScaleBias,

    #[error("scale/bias given for a non-quantized table")]
    UnexpectedScaleBias,
}
