use super::element::{Accum, Element};
use super::index::LookupIndex;
use super::Lookup;
use crate::error::LookupError;

/// Scalar reference: a literal transcription of the reduction formula with
/// no specialization. Slow, but the ground truth the fast paths are tested
/// against.
pub fn embedding_lookup_reference<I, E, O>(lookup: &Lookup<'_, I, E>, out: &mut [O]) -> Result<(), LookupError>
where
    I: LookupIndex,
    E: Element,
    O: Accum,
{
    lookup.validate()?;
    let expected = lookup.output_len()?;
    if out.len() != expected {
        return Err(LookupError::BufferLength { buffer: "output", expected, actual: out.len() });
    }
    let bs = lookup.block_size;
    let mut pos = 0usize;
    for i in 0..lookup.output_size {
        let row_out = &mut out[i * bs..(i + 1) * bs];
        for v in row_out.iter_mut() { *v = O::ZERO; }
        let len = lookup.lengths[i] as usize;
        for _ in 0..len {
            let k = lookup.indices[pos].to_row().unwrap_or_default();
            let weight = lookup.weights.map_or(O::from_f32(1.0), |w| O::from_f32(w[pos]));
            for (c, v) in row_out.iter_mut().enumerate() {
                let raw = O::from_f32(lookup.input[k * bs + c].to_f32());
                let value = match lookup.scale_bias {
                    Some(sb) if E::QUANTIZED => O::from_f32(sb[2 * k]) * raw + O::from_f32(sb[2 * k + 1]),
                    _ => raw,
                };
                *v += value * weight;
            }
            pos += 1;
        }
        if lookup.normalize_by_lengths && len > 0 {
            for v in row_out.iter_mut() { *v = *v / O::from_len(len); }
        }
    }
    Ok(())
}
