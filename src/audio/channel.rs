use crate::error::{HarnessError, Result};

/// Convert device samples to f32 and append them, keeping the interleaving.
pub(super) fn append_converted<T, F>(buf: &mut Vec<f32>, data: &[T], convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    buf.extend(data.iter().copied().map(convert));
}

/// Pull one channel (1-based) out of interleaved frames. A trailing partial
/// frame is ignored.
pub fn extract_channel(interleaved: &[f32], channels: u16, channel: u16) -> Result<Vec<f32>> {
    if channels == 0 {
        return Err(HarnessError::InvalidRequest(
            "capture reported zero channels".to_string(),
        ));
    }
    if channel == 0 || channel > channels {
        return Err(HarnessError::InvalidRequest(format!(
            "channel {channel} is outside 1..={channels}"
        )));
    }
    let stride = usize::from(channels);
    let index = usize::from(channel - 1);
    Ok(interleaved
        .chunks_exact(stride)
        .map(|frame| frame[index])
        .collect())
}

/// Number of complete frames in an interleaved buffer.
pub(super) fn frame_count(interleaved: &[f32], channels: u16) -> usize {
    interleaved.len() / usize::from(channels.max(1))
}
