const FLOOR_DB: f32 = -120.0;

/// RMS level in dBFS; silence and empty input clamp to the floor.
pub(crate) fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return FLOOR_DB;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = energy.sqrt();
    if rms <= 1e-6 {
        return FLOOR_DB;
    }
    20.0 * rms.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_db_handles_empty() {
        assert_eq!(rms_db(&[]), FLOOR_DB);
    }

    #[test]
    fn full_scale_square_is_zero_db() {
        let level = rms_db(&[1.0, -1.0, 1.0, -1.0]);
        assert!(level.abs() < 1e-4, "level {level}");
    }

    #[test]
    fn silence_hits_floor() {
        assert_eq!(rms_db(&[0.0; 64]), FLOOR_DB);
    }
}
