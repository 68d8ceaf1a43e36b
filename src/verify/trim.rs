/// Drop leading and trailing samples at or below `threshold × max|x|`.
///
/// Fully silent or empty input comes back unchanged.
pub fn trim_silence(samples: &[f32], threshold: f32) -> &[f32] {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak == 0.0 {
        return samples;
    }
    let floor = threshold * peak;
    let loud = |s: &f32| s.abs() > floor;
    match (
        samples.iter().position(loud),
        samples.iter().rposition(loud),
    ) {
        (Some(first), Some(last)) => &samples[first..=last],
        _ => samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quiet_edges_only() {
        let samples = [0.0, 0.001, 0.5, 0.0, -0.8, 0.002, 0.0];
        assert_eq!(trim_silence(&samples, 0.01), &[0.5, 0.0, -0.8]);
    }

    #[test]
    fn trimming_is_idempotent() {
        let samples = [0.0, 0.0, 0.3, -0.2, 0.9, 0.0];
        let once = trim_silence(&samples, 0.1);
        assert_eq!(trim_silence(once, 0.1), once);
    }

    #[test]
    fn silent_and_empty_input_is_left_alone() {
        let silent = [0.0f32; 16];
        assert_eq!(trim_silence(&silent, 0.01).len(), 16);
        assert!(trim_silence(&[], 0.01).is_empty());
    }

    #[test]
    fn zero_threshold_keeps_every_nonzero_sample() {
        let samples = [0.0, 1e-6, 0.4, 0.0];
        assert_eq!(trim_silence(&samples, 0.0), &[1e-6, 0.4]);
    }
}
