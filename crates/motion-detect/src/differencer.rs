//! Sparse frame differencing
//!
//! Only every [`SAMPLE_STRIDE`]th pixel is inspected, which keeps the cost
//! per comparison fixed and small at the cost of granularity.

use camera_capture::VideoFrame;

/// Inspect one pixel out of every `SAMPLE_STRIDE`
pub const SAMPLE_STRIDE: usize = 10;

/// Combined |ΔR| + |ΔG| + |ΔB| above which a sampled pixel counts as
/// changed (out of 0..=765)
pub const PIXEL_CHANGE_THRESHOLD: u32 = 100;

/// Result of comparing two frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Percentage of sampled pixels that changed
    pub changed_percent: f64,
    /// Percentage that had to be exceeded
    pub threshold_percent: f64,
    /// Whether the frames differ meaningfully
    pub motion: bool,
}

/// Trigger threshold in percentage points for `sensitivity`
pub fn threshold_percent(sensitivity: u8) -> f64 {
    sensitivity as f64 / 10.0
}

/// Percentage of sampled pixels whose combined channel delta exceeds
/// [`PIXEL_CHANGE_THRESHOLD`]
///
/// # Panics
///
/// Panics if the frames differ in size.
pub fn changed_percent(previous: &VideoFrame, current: &VideoFrame) -> f64 {
    assert_eq!(
        (previous.width, previous.height),
        (current.width, current.height),
        "compared frames must have identical dimensions"
    );

    let mut sampled = 0u32;
    let mut changed = 0u32;

    let prev_pixels = previous.data.chunks_exact(3).step_by(SAMPLE_STRIDE);
    let curr_pixels = current.data.chunks_exact(3).step_by(SAMPLE_STRIDE);

    for (prev, curr) in prev_pixels.zip(curr_pixels) {
        let delta: u32 = prev
            .iter()
            .zip(curr)
            .map(|(a, b)| a.abs_diff(*b) as u32)
            .sum();

        sampled += 1;
        if delta > PIXEL_CHANGE_THRESHOLD {
            changed += 1;
        }
    }

    if sampled == 0 {
        return 0.0;
    }

    changed as f64 * 100.0 / sampled as f64
}

/// Compare two frames and report the full verdict
pub fn evaluate(previous: &VideoFrame, current: &VideoFrame, sensitivity: u8) -> Verdict {
    let changed_percent = changed_percent(previous, current);
    let threshold_percent = threshold_percent(sensitivity);

    Verdict {
        changed_percent,
        threshold_percent,
        motion: changed_percent > threshold_percent,
    }
}

/// Whether meaningful change occurred between `previous` and `current`
pub fn compare(previous: &VideoFrame, current: &VideoFrame, sensitivity: u8) -> bool {
    evaluate(previous, current, sensitivity).motion
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const W: u32 = 320;
    const H: u32 = 240;

    /// Copy of `base` with every `every`th sampled pixel brightened by `delta` per channel
    fn with_changes(base: &VideoFrame, every: usize, delta: u8) -> VideoFrame {
        let mut frame = base.clone();
        for (i, pixel) in frame.data.chunks_exact_mut(3).enumerate() {
            if i % SAMPLE_STRIDE == 0 && (i / SAMPLE_STRIDE) % every == 0 {
                for channel in pixel {
                    *channel = channel.saturating_add(delta);
                }
            }
        }
        frame
    }

    #[test]
    fn test_identical_frames_no_motion() {
        let a = VideoFrame::solid(W, H, [90, 90, 90]);
        let b = a.clone();
        assert_eq!(changed_percent(&a, &b), 0.0);
        assert!(!compare(&a, &b, 30));
    }

    #[test]
    fn test_five_percent_change_sensitive() {
        let a = VideoFrame::solid(W, H, [20, 20, 20]);
        // Every 20th sampled pixel changes by 150 combined: 5%
        let b = with_changes(&a, 20, 50);
        assert!((changed_percent(&a, &b) - 5.0).abs() < 1e-9);
        assert!(compare(&a, &b, 30));
    }

    #[test]
    fn test_five_percent_change_insensitive() {
        let a = VideoFrame::solid(W, H, [20, 20, 20]);
        let b = with_changes(&a, 20, 50);
        assert!(!compare(&a, &b, 80));
    }

    #[test]
    fn test_small_deltas_ignored() {
        let a = VideoFrame::solid(W, H, [20, 20, 20]);
        // 3 * 33 = 99, below the per-pixel threshold even though every sample changed
        let b = with_changes(&a, 1, 33);
        assert_eq!(changed_percent(&a, &b), 0.0);

        // 3 * 34 = 102 crosses it
        let c = with_changes(&a, 1, 34);
        assert_eq!(changed_percent(&a, &c), 100.0);
    }

    #[test]
    fn test_unsampled_pixels_ignored() {
        let a = VideoFrame::solid(W, H, [0, 0, 0]);
        let mut b = a.clone();
        // Pixel 1 sits between two samples
        b.data[3..6].copy_from_slice(&[255, 255, 255]);
        assert_eq!(changed_percent(&a, &b), 0.0);
    }

    #[test]
    fn test_evaluate_reports_threshold() {
        let a = VideoFrame::solid(W, H, [20, 20, 20]);
        let b = with_changes(&a, 20, 50);
        let verdict = evaluate(&a, &b, 30);
        assert!(verdict.motion);
        assert!((verdict.threshold_percent - 3.0).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "identical dimensions")]
    fn test_mismatched_dimensions_panic() {
        let a = VideoFrame::solid(W, H, [0, 0, 0]);
        let b = VideoFrame::solid(160, 120, [0, 0, 0]);
        compare(&a, &b, 30);
    }

    #[test]
    fn test_empty_frames() {
        let a = VideoFrame::solid(0, 0, [0, 0, 0]);
        assert!(!compare(&a, &a.clone(), 1));
    }

    /// 100 x 10 frame: exactly 100 sampled pixels, so `k` changed samples is `k` percent
    fn frame_with_changed_samples(k: usize) -> (VideoFrame, VideoFrame) {
        let a = VideoFrame::solid(100, 10, [10, 10, 10]);
        let mut b = a.clone();
        for sample in 0..k {
            let idx = sample * SAMPLE_STRIDE * 3;
            b.data[idx..idx + 3].copy_from_slice(&[200, 200, 200]);
        }
        (a, b)
    }

    proptest! {
        #[test]
        fn prop_compare_is_deterministic(
            seed in proptest::collection::vec(any::<u8>(), 100 * 10 * 3),
            other in proptest::collection::vec(any::<u8>(), 100 * 10 * 3),
            sensitivity in 1u8..=100,
        ) {
            let a = VideoFrame::new(seed, 100, 10, 0);
            let b = VideoFrame::new(other, 100, 10, 1);
            let first = compare(&a, &b, sensitivity);
            for _ in 0..3 {
                prop_assert_eq!(compare(&a, &b, sensitivity), first);
            }
        }

        #[test]
        fn prop_threshold_monotonicity(k in 0usize..=100) {
            let (a, b) = frame_with_changed_samples(k);
            let fraction = changed_percent(&a, &b);
            prop_assert!((fraction - k as f64).abs() < 1e-9);

            for sensitivity in 1u8..=100 {
                let expected = (sensitivity as f64 / 10.0) < fraction;
                prop_assert_eq!(compare(&a, &b, sensitivity), expected);
            }
        }
    }
}
