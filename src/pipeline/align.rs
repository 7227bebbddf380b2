//! Leading-edge alignment of audio blocks against the recording start.

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Decide how much of an audio block precedes the recording start.
///
/// `None` means the whole block ends at or before `start_ts` and must be
/// dropped. Otherwise the result is `(cutoff, admitted)` sample-frame
/// counts: skip the first `cutoff` frames of every plane and admit the
/// remaining `admitted`. The cutoff is computed from the nominal sample
/// rate and never exceeds `frames`.
pub(crate) fn clip_to_start(
    block_ts: u64,
    frames: u32,
    sample_rate: u32,
    start_ts: u64,
) -> Option<(u32, u32)> {
    debug_assert!(sample_rate > 0);

    if block_ts >= start_ts {
        return Some((0, frames));
    }

    let duration = frames as u64 * NANOS_PER_SEC / sample_rate as u64;
    let end_ts = block_ts + duration;
    if end_ts <= start_ts {
        return None;
    }

    let cutoff = ((start_ts - block_ts) * sample_rate as u64 / NANOS_PER_SEC) as u32;
    debug_assert!(cutoff < frames);
    Some((cutoff, frames - cutoff))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_at_or_after_start_passes_through() {
        assert_eq!(
            clip_to_start(1_000_000_000, 480, 48_000, 1_000_000_000),
            Some((0, 480))
        );
        assert_eq!(
            clip_to_start(1_500_000_000, 480, 48_000, 1_000_000_000),
            Some((0, 480))
        );
    }

    #[test]
    fn straddling_block_is_trimmed() {
        // 200 ms at 48 kHz starting 100 ms before the recording start:
        // half the block is cut, half admitted.
        assert_eq!(
            clip_to_start(900_000_000, 9_600, 48_000, 1_000_000_000),
            Some((4_800, 4_800))
        );
    }

    #[test]
    fn block_ending_before_start_is_rejected() {
        // Same capture time but only ~83 ms of samples; ends before start.
        assert_eq!(clip_to_start(900_000_000, 4_000, 48_000, 1_000_000_000), None);
    }

    #[test]
    fn block_ending_exactly_at_start_is_rejected() {
        // 100 ms of samples ending exactly on the start timestamp.
        assert_eq!(clip_to_start(900_000_000, 4_800, 48_000, 1_000_000_000), None);
    }

    #[test]
    fn one_nanosecond_overlap_is_admitted() {
        let got = clip_to_start(900_000_000, 4_800, 48_000, 999_999_999);
        let (cutoff, admitted) = got.expect("block overlaps the start");
        assert_eq!(cutoff + admitted, 4_800);
        assert!(admitted >= 1);
    }

    #[test]
    fn cutoff_uses_floor_division() {
        // 1 ms gap at 48 kHz is exactly 48 frames; 1 ms + 10 µs still 48.
        assert_eq!(
            clip_to_start(999_000_000, 480, 48_000, 1_000_000_000),
            Some((48, 432))
        );
        assert_eq!(
            clip_to_start(998_990_000, 480, 48_000, 1_000_000_000),
            Some((48, 432))
        );
    }
}
