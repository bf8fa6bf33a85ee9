//! Amplitude peak extraction for the waveform bar display.
//!
//! Each bar is represented by a pair of normalized peaks, one per channel
//! side: `top` comes from channel 0 and `bottom` from channel 1, or from
//! channel 0 again for mono audio. The pair encoding keeps a stereo-style
//! above/below split available to the renderer; alignments that draw a
//! single bar collapse the pair with [`Peak::amplitude`].

use std::sync::Arc;

use crate::audio::types::AudioData;

/// Normalized amplitude peaks for one bar, each in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    pub top: f32,
    pub bottom: f32,
}

impl Peak {
    pub const ZERO: Peak = Peak { top: 0.0, bottom: 0.0 };

    /// Single-bar amplitude: the larger of the two sides.
    pub fn amplitude(&self) -> f32 {
        self.top.max(self.bottom)
    }
}

/// Computes `bar_count` peaks for `audio`.
///
/// The frames are partitioned into `bar_count` equal windows of
/// `floor(frames / bar_count)` frames; trailing remainder frames are
/// dropped. Each window contributes the maximum absolute sample per
/// channel side. Absent or empty audio yields `bar_count` zero peaks;
/// extraction never fails.
pub fn extract_peaks(audio: Option<&AudioData>, bar_count: usize) -> Vec<Peak> {
    let Some(audio) = audio else {
        return vec![Peak::ZERO; bar_count];
    };

    let frames = audio.num_frames();
    if bar_count == 0 || frames == 0 {
        return vec![Peak::ZERO; bar_count];
    }

    let window = frames / bar_count;
    let mut result = Vec::with_capacity(bar_count);

    for i in 0..bar_count {
        let mut peak = Peak::ZERO;
        for j in 0..window {
            let frame = i * window + j;
            peak.top = peak.top.max(audio.sample(0, frame).abs());
            peak.bottom = peak.bottom.max(audio.sample(1, frame).abs());
        }
        // samples outside [-1, 1] would otherwise overdraw the bar box
        peak.top = peak.top.min(1.0);
        peak.bottom = peak.bottom.min(1.0);
        result.push(peak);
    }

    result
}

/// Memoizes [`extract_peaks`] by (sample-data identity, bar count).
///
/// Peaks are a pure function of that pair and cheap to discard, so the
/// cache holds exactly one entry and recomputes from scratch whenever the
/// audio or the rendered bar count changes.
#[derive(Default)]
pub struct PeakCache {
    key: Option<(usize, usize)>,
    peaks: Vec<Peak>,
}

impl PeakCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, audio: Option<&Arc<AudioData>>, bar_count: usize) -> &[Peak] {
        let key = (
            audio.map(|a| Arc::as_ptr(a) as usize).unwrap_or(0),
            bar_count,
        );
        if self.key != Some(key) {
            self.peaks = extract_peaks(audio.map(Arc::as_ref), bar_count);
            self.key = Some(key);
        }
        &self.peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(samples: Vec<f32>) -> AudioData {
        let duration = samples.len() as f64 / 8000.0;
        AudioData { samples, sample_rate: 8000, channels: 1, duration }
    }

    fn stereo(samples: Vec<f32>) -> AudioData {
        let duration = samples.len() as f64 / 2.0 / 8000.0;
        AudioData { samples, sample_rate: 8000, channels: 2, duration }
    }

    #[test]
    fn absent_audio_yields_flat_placeholder() {
        let peaks = extract_peaks(None, 4);
        assert_eq!(peaks, vec![Peak::ZERO; 4]);
    }

    #[test]
    fn zero_bars_yields_nothing() {
        let audio = mono(vec![0.5; 100]);
        assert!(extract_peaks(Some(&audio), 0).is_empty());
        assert!(extract_peaks(None, 0).is_empty());
    }

    #[test]
    fn always_returns_requested_count_in_range() {
        let audio = mono((0..977).map(|i| ((i % 7) as f32 - 3.0) / 2.0).collect());
        for count in [1, 3, 10, 250] {
            let peaks = extract_peaks(Some(&audio), count);
            assert_eq!(peaks.len(), count);
            for peak in peaks {
                assert!((0.0..=1.0).contains(&peak.top));
                assert!((0.0..=1.0).contains(&peak.bottom));
            }
        }
    }

    #[test]
    fn windows_take_max_absolute_amplitude() {
        // 8 frames, 2 bars: windows [0..4) and [4..8)
        let audio = mono(vec![0.1, -0.6, 0.2, 0.0, -0.1, 0.3, -0.9, 0.4]);
        let peaks = extract_peaks(Some(&audio), 2);
        assert_eq!(peaks[0], Peak { top: 0.6, bottom: 0.6 });
        assert_eq!(peaks[1], Peak { top: 0.9, bottom: 0.9 });
    }

    #[test]
    fn trailing_remainder_is_dropped() {
        // 7 frames, 2 bars: window = 3, frame 6 (amplitude 1.0) is ignored
        let audio = mono(vec![0.2, 0.1, 0.0, 0.5, 0.1, 0.2, 1.0]);
        let peaks = extract_peaks(Some(&audio), 2);
        assert_eq!(peaks[0], Peak { top: 0.2, bottom: 0.2 });
        assert_eq!(peaks[1], Peak { top: 0.5, bottom: 0.5 });
    }

    #[test]
    fn stereo_channels_split_top_and_bottom() {
        // frames: (0.8, 0.1), (0.2, -0.9)
        let audio = stereo(vec![0.8, 0.1, 0.2, -0.9]);
        let peaks = extract_peaks(Some(&audio), 1);
        assert_eq!(peaks, vec![Peak { top: 0.8, bottom: 0.9 }]);
        assert_eq!(peaks[0].amplitude(), 0.9);
    }

    #[test]
    fn more_bars_than_frames_degrades_to_zeros() {
        let audio = mono(vec![0.5, 0.7]);
        let peaks = extract_peaks(Some(&audio), 8);
        assert_eq!(peaks.len(), 8);
        // window size is 0, so every window is empty
        assert!(peaks.iter().all(|p| *p == Peak::ZERO));
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let audio = mono(vec![2.5, -3.0]);
        let peaks = extract_peaks(Some(&audio), 1);
        assert_eq!(peaks, vec![Peak { top: 1.0, bottom: 1.0 }]);
    }

    #[test]
    fn cache_recomputes_only_when_key_changes() {
        let audio = Arc::new(mono(vec![0.4; 64]));
        let mut cache = PeakCache::new();

        let first = cache.get(Some(&audio), 8).to_vec();
        assert_eq!(first.len(), 8);
        let again = cache.get(Some(&audio), 8).as_ptr();
        assert_eq!(cache.get(Some(&audio), 8).as_ptr(), again);

        // different bar count: fresh series
        assert_eq!(cache.get(Some(&audio), 4).len(), 4);
        // different audio identity: fresh series
        let other = Arc::new(mono(vec![0.9; 64]));
        let peaks = cache.get(Some(&other), 4);
        assert!((peaks[0].top - 0.9).abs() < 1e-6);
    }
}
