//! Audio mixer for combining the mic and system streams into one waveform.
//!
//! Pure function (no state, no side effects).

/// Mixes the microphone stream with an optional system-audio stream.
pub struct AudioMixer;

impl AudioMixer {
    /// Average the two streams sample-by-sample into a single mono output.
    ///
    /// The shorter stream is zero-padded to the longer one's length. Samples
    /// are widened to i32 before averaging so the sum cannot overflow, then
    /// the result is clamped back into the i16 range. When the system
    /// stream is absent or empty, the mic stream passes through unchanged.
    pub fn mix(mic: &[i16], system: Option<&[i16]>) -> Vec<i16> {
        let system = match system {
            Some(s) if !s.is_empty() => s,
            _ => return mic.to_vec(),
        };

        let max_len = mic.len().max(system.len());
        let mut mixed = Vec::with_capacity(max_len);

        for i in 0..max_len {
            let m = mic.get(i).copied().unwrap_or(0) as i32;
            let s = system.get(i).copied().unwrap_or(0) as i32;
            let avg = (m + s) / 2;
            mixed.push(avg.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        }

        mixed
    }

    /// Peak absolute amplitude of a stream, for diagnostics.
    pub fn peak(samples: &[i16]) -> i32 {
        samples
            .iter()
            .map(|&s| (s as i32).abs())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_absent_system_is_identity() {
        let mic = vec![100, -200, 300];
        assert_eq!(AudioMixer::mix(&mic, None), mic);
        assert_eq!(AudioMixer::mix(&mic, Some(&[])), mic);
    }

    #[test]
    fn test_mix_is_commutative() {
        let a = vec![1000, -2000, 3000, 32767];
        let b = vec![-500, 1500, -3000, 32767];
        assert_eq!(AudioMixer::mix(&a, Some(&b)), AudioMixer::mix(&b, Some(&a)));
    }

    #[test]
    fn test_mix_averages() {
        let a = vec![100, 200];
        let b = vec![300, -200];
        assert_eq!(AudioMixer::mix(&a, Some(&b)), vec![200, 0]);
    }

    #[test]
    fn test_mix_pads_shorter_with_zeros() {
        let a = vec![1000, 1000];
        let b = vec![1000, 1000, 1000, 1000];
        let mixed = AudioMixer::mix(&a, Some(&b));
        assert_eq!(mixed.len(), 4);
        assert_eq!(mixed[0], 1000);
        // Padded region: (0 + 1000) / 2
        assert_eq!(mixed[2], 500);
        assert_eq!(mixed[3], 500);
    }

    #[test]
    fn test_mix_saturated_inputs_do_not_wrap() {
        let a = vec![i16::MAX; 8];
        let b = vec![i16::MAX; 8];
        let mixed = AudioMixer::mix(&a, Some(&b));
        assert!(mixed.iter().all(|&s| s == i16::MAX));

        let a = vec![i16::MIN; 8];
        let b = vec![i16::MIN; 8];
        let mixed = AudioMixer::mix(&a, Some(&b));
        assert!(mixed.iter().all(|&s| s == i16::MIN));
    }

    #[test]
    fn test_mix_empty_mic_halves_system() {
        // An empty mic stream is still zero-padded and averaged, so the
        // system stream comes out at half amplitude.
        let b = vec![1000, -2000];
        assert_eq!(AudioMixer::mix(&[], Some(&b)), vec![500, -1000]);
    }

    #[test]
    fn test_peak() {
        assert_eq!(AudioMixer::peak(&[]), 0);
        assert_eq!(AudioMixer::peak(&[100, -3000, 200]), 3000);
        assert_eq!(AudioMixer::peak(&[i16::MIN]), 32768);
    }
}
