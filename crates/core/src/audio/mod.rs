use std::{
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, TryLockError},
    thread,
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{config::AudioConfig, MatrixClockError, Result};

/// Number of frequency bands published per worker cycle.
pub const SPECTRUM_BANDS: usize = 32;

/// How often the producer retries the slot lock before dropping a write
/// cycle. Bounds the worst-case stall; correctness never depends on a
/// particular write landing.
const PUBLISH_ATTEMPTS: usize = 8;

/// Blocking audio input the spectrum worker drains.
///
/// `read_block` fills `buf` with samples in [-1, 1] and returns how many
/// were actually written; a short read abandons the current analysis
/// cycle.
pub trait AudioSource: Send {
    fn read_block(&mut self, buf: &mut [f32]) -> Result<usize>;
}

/// Turns raw sample blocks into banded 8-bit magnitudes.
///
/// Pipeline: Hann window, forward real FFT, magnitude, logarithmic
/// banding over the usable half-spectrum (DC excluded), noise-floor
/// subtraction, scale to u8 with clamping. Bin boundaries grow
/// geometrically with the band index so low frequencies get fine
/// resolution while high frequencies are pooled.
pub struct SpectrumAnalyzer {
    block_size: usize,
    amplitude: f32,
    noise_floor: f32,
    window: Vec<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    band_edges: [usize; SPECTRUM_BANDS + 1],
}

impl SpectrumAnalyzer {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        if config.block_size < SPECTRUM_BANDS * 2 {
            return Err(MatrixClockError::InvalidInput(
                "audio block too small for the band count",
            ));
        }
        if config.amplitude <= 0.0 {
            return Err(MatrixClockError::InvalidInput(
                "amplitude reference must be positive",
            ));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(config.block_size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        Ok(Self {
            block_size: config.block_size,
            amplitude: config.amplitude,
            noise_floor: config.noise_floor,
            window: hann_window(config.block_size),
            plan,
            input,
            spectrum,
            scratch,
            band_edges: log_band_edges(config.block_size / 2),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Analyses one full block into a band array.
    pub fn analyze(&mut self, samples: &[f32]) -> Result<[u8; SPECTRUM_BANDS]> {
        if samples.len() != self.block_size {
            return Err(MatrixClockError::InvalidInput(
                "analysis requires exactly one full block",
            ));
        }

        for (slot, (sample, window)) in self
            .input
            .iter_mut()
            .zip(samples.iter().zip(self.window.iter()))
        {
            *slot = sample * window;
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let mut bands = [0u8; SPECTRUM_BANDS];
        for (band, slot) in bands.iter_mut().enumerate() {
            let lo = self.band_edges[band];
            let hi = self.band_edges[band + 1];
            let energy: f32 = self.spectrum[lo..hi].iter().map(|bin| bin.norm()).sum();
            let level = (energy - self.noise_floor).max(0.0) / self.amplitude * 255.0;
            *slot = level.min(255.0) as u8;
        }
        Ok(bands)
    }
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("block_size", &self.block_size)
            .field("amplitude", &self.amplitude)
            .field("noise_floor", &self.noise_floor)
            .finish()
    }
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            if len <= 1 {
                1.0
            } else {
                0.5 - 0.5 * ((2.0 * PI * i as f32) / (len as f32 - 1.0)).cos()
            }
        })
        .collect()
}

/// Geometric band boundaries over bins `1..=usable` (bin 0 is DC).
fn log_band_edges(usable: usize) -> [usize; SPECTRUM_BANDS + 1] {
    let mut edges = [0usize; SPECTRUM_BANDS + 1];
    edges[0] = 1;
    for (i, edge) in edges.iter_mut().enumerate().skip(1) {
        let raw = (usable as f32).powf(i as f32 / SPECTRUM_BANDS as f32).round() as usize;
        *edge = raw.min(usable + 1);
    }
    // Every band keeps at least one bin even where the geometric curve
    // is flatter than one bin per band.
    for i in 1..edges.len() {
        if edges[i] <= edges[i - 1] {
            edges[i] = edges[i - 1] + 1;
        }
    }
    edges
}

/// Result of a non-blocking read of the published band array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumRead {
    /// The slot was free; a consistent copy of the bands.
    Fresh([u8; SPECTRUM_BANDS]),
    /// The producer holds the slot; the caller should keep its previous
    /// values so the display holds the last frame instead of glitching.
    Stale,
}

/// Single-slot hand-off between the worker thread and the renderer.
///
/// The producer uses a short bounded retry (dropping the cycle under
/// sustained contention); the consumer never waits. Because the whole
/// array is copied under the lock, a reader sees either the fully
/// previous or the fully current bands, never a torn mix.
#[derive(Debug, Clone, Default)]
pub struct SpectrumSlot {
    inner: Arc<Mutex<[u8; SPECTRUM_BANDS]>>,
}

impl SpectrumSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer side. Returns false when the write cycle was dropped.
    pub fn publish(&self, bands: &[u8; SPECTRUM_BANDS]) -> bool {
        for _ in 0..PUBLISH_ATTEMPTS {
            match self.inner.try_lock() {
                Ok(mut slot) => {
                    *slot = *bands;
                    return true;
                }
                Err(TryLockError::Poisoned(poisoned)) => {
                    *poisoned.into_inner() = *bands;
                    return true;
                }
                Err(TryLockError::WouldBlock) => thread::yield_now(),
            }
        }
        false
    }

    /// Consumer side, called from the render thread. Never blocks.
    pub fn try_read(&self) -> SpectrumRead {
        match self.inner.try_lock() {
            Ok(slot) => SpectrumRead::Fresh(*slot),
            Err(TryLockError::Poisoned(poisoned)) => SpectrumRead::Fresh(*poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => SpectrumRead::Stale,
        }
    }
}

/// Starts the background spectrum worker and returns the slot the
/// renderer polls. The worker runs for the lifetime of the process;
/// there is no shutdown protocol. Source errors and short reads abandon
/// the cycle without surfacing to the renderer.
pub fn spawn_spectrum_worker(
    mut source: impl AudioSource + 'static,
    config: &AudioConfig,
) -> Result<SpectrumSlot> {
    let mut analyzer = SpectrumAnalyzer::new(config)?;
    let slot = SpectrumSlot::new();
    let published = slot.clone();
    let block_size = config.block_size;

    thread::Builder::new()
        .name("spectrum-worker".into())
        .spawn(move || {
            let mut block = vec![0.0f32; block_size];
            loop {
                match source.read_block(&mut block) {
                    Ok(n) if n == block_size => match analyzer.analyze(&block) {
                        Ok(bands) => {
                            if !slot.publish(&bands) {
                                tracing::trace!("spectrum slot contended, dropped a cycle");
                            }
                        }
                        Err(error) => tracing::debug!(%error, "spectrum analysis failed"),
                    },
                    Ok(n) => tracing::trace!(read = n, "short audio read, skipping cycle"),
                    Err(error) => tracing::debug!(%error, "audio read failed"),
                }
                thread::yield_now();
            }
        })?;

    Ok(published)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::MutexGuard;

    /// Holds the slot lock so tests can simulate a producer mid-write.
    pub(crate) fn lock(slot: &SpectrumSlot) -> MutexGuard<'_, [u8; SPECTRUM_BANDS]> {
        slot.inner.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn analyzer(amplitude: f32, noise_floor: f32) -> SpectrumAnalyzer {
        SpectrumAnalyzer::new(&AudioConfig {
            sample_rate: 40_000,
            block_size: 1024,
            amplitude,
            noise_floor,
        })
        .unwrap()
    }

    fn sine(freq_hz: f32, sample_rate: f32, len: usize, gain: f32) -> Vec<f32> {
        (0..len)
            .map(|i| gain * (2.0 * PI * freq_hz * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn band_edges_are_strictly_increasing() {
        let edges = log_band_edges(512);
        assert_eq!(edges[0], 1);
        for pair in edges.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        // Log binning: the top band pools far more bins than the bottom.
        let first = edges[1] - edges[0];
        let last = edges[SPECTRUM_BANDS] - edges[SPECTRUM_BANDS - 1];
        assert!(last > first * 4);
    }

    #[test]
    fn silence_stays_below_the_noise_floor() {
        let mut analyzer = analyzer(1_000.0, 500.0);
        let bands = analyzer.analyze(&vec![0.0; 1024]).unwrap();
        assert_eq!(bands, [0u8; SPECTRUM_BANDS]);
    }

    #[test]
    fn a_loud_tone_lands_in_one_region() {
        let mut analyzer = analyzer(50.0, 0.1);
        let samples = sine(5_000.0, 40_000.0, 1024, 1.0);
        let bands = analyzer.analyze(&samples).unwrap();

        let peak = bands
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i)
            .unwrap();
        assert!(bands[peak] > 0, "tone should register");
        // 5 kHz sits in the upper half of the log scale; nowhere near
        // the lowest bands.
        assert!(peak > SPECTRUM_BANDS / 2, "peak band was {peak}");
        assert_eq!(bands[0], 0);
    }

    #[test]
    fn overflow_clamps_to_full_scale() {
        let mut analyzer = analyzer(0.001, 0.0);
        let samples = sine(5_000.0, 40_000.0, 1024, 1.0);
        let bands = analyzer.analyze(&samples).unwrap();
        assert!(bands.contains(&255));
    }

    #[test]
    fn partial_blocks_are_rejected() {
        let mut analyzer = analyzer(1_000.0, 500.0);
        assert!(analyzer.analyze(&[0.0; 100]).is_err());
    }

    #[test]
    fn slot_round_trips_under_no_contention() {
        let slot = SpectrumSlot::new();
        let mut bands = [0u8; SPECTRUM_BANDS];
        bands[3] = 99;
        assert!(slot.publish(&bands));
        assert_eq!(slot.try_read(), SpectrumRead::Fresh(bands));
    }

    #[test]
    fn contended_slot_reports_stale_and_drops_writes() {
        let slot = SpectrumSlot::new();
        let initial = [7u8; SPECTRUM_BANDS];
        assert!(slot.publish(&initial));

        let guard = slot.inner.try_lock().unwrap();
        // Consumer: non-blocking attempt fails, caller keeps its copy.
        assert_eq!(slot.try_read(), SpectrumRead::Stale);
        // Producer: bounded retries, then the cycle is dropped.
        assert!(!slot.publish(&[1u8; SPECTRUM_BANDS]));
        drop(guard);

        // The slot still holds the fully-previous array, never a mix.
        assert_eq!(slot.try_read(), SpectrumRead::Fresh(initial));
    }

    struct ToneSource {
        freq_hz: f32,
        sample_rate: f32,
        phase: usize,
    }

    impl AudioSource for ToneSource {
        fn read_block(&mut self, buf: &mut [f32]) -> Result<usize> {
            for slot in buf.iter_mut() {
                *slot =
                    (2.0 * PI * self.freq_hz * self.phase as f32 / self.sample_rate).sin();
                self.phase += 1;
            }
            Ok(buf.len())
        }
    }

    #[test]
    fn worker_publishes_bands_from_a_live_source() {
        let config = AudioConfig {
            sample_rate: 40_000,
            block_size: 1024,
            amplitude: 50.0,
            noise_floor: 0.1,
        };
        let source = ToneSource {
            freq_hz: 5_000.0,
            sample_rate: 40_000.0,
            phase: 0,
        };
        let slot = spawn_spectrum_worker(source, &config).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let SpectrumRead::Fresh(bands) = slot.try_read() {
                if bands.iter().any(|b| *b > 0) {
                    return;
                }
            }
            assert!(
                std::time::Instant::now() < deadline,
                "worker never published a non-silent frame"
            );
            thread::sleep(Duration::from_millis(10));
        }
    }
}
