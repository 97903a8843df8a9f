//! Band spectrum analysis for the spectrum listener.
//!
//! Samples are mixed to mono, windowed (Hann) and run through a forward
//! FFT. The positive half of the spectrum is split into equal-width bands;
//! each band reports its peak magnitude in dB, floored at `THRESHOLD_DB`.

use std::sync::Arc;
use std::time::Duration;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub const FFT_SIZE: usize = 1024;
pub const THRESHOLD_DB: f32 = -60.0;

pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Ring of the most recent mono samples; `head` is the oldest slot.
    ring: Vec<f32>,
    head: usize,
    filled: usize,
    scratch: Vec<Complex<f32>>,
    bands: usize,
    /// Mono frames between two published spectra.
    frames_per_update: usize,
    frames_since_update: usize,
}

impl SpectrumAnalyzer {
    pub fn new(bands: usize, sample_rate: u32, interval: Duration) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE);
        let window = (0..FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (FFT_SIZE - 1) as f32;
                0.5 - 0.5 * phase.cos()
            })
            .collect();
        let frames_per_update =
            ((sample_rate as f64 * interval.as_secs_f64()) as usize).max(FFT_SIZE);

        Self {
            fft,
            window,
            ring: vec![0.0; FFT_SIZE],
            head: 0,
            filled: 0,
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            bands: bands.clamp(1, FFT_SIZE / 2),
            frames_per_update,
            frames_since_update: 0,
        }
    }

    /// Feed interleaved samples. Returns a spectrum whenever an update is due
    /// and a full FFT window is available.
    pub fn push_interleaved(&mut self, samples: &[f32], channels: usize) -> Option<Vec<f32>> {
        let channels = channels.max(1);
        let mut out = None;

        for frame in samples.chunks(channels) {
            let mixed = frame.iter().sum::<f32>() / frame.len() as f32;
            self.ring[self.head] = mixed;
            self.head = (self.head + 1) % FFT_SIZE;
            self.filled = (self.filled + 1).min(FFT_SIZE);
            self.frames_since_update += 1;

            if self.frames_since_update >= self.frames_per_update && self.filled == FFT_SIZE {
                self.frames_since_update = 0;
                out = Some(self.compute());
            }
        }

        out
    }

    /// Band magnitudes for the last `FFT_SIZE` mono samples.
    pub fn compute(&mut self) -> Vec<f32> {
        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let s = self.ring[(self.head + i) % FFT_SIZE];
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let half = FFT_SIZE / 2;
        let per_band = half / self.bands;
        // Hann window halves the coherent gain.
        let norm = FFT_SIZE as f32 / 4.0;

        (0..self.bands)
            .map(|b| {
                let start = b * per_band;
                let end = if b + 1 == self.bands { half } else { start + per_band };
                let peak = self.scratch[start..end]
                    .iter()
                    .map(|c| c.norm() / norm)
                    .fold(0.0f32, f32::max);
                if peak <= 0.0 {
                    THRESHOLD_DB
                } else {
                    (20.0 * peak.log10()).max(THRESHOLD_DB)
                }
            })
            .collect()
    }
}
