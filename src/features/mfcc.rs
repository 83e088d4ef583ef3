//! MFCC computation
//!
//! Follows the common librosa defaults so vectors line up with what that
//! toolchain produces for the same file:
//!
//! - **Framing**: centered frames, zero padding of `n_fft / 2` on each side,
//!   `n_fft = 2048`, `hop = 512`, periodic Hann window
//! - **Mel filterbank**: 128 bands from 0 Hz to Nyquist on the Slaney mel
//!   scale, Slaney area normalization
//! - **Log**: `10 * log10(max(1e-10, S))`, floored at 80 dB below the peak
//! - **DCT**: orthonormal type II, first `n_mfcc` coefficients

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// FFT window size
pub const N_FFT: usize = 2048;

/// Hop length between frames
pub const HOP_LENGTH: usize = 512;

/// Number of mel bands fed to the DCT
pub const N_MELS: usize = 128;

/// Default number of cepstral coefficients kept
pub const DEFAULT_N_MFCC: usize = 13;

const AMIN: f64 = 1e-10;
const TOP_DB: f64 = 80.0;

/// MFCC parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfccConfig {
    pub n_mfcc: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            n_mfcc: DEFAULT_N_MFCC,
            n_fft: N_FFT,
            hop_length: HOP_LENGTH,
            n_mels: N_MELS,
        }
    }
}

/// Compute the MFCC matrix for mono samples: `[frame][coefficient]`
pub fn mfcc(samples: &[f32], sample_rate: u32, config: &MfccConfig) -> Vec<Vec<f64>> {
    if samples.is_empty() || sample_rate == 0 {
        return Vec::new();
    }

    let power = power_spectrogram(samples, config.n_fft, config.hop_length);
    let filterbank = mel_filterbank(sample_rate, config.n_fft, config.n_mels);

    let mut mel_db: Vec<Vec<f64>> = power
        .iter()
        .map(|frame| {
            filterbank
                .iter()
                .map(|band| {
                    let energy: f64 = band.iter().zip(frame.iter()).map(|(w, p)| w * p).sum();
                    10.0 * energy.max(AMIN).log10()
                })
                .collect()
        })
        .collect();

    // Dynamic range floor relative to the loudest cell of the whole matrix
    let peak = mel_db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = peak - TOP_DB;
    for value in mel_db.iter_mut().flatten() {
        *value = value.max(floor);
    }

    let basis = dct_basis(config.n_mfcc, config.n_mels);
    mel_db
        .iter()
        .map(|frame| {
            basis
                .iter()
                .map(|row| row.iter().zip(frame.iter()).map(|(b, x)| b * x).sum())
                .collect()
        })
        .collect()
}

/// Average each coefficient across frames
pub fn mean_over_time(matrix: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = matrix.first() else {
        return Vec::new();
    };
    let mut sums = vec![0.0; first.len()];
    for frame in matrix {
        for (sum, value) in sums.iter_mut().zip(frame.iter()) {
            *sum += value;
        }
    }
    let frames = matrix.len() as f64;
    sums.into_iter().map(|s| s / frames).collect()
}

/// Centered power spectrogram: `[frame][bin]` with `n_fft / 2 + 1` bins
fn power_spectrogram(samples: &[f32], n_fft: usize, hop_length: usize) -> Vec<Vec<f64>> {
    let pad = n_fft / 2;
    let mut padded = vec![0.0f64; samples.len() + 2 * pad];
    for (dst, &src) in padded[pad..].iter_mut().zip(samples.iter()) {
        *dst = src as f64;
    }

    let num_frames = 1 + (padded.len() - n_fft) / hop_length;
    let num_bins = n_fft / 2 + 1;
    let window = hann_window(n_fft);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

    let mut spectrogram = Vec::with_capacity(num_frames);
    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_length;
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * window[i], 0.0);
        }

        fft.process(&mut buffer);

        spectrogram.push(buffer[..num_bins].iter().map(|c| c.norm_sqr()).collect());
    }

    spectrogram
}

/// Periodic Hann window
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

// =============================================================================
// Mel scale (Slaney)
// =============================================================================

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filters with Slaney area normalization: `[band][bin]`
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let num_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;

    let fft_freqs: Vec<f64> = (0..num_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mel_max = hz_to_mel(nyquist);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (right - left);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (center - left);
                    let upper = (right - f) / (right - center);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis: `[coefficient][band]`
fn dct_basis(n_out: usize, n_in: usize) -> Vec<Vec<f64>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| scale * (PI * k as f64 * (i as f64 + 0.5) / n).cos())
                .collect()
        })
        .collect()
}
