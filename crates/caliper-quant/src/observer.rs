//! Per-tensor statistics collection and calibration scale selection.
//!
//! A [`TensorObserver`] watches one tensor across calibration batches and
//! keeps three things: the running magnitude maximum, the per-batch maxima,
//! and a bounded sample of magnitudes. [`TensorObserver::scale`] then turns
//! those statistics into a symmetric int8 scale using the requested
//! [`CalibrationMethod`].

use std::str::FromStr;

use caliper_core::Tensor;
use caliper_engines::ops::quantize::INT8_LEVELS;

use crate::error::{QuantError, Result};

/// Bins used by the histogram-based threshold searches.
const HISTOGRAM_BINS: usize = 2048;

/// Candidate thresholds swept by the mean-squared-error search.
const MSE_SWEEP_STEPS: usize = 80;

/// Fraction of observed magnitude mass kept by the percentile method.
const HIST_PERCENTILE: f64 = 0.99999;

/// Sample buffer size at which the reservoir halves itself.
const SAMPLE_CAPACITY: usize = 1 << 17;

/// Scale-selection algorithm applied to observed statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationMethod {
    /// Largest magnitude seen anywhere.
    AbsMax,
    /// Mean of the per-batch magnitude maxima.
    Average,
    /// Threshold sweep minimizing quantize-dequantize mean squared error.
    Mse,
    /// Histogram threshold minimizing the KL divergence between the clipped
    /// distribution and its int8-level projection.
    Kl,
    /// High percentile of the observed magnitude distribution.
    Histogram,
}

impl CalibrationMethod {
    /// Every supported method.
    pub const ALL: [Self; 5] = [
        Self::AbsMax,
        Self::Average,
        Self::Mse,
        Self::Kl,
        Self::Histogram,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbsMax => "abs_max",
            Self::Average => "avg",
            Self::Mse => "mse",
            Self::Kl => "kl",
            Self::Histogram => "hist",
        }
    }
}

impl std::fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationMethod {
    type Err = QuantError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abs_max" => Ok(Self::AbsMax),
            "avg" | "average" => Ok(Self::Average),
            "mse" => Ok(Self::Mse),
            "kl" => Ok(Self::Kl),
            "hist" | "histogram" => Ok(Self::Histogram),
            other => Err(QuantError::UnknownMethod(other.to_string())),
        }
    }
}

/// Accumulates value statistics for one tensor across calibration batches.
///
/// Magnitudes are what matter for symmetric quantization, so only `|x|` is
/// stored. The sample buffer is decimated by stride doubling whenever it
/// fills, which bounds memory while keeping the samples spread across
/// everything recorded so far. The magnitude maximum is tracked outside the
/// buffer and is always exact.
#[derive(Debug, Clone)]
pub struct TensorObserver {
    abs_max: f32,
    batch_maxima: Vec<f32>,
    samples: Vec<f32>,
    stride: usize,
    offset: usize,
}

impl Default for TensorObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorObserver {
    /// Create an observer with no recorded data.
    pub fn new() -> Self {
        Self {
            abs_max: 0.0,
            batch_maxima: Vec::new(),
            samples: Vec::new(),
            stride: 1,
            offset: 0,
        }
    }

    /// Record one batch worth of values from a tensor.
    pub fn record(&mut self, tensor: &Tensor) -> Result<()> {
        let values = tensor.to_vec()?;
        self.record_values(&values);
        Ok(())
    }

    /// Record one batch worth of raw values.
    ///
    /// Non-finite values are ignored; an empty batch records nothing.
    pub fn record_values(&mut self, values: &[f32]) {
        if values.is_empty() {
            return;
        }
        let mut batch_max = 0.0f32;
        for &value in values {
            let magnitude = value.abs();
            if !magnitude.is_finite() {
                continue;
            }
            if magnitude > batch_max {
                batch_max = magnitude;
            }
            if self.offset == 0 {
                self.samples.push(magnitude);
                if self.samples.len() == SAMPLE_CAPACITY {
                    self.decimate();
                }
            }
            self.offset = (self.offset + 1) % self.stride;
        }
        if batch_max > self.abs_max {
            self.abs_max = batch_max;
        }
        self.batch_maxima.push(batch_max);
    }

    /// Drop every other sample and double the stride.
    fn decimate(&mut self) {
        let mut keep = false;
        self.samples.retain(|_| {
            keep = !keep;
            keep
        });
        self.stride *= 2;
    }

    /// Largest magnitude recorded so far.
    pub fn abs_max(&self) -> f32 {
        self.abs_max
    }

    /// Number of batches recorded so far.
    pub fn batches(&self) -> usize {
        self.batch_maxima.len()
    }

    /// Number of magnitudes currently held in the sample buffer.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Compute the symmetric int8 scale for `method`.
    ///
    /// Fails when nothing was recorded. A tensor that only ever held zeros
    /// gets unit scale: zero quantizes exactly at any scale, and the engines
    /// reject a scale of zero.
    pub fn scale(&self, method: CalibrationMethod) -> Result<f32> {
        if self.batch_maxima.is_empty() {
            return Err(QuantError::NoObservations.into());
        }
        if self.abs_max == 0.0 {
            return Ok(1.0);
        }
        let threshold = match method {
            CalibrationMethod::AbsMax => self.abs_max,
            CalibrationMethod::Average => {
                self.batch_maxima.iter().sum::<f32>() / self.batch_maxima.len() as f32
            }
            CalibrationMethod::Mse => self.mse_threshold(),
            CalibrationMethod::Kl => self.kl_threshold(),
            CalibrationMethod::Histogram => self.percentile_threshold(),
        };
        Ok(threshold / INT8_LEVELS)
    }

    /// Sweep thresholds downward from the maximum and keep the one whose
    /// quantize-dequantize round trip loses the least energy.
    fn mse_threshold(&self) -> f32 {
        let mut best = self.abs_max;
        let mut best_error = f64::INFINITY;
        for step in 0..MSE_SWEEP_STEPS {
            let threshold = self.abs_max * (1.0 - 0.01 * step as f32);
            if threshold <= 0.0 {
                break;
            }
            let scale = threshold / INT8_LEVELS;
            let error = self
                .samples
                .iter()
                .map(|&v| {
                    let level = (v / scale).round().min(INT8_LEVELS);
                    f64::from(v - level * scale).powi(2)
                })
                .sum::<f64>()
                / self.samples.len() as f64;
            if error < best_error {
                best_error = error;
                best = threshold;
            }
        }
        best
    }

    /// Histogram of sampled magnitudes over `[0, abs_max]`.
    ///
    /// Returns the per-bin counts and the bin width.
    fn magnitude_histogram(&self) -> (Vec<f64>, f32) {
        let width = self.abs_max / HISTOGRAM_BINS as f32;
        let mut counts = vec![0.0f64; HISTOGRAM_BINS];
        for &v in &self.samples {
            let bin = ((v / width) as usize).min(HISTOGRAM_BINS - 1);
            counts[bin] += 1.0;
        }
        (counts, width)
    }

    /// Search clip points over the upper half of the histogram, keeping the
    /// one whose int8-level projection diverges least from the clipped
    /// distribution. Candidates whose boundary bin is empty carry no new
    /// information and are skipped; when every candidate is skipped the
    /// search falls back to its starting point.
    fn kl_threshold(&self) -> f32 {
        let (hist, width) = self.magnitude_histogram();
        let total: f64 = hist.iter().sum();
        let start = (HISTOGRAM_BINS - 1) / 2;

        let mut best_bins = 0usize;
        let mut best_divergence = f64::INFINITY;
        for bins in start..HISTOGRAM_BINS {
            if hist[bins - 1] == 0.0 {
                continue;
            }
            let mut reference = hist[..bins].to_vec();
            let tail: f64 = hist[bins..].iter().sum();
            reference[bins - 1] += tail;

            let candidate = project_to_levels(&hist[..bins]);
            let divergence = kl_divergence(&reference, &candidate, total);
            if divergence < best_divergence {
                best_divergence = divergence;
                best_bins = bins;
            }
        }
        if best_bins == 0 {
            best_bins = start;
        }
        (best_bins as f32 + 0.5) * width
    }

    /// Smallest threshold covering at least [`HIST_PERCENTILE`] of the
    /// observed magnitude mass.
    fn percentile_threshold(&self) -> f32 {
        let (hist, width) = self.magnitude_histogram();
        let total: f64 = hist.iter().sum();
        let mut cumulative = 0.0;
        for (bin, &count) in hist.iter().enumerate() {
            cumulative += count;
            if cumulative / total >= HIST_PERCENTILE {
                return (bin as f32 + 0.5) * width;
            }
        }
        self.abs_max
    }
}

/// Project a histogram onto the int8 level count and expand it back.
///
/// Each group of bins is merged into one level, then the level's mass is
/// spread evenly over the group's originally nonzero bins. The last group
/// absorbs the remainder bins.
fn project_to_levels(hist: &[f64]) -> Vec<f64> {
    let bins = hist.len();
    let levels = INT8_LEVELS as usize;
    let group_width = bins / levels;

    let mut expanded = vec![0.0f64; bins];
    for level in 0..levels {
        let group_start = level * group_width;
        let group_end = if level == levels - 1 {
            bins
        } else {
            group_start + group_width
        };
        let mass: f64 = hist[group_start..group_end].iter().sum();
        let nonzero = hist[group_start..group_end]
            .iter()
            .filter(|&&c| c > 0.0)
            .count();
        if nonzero == 0 {
            continue;
        }
        let share = mass / nonzero as f64;
        for bin in group_start..group_end {
            if hist[bin] > 0.0 {
                expanded[bin] = share;
            }
        }
    }
    expanded
}

/// KL divergence between two unnormalized histograms over the same bins.
///
/// `total` is the reference mass. A candidate bin that is empty where the
/// reference is not makes the divergence infinite.
fn kl_divergence(reference: &[f64], candidate: &[f64], total: f64) -> f64 {
    let candidate_total: f64 = candidate.iter().sum();
    if candidate_total == 0.0 {
        return f64::INFINITY;
    }
    let mut divergence = 0.0;
    for (&p, &q) in reference.iter().zip(candidate) {
        if p == 0.0 {
            continue;
        }
        if q == 0.0 {
            return f64::INFINITY;
        }
        divergence += p * ((p / total) / (q / candidate_total)).ln();
    }
    divergence / total
}
