//! MFCC-mean feature extractor

use super::mfcc::{self, MfccConfig};
use super::traits::FeatureExtractor;
use crate::audio;
use crate::error::{Result, StemsimError};
use crate::types::{AudioAsset, FeatureVector};
use tracing::debug;

/// Decodes an asset at its native rate and reduces its MFCC matrix to the
/// arithmetic mean of each coefficient across time
#[derive(Debug, Clone, Default)]
pub struct MfccExtractor {
    config: MfccConfig,
}

impl MfccExtractor {
    pub fn new(n_mfcc: usize) -> Self {
        Self {
            config: MfccConfig {
                n_mfcc,
                ..MfccConfig::default()
            },
        }
    }
}

impl FeatureExtractor for MfccExtractor {
    fn extract(&self, asset: &AudioAsset) -> Result<FeatureVector> {
        let buffer = audio::decode(asset.path())?;

        let matrix = mfcc::mfcc(&buffer.samples, buffer.sample_rate, &self.config);
        let mean = mfcc::mean_over_time(&matrix);
        if mean.len() != self.config.n_mfcc {
            return Err(StemsimError::unreadable(
                asset.path(),
                format!("Expected {} coefficients, got {}", self.config.n_mfcc, mean.len()),
            ));
        }

        debug!(
            "Extracted {} MFCC means from {} ({} frames @ {}Hz)",
            mean.len(),
            asset.path().display(),
            matrix.len(),
            buffer.sample_rate
        );

        // Stored at the numeric library's native width
        Ok(FeatureVector::new(mean.into_iter().map(|v| v as f32).collect()))
    }

    fn dim(&self) -> usize {
        self.config.n_mfcc
    }

    fn name(&self) -> &'static str {
        "mfcc-mean"
    }
}
