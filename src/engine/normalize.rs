use serde::{Deserialize, Serialize};

const DEGENERATE_SPREAD: f64 = 1e-12;

/// How raw per-contributor values are mapped onto [0, 1] relative to the team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// `(v - min) / (max - min)`
    #[default]
    MinMax,
    /// Logistic curve centred on the team mean, scaled by the standard deviation.
    Sigmoid,
}

impl Normalization {
    /// Normalize `values` as a group. The output has the same order and length.
    ///
    /// When all values are equal there is no spread to normalize against:
    /// positive values map to 1 and the rest to 0.
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        if values.is_empty() {
            return Vec::new();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max - min < DEGENERATE_SPREAD {
            return values
                .iter()
                .map(|v| if *v > 0.0 { 1.0 } else { 0.0 })
                .collect();
        }

        match self {
            Self::MinMax => values.iter().map(|v| (v - min) / (max - min)).collect(),
            Self::Sigmoid => {
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
                values
                    .iter()
                    .map(|v| 1.0 / (1.0 + (-(v - mean) / std).exp()))
                    .collect()
            }
        }
    }
}
