use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::info;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const MIN_HOURS: f64 = 0.0;
pub const MAX_HOURS: f64 = 24.0;
pub const MIN_CGPA: f64 = 0.0;
pub const MAX_CGPA: f64 = 10.0;

/// Pre-trained single-feature linear regression: `cgpa = slope * hours + intercept`.
///
/// The parameters are read once from the model artifact and never change
/// afterwards; the server shares one instance across all handlers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    slope: f64,
    intercept: f64,
}

impl LinearModel {
    pub fn new(slope: f64, intercept: f64) -> Result<Self> {
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(AppError::Model(format!(
                "parameters must be finite (slope={slope}, intercept={intercept})"
            )));
        }
        Ok(Self { slope, intercept })
    }

    /// Loads the bincode-encoded artifact at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            AppError::Model(format!("cannot open model artifact {}: {e}", path.display()))
        })?;
        let raw: LinearModel = bincode::deserialize_from(BufReader::new(file))?;
        let model = LinearModel::new(raw.slope, raw.intercept)?;
        info!(
            "Loaded linear model from {} (slope={:.4}, intercept={:.4})",
            path.display(),
            model.slope,
            model.intercept
        );
        Ok(model)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Raw model output, unbounded.
    pub fn predict(&self, hours: f64) -> f64 {
        self.slope * hours + self.intercept
    }

    pub fn predict_many(&self, hours: &Array1<f64>) -> Array1<f64> {
        hours.mapv(|h| self.predict(h))
    }

    /// Bounded prediction for one student.
    ///
    /// Hours outside `[0, 24]` are clamped first (NaN is treated as zero),
    /// then the model output is clamped to `[0, 10]` and banded.
    pub fn predict_cgpa(&self, hours: f64) -> Prediction {
        let hours = clamp_hours(hours);
        let cgpa = self.predict(hours).clamp(MIN_CGPA, MAX_CGPA);
        Prediction {
            hours,
            cgpa,
            band: Band::from_score(cgpa),
        }
    }
}

pub fn clamp_hours(hours: f64) -> f64 {
    if hours.is_nan() {
        MIN_HOURS
    } else {
        hours.clamp(MIN_HOURS, MAX_HOURS)
    }
}

/// Qualitative feedback category for a clamped CGPA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    Excellent,
    VeryGood,
    CanImprove,
    StudyMore,
}

/// How loudly a band's message is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Info,
    Warning,
    Error,
}

impl Band {
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Band::Excellent
        } else if score >= 7.0 {
            Band::VeryGood
        } else if score >= 5.0 {
            Band::CanImprove
        } else {
            Band::StudyMore
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Band::Excellent => "🏆 Excellent!",
            Band::VeryGood => "👍 Very Good",
            Band::CanImprove => "🙂 Can improve",
            Band::StudyMore => "⚠️ Study more!",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Band::Excellent | Band::VeryGood => Tone::Info,
            Band::CanImprove => Tone::Warning,
            Band::StudyMore => Tone::Error,
        }
    }

    pub fn celebrate(&self) -> bool {
        matches!(self, Band::Excellent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub hours: f64,
    pub cgpa: f64,
    pub band: Band,
}

impl Prediction {
    /// Progress bar fill, 0..=100.
    pub fn progress(&self) -> u8 {
        ((self.cgpa * 10.0) as i64).clamp(0, 100) as u8
    }

    pub fn headline(&self) -> String {
        format!("🎯 Predicted CGPA: {:.2}", self.cgpa)
    }
}
