//! Slope → trend category.
//!
//! Two independent policies, both in depth units per calendar year:
//!
//! - coarse (3 bands): status label for a single well, and the local
//!   category used by aggregation when no consensus label exists;
//! - fine (5 bands): narrative interpretation only.
//!
//! They disagree at the margins (0.08 is `Declining` under the coarse
//! policy but `SlightDecline` under the fine one) and must not be merged.

use serde::Deserialize;

use crate::error::AnalysisError;
use crate::model::{ConsensusTrend, FineBand, TrendCategory};

pub const COARSE_DECLINING_ABOVE: f64 = 0.05;
pub const COARSE_RECOVERING_BELOW: f64 = -0.05;

pub const FINE_CRITICAL_ABOVE: f64 = 0.5;
pub const FINE_MODERATE_ABOVE: f64 = 0.1;
pub const FINE_SLIGHT_ABOVE: f64 = 0.0;
pub const FINE_RECOVERY_BELOW: f64 = -0.1;

// ---------------------------------------------------------------------------
// Coarse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoarseThresholds {
    #[serde(default = "default_declining_above")]
    pub declining_above: f64,
    #[serde(default = "default_recovering_below")]
    pub recovering_below: f64,
}

fn default_declining_above() -> f64 {
    COARSE_DECLINING_ABOVE
}

fn default_recovering_below() -> f64 {
    COARSE_RECOVERING_BELOW
}

impl Default for CoarseThresholds {
    fn default() -> Self {
        Self {
            declining_above: COARSE_DECLINING_ABOVE,
            recovering_below: COARSE_RECOVERING_BELOW,
        }
    }
}

impl CoarseThresholds {
    pub fn classify(&self, slope: f64) -> TrendCategory {
        if slope > self.declining_above {
            TrendCategory::Declining
        } else if slope < self.recovering_below {
            TrendCategory::Recovering
        } else {
            TrendCategory::Stable
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.declining_above.is_finite() && self.recovering_below.is_finite()) {
            return Err(AnalysisError::ConfigValidation(
                "coarse thresholds must be finite".into(),
            ));
        }
        if self.recovering_below > self.declining_above {
            return Err(AnalysisError::ConfigValidation(format!(
                "coarse thresholds inverted: recovering_below ({}) > declining_above ({})",
                self.recovering_below, self.declining_above
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fine
// ---------------------------------------------------------------------------

/// Band edges, descending: `critical_above > moderate_above > slight_above >= recovery_below`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FineBands {
    #[serde(default = "default_critical_above")]
    pub critical_above: f64,
    #[serde(default = "default_moderate_above")]
    pub moderate_above: f64,
    #[serde(default = "default_slight_above")]
    pub slight_above: f64,
    #[serde(default = "default_recovery_below")]
    pub recovery_below: f64,
}

fn default_critical_above() -> f64 {
    FINE_CRITICAL_ABOVE
}

fn default_moderate_above() -> f64 {
    FINE_MODERATE_ABOVE
}

fn default_slight_above() -> f64 {
    FINE_SLIGHT_ABOVE
}

fn default_recovery_below() -> f64 {
    FINE_RECOVERY_BELOW
}

impl Default for FineBands {
    fn default() -> Self {
        Self {
            critical_above: FINE_CRITICAL_ABOVE,
            moderate_above: FINE_MODERATE_ABOVE,
            slight_above: FINE_SLIGHT_ABOVE,
            recovery_below: FINE_RECOVERY_BELOW,
        }
    }
}

impl FineBands {
    pub fn classify(&self, slope: f64) -> FineBand {
        if slope > self.critical_above {
            FineBand::CriticalDecline
        } else if slope > self.moderate_above {
            FineBand::ModerateDecline
        } else if slope > self.slight_above {
            FineBand::SlightDecline
        } else if slope >= self.recovery_below {
            FineBand::Stable
        } else {
            FineBand::Recovery
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let edges = [
            self.critical_above,
            self.moderate_above,
            self.slight_above,
            self.recovery_below,
        ];
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(AnalysisError::ConfigValidation(
                "fine band edges must be finite".into(),
            ));
        }
        if !(self.critical_above > self.moderate_above
            && self.moderate_above > self.slight_above
            && self.slight_above >= self.recovery_below)
        {
            return Err(AnalysisError::ConfigValidation(format!(
                "fine band edges must descend: critical_above ({}) > moderate_above ({}) > slight_above ({}) >= recovery_below ({})",
                self.critical_above, self.moderate_above, self.slight_above, self.recovery_below
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Policy bundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub coarse: CoarseThresholds,
    #[serde(default)]
    pub fine: FineBands,
}

impl ClassificationConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.coarse.validate()?;
        self.fine.validate()
    }
}

/// Whether a well counts as declining for aggregate statistics. The
/// upstream consensus label wins when present.
pub fn effective_declining(
    consensus: Option<ConsensusTrend>,
    local: Option<TrendCategory>,
) -> bool {
    match consensus {
        Some(c) => c == ConsensusTrend::Decreasing,
        None => local == Some(TrendCategory::Declining),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
