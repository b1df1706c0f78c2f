use super::codes::{Interpretation, ObservationStatus};
use crate::error::{CoreError, Result};
use crate::id::RecordId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const DEFAULT_OBSERVATION_CATEGORY: &str = "laboratory";

fn default_category() -> String {
    DEFAULT_OBSERVATION_CATEGORY.to_string()
}

/// A single laboratory measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub patient_id: RecordId,
    /// LOINC code
    pub code: String,
    pub value: f64,
    /// UCUM unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<Interpretation>,
    #[serde(with = "crate::time::serde_datetime")]
    pub effective_datetime: OffsetDateTime,
    #[serde(default)]
    pub status: ObservationStatus,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specimen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl Observation {
    pub fn new(
        patient_id: RecordId,
        code: impl Into<String>,
        value: f64,
        effective_datetime: OffsetDateTime,
    ) -> Self {
        Self {
            id: None,
            patient_id,
            code: code.into(),
            value,
            unit: None,
            ref_min: None,
            ref_max: None,
            interpretation: None,
            effective_datetime,
            status: ObservationStatus::default(),
            category: default_category(),
            notes: None,
            performer: None,
            specimen: None,
            method: None,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_range(mut self, ref_min: Option<f64>, ref_max: Option<f64>) -> Self {
        self.ref_min = ref_min;
        self.ref_max = ref_max;
        self
    }

    pub fn with_interpretation(mut self, interpretation: Interpretation) -> Self {
        self.interpretation = Some(interpretation);
        self
    }

    /// Fill `interpretation` from the reference range when it was not given.
    pub fn derive_interpretation(&mut self) {
        if self.interpretation.is_none() {
            self.interpretation = Interpretation::from_range(self.value, self.ref_min, self.ref_max);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.patient_id == 0 {
            return Err(CoreError::validation("patient_id", "must reference a patient"));
        }
        if self.code.trim().is_empty() {
            return Err(CoreError::validation("code", "must not be empty"));
        }
        if !self.value.is_finite() {
            return Err(CoreError::validation("value", "must be a finite number"));
        }
        for (path, bound) in [("ref_min", self.ref_min), ("ref_max", self.ref_max)] {
            if bound.is_some_and(|b| !b.is_finite()) {
                return Err(CoreError::validation(path, "must be a finite number"));
            }
        }
        if let (Some(min), Some(max)) = (self.ref_min, self.ref_max) {
            if min > max {
                return Err(CoreError::validation(
                    "ref_min",
                    format!("ref_min ({min}) must not exceed ref_max ({max})"),
                ));
            }
        }
        Ok(())
    }
}
