//! Coded values shared by the domain records.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)+
                    other => Err(CoreError::validation(
                        $field,
                        format!("unknown code '{other}'"),
                    )),
                }
            }
        }
    };
}

code_enum! {
    /// Administrative gender
    Gender, "gender" {
        Male => "male",
        Female => "female",
        Other => "other",
        Unknown => "unknown",
    }
}

code_enum! {
    /// v3 ObservationInterpretation subset used for lab results
    Interpretation, "interpretation" {
        Low => "L",
        Normal => "N",
        High => "H",
        CriticalLow => "LL",
        CriticalHigh => "HH",
        Abnormal => "A",
        CriticalAbnormal => "AA",
    }
}

code_enum! {
    ObservationStatus, "status" {
        Registered => "registered",
        Preliminary => "preliminary",
        Final => "final",
        Amended => "amended",
        Corrected => "corrected",
        Cancelled => "cancelled",
        EnteredInError => "entered-in-error",
        Unknown => "unknown",
    }
}

code_enum! {
    ReportStatus, "status" {
        Registered => "registered",
        Partial => "partial",
        Preliminary => "preliminary",
        Final => "final",
        Amended => "amended",
        Corrected => "corrected",
        Appended => "appended",
        Cancelled => "cancelled",
        EnteredInError => "entered-in-error",
        Unknown => "unknown",
    }
}

impl Default for ObservationStatus {
    fn default() -> Self {
        ObservationStatus::Final
    }
}

impl Default for ReportStatus {
    fn default() -> Self {
        ReportStatus::Final
    }
}

impl Interpretation {
    pub fn display(&self) -> &'static str {
        match self {
            Interpretation::Low => "Low",
            Interpretation::Normal => "Normal",
            Interpretation::High => "High",
            Interpretation::CriticalLow => "Critical low",
            Interpretation::CriticalHigh => "Critical high",
            Interpretation::Abnormal => "Abnormal",
            Interpretation::CriticalAbnormal => "Critical abnormal",
        }
    }

    /// Derive L/N/H from a value and its reference range.
    ///
    /// Returns `None` when no bound is known.
    pub fn from_range(value: f64, ref_min: Option<f64>, ref_max: Option<f64>) -> Option<Self> {
        match (ref_min, ref_max) {
            (None, None) => None,
            (Some(min), _) if value < min => Some(Interpretation::Low),
            (_, Some(max)) if value > max => Some(Interpretation::High),
            _ => Some(Interpretation::Normal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_codes() {
        assert_eq!(Gender::from_str("female").unwrap(), Gender::Female);
        assert_eq!(Gender::Male.as_str(), "male");
        let err = Gender::from_str("Female").unwrap_err();
        assert_eq!(err.path(), Some("gender"));
    }

    #[test]
    fn test_status_serde_uses_fhir_codes() {
        let json = serde_json::to_string(&ObservationStatus::EnteredInError).unwrap();
        assert_eq!(json, "\"entered-in-error\"");
        let status: ReportStatus = serde_json::from_str("\"appended\"").unwrap();
        assert_eq!(status, ReportStatus::Appended);
        assert_eq!(ObservationStatus::default(), ObservationStatus::Final);
    }

    #[test]
    fn test_interpretation_from_range() {
        assert_eq!(Interpretation::from_range(3.0, Some(4.0), Some(6.0)), Some(Interpretation::Low));
        assert_eq!(Interpretation::from_range(7.0, Some(4.0), Some(6.0)), Some(Interpretation::High));
        assert_eq!(Interpretation::from_range(4.0, Some(4.0), Some(6.0)), Some(Interpretation::Normal));
        assert_eq!(Interpretation::from_range(9.0, None, Some(10.0)), Some(Interpretation::Normal));
        assert_eq!(Interpretation::from_range(9.0, None, None), None);
    }

    #[test]
    fn test_interpretation_display() {
        assert_eq!(Interpretation::from_str("AA").unwrap().display(), "Critical abnormal");
        assert!(Interpretation::from_str("X").is_err());
    }
}
