//! Built-in LOINC and UCUM vocabularies for common blood work.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoincCode {
    pub code: &'static str,
    pub display: &'static str,
    /// Conventional UCUM unit for the analyte
    pub unit: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UcumUnit {
    pub code: &'static str,
    pub display: &'static str,
}

macro_rules! loinc {
    ($code:literal, $display:literal, $unit:literal) => {
        LoincCode {
            code: $code,
            display: $display,
            unit: $unit,
        }
    };
}

pub static COMMON_LOINC: &[LoincCode] = &[
    loinc!("2339-0", "Glucose [Mass/volume] in Blood", "mg/dL"),
    loinc!("2160-0", "Creatinine [Mass/volume] in Serum or Plasma", "mg/dL"),
    loinc!("3094-0", "Urea nitrogen [Mass/volume] in Serum or Plasma", "mg/dL"),
    loinc!("2947-0", "Sodium [Moles/volume] in Blood", "mmol/L"),
    loinc!("2823-3", "Potassium [Moles/volume] in Serum or Plasma", "mmol/L"),
    loinc!("2069-3", "Chloride [Moles/volume] in Blood", "mmol/L"),
    loinc!("20565-8", "Carbon dioxide, total [Moles/volume] in Blood", "mmol/L"),
    loinc!("49765-1", "Calcium [Mass/volume] in Blood", "mg/dL"),
    loinc!("1751-7", "Albumin [Mass/volume] in Serum or Plasma", "g/dL"),
    loinc!("2885-2", "Protein [Mass/volume] in Serum or Plasma", "g/dL"),
    loinc!("1742-6", "Alanine aminotransferase [Enzymatic activity/volume] in Serum or Plasma", "U/L"),
    loinc!("1920-8", "Aspartate aminotransferase [Enzymatic activity/volume] in Serum or Plasma", "U/L"),
    loinc!("6768-6", "Alkaline phosphatase [Enzymatic activity/volume] in Serum or Plasma", "U/L"),
    loinc!("1975-2", "Bilirubin.total [Mass/volume] in Serum or Plasma", "mg/dL"),
    loinc!("1968-7", "Bilirubin.direct [Mass/volume] in Serum or Plasma", "mg/dL"),
    loinc!("718-7", "Hemoglobin [Mass/volume] in Blood", "g/dL"),
    loinc!("4544-3", "Hematocrit [Volume Fraction] of Blood by Automated count", "%"),
    loinc!("789-8", "Erythrocytes [#/volume] in Blood by Automated count", "10*6/uL"),
    loinc!("787-2", "MCV [Entitic volume] by Automated count", "fL"),
    loinc!("785-6", "MCH [Entitic mass] by Automated count", "pg"),
    loinc!("786-4", "MCHC [Mass/volume] by Automated count", "g/dL"),
    loinc!("788-0", "Erythrocyte distribution width [Ratio] by Automated count", "%"),
    loinc!("6690-2", "Leukocytes [#/volume] in Blood by Automated count", "10*3/uL"),
    loinc!("777-3", "Platelets [#/volume] in Blood by Automated count", "10*3/uL"),
    loinc!("3016-3", "Thyrotropin [Units/volume] in Serum or Plasma", "m[IU]/L"),
    loinc!("3053-6", "Triiodothyronine (T3) [Mass/volume] in Serum or Plasma", "ng/dL"),
    loinc!("3024-7", "Thyroxine (T4) free [Mass/volume] in Serum or Plasma", "ng/dL"),
];

pub static COMMON_UCUM: &[UcumUnit] = &[
    UcumUnit { code: "mmol/L", display: "millimole per liter" },
    UcumUnit { code: "mg/dL", display: "milligram per deciliter" },
    UcumUnit { code: "g/dL", display: "gram per deciliter" },
    UcumUnit { code: "U/L", display: "unit per liter" },
    UcumUnit { code: "mg/L", display: "milligram per liter" },
    UcumUnit { code: "ng/mL", display: "nanogram per milliliter" },
    UcumUnit { code: "pg/mL", display: "picogram per milliliter" },
    UcumUnit { code: "fL", display: "femtoliter" },
    UcumUnit { code: "umol/L", display: "micromole per liter" },
    UcumUnit { code: "ng/dL", display: "nanogram per deciliter" },
];

static LOINC_FORMAT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d{1,7})-(\d)$").ok());

pub fn loinc_display(code: &str) -> Option<&'static str> {
    COMMON_LOINC
        .iter()
        .find(|c| c.code == code)
        .map(|c| c.display)
}

/// Case-insensitive search over code and display. An empty query lists everything.
pub fn search_loinc(query: &str) -> Vec<LoincCode> {
    let q = query.trim().to_ascii_lowercase();
    COMMON_LOINC
        .iter()
        .filter(|c| q.is_empty() || c.code.contains(&q) || c.display.to_ascii_lowercase().contains(&q))
        .copied()
        .collect()
}

pub fn search_ucum(query: &str) -> Vec<UcumUnit> {
    let q = query.trim().to_ascii_lowercase();
    COMMON_UCUM
        .iter()
        .filter(|u| {
            q.is_empty() || u.code.to_ascii_lowercase().contains(&q) || u.display.contains(&q)
        })
        .copied()
        .collect()
}

/// Mod-10 check digit over the LOINC item number.
fn loinc_check_digit(digits: &str) -> Option<u32> {
    let mut sum = 0;
    for (pos, ch) in digits.chars().rev().enumerate() {
        let d = ch.to_digit(10)?;
        sum += if pos % 2 == 0 {
            let doubled = d * 2;
            doubled / 10 + doubled % 10
        } else {
            d
        };
    }
    Some((10 - sum % 10) % 10)
}

/// Check LOINC syntax (`NNNNN-C`) and the check digit.
pub fn validate_loinc(code: &str) -> Result<(), String> {
    let captures = LOINC_FORMAT
        .as_ref()
        .and_then(|re| re.captures(code))
        .ok_or_else(|| format!("'{code}' is not a LOINC code (expected NNNNN-C)"))?;
    let expected = loinc_check_digit(&captures[1]);
    let actual = captures[2].chars().next().and_then(|c| c.to_digit(10));
    if expected != actual {
        return Err(format!("'{code}' has an invalid LOINC check digit"));
    }
    Ok(())
}

const UCUM_PREFIXES: &[&str] = &[
    "da", "Y", "Z", "E", "P", "T", "G", "M", "k", "h", "d", "c", "m", "u", "n", "p", "f", "a",
    "z", "y",
];

/// Atoms that accept a metric prefix.
const UCUM_METRIC_ATOMS: &[&str] = &[
    "g", "L", "l", "m", "s", "mol", "U", "[IU]", "[iU]", "eq", "kat", "Pa", "K", "Cel", "Hz",
    "bar", "m[Hg]", "osm", "gy", "Sv", "Bq",
];

const UCUM_PLAIN_ATOMS: &[&str] = &[
    "min", "h", "d", "wk", "mo", "a", "%", "[ppm]", "[ppb]", "[pH]", "[arb'U]", "[HPF]", "[LPF]",
];

fn is_ucum_atom(symbol: &str) -> bool {
    if UCUM_PLAIN_ATOMS.contains(&symbol) || UCUM_METRIC_ATOMS.contains(&symbol) {
        return true;
    }
    UCUM_PREFIXES.iter().any(|prefix| {
        symbol
            .strip_prefix(prefix)
            .is_some_and(|rest| UCUM_METRIC_ATOMS.contains(&rest))
    })
}

fn is_ucum_component(component: &str) -> bool {
    // trailing annotation
    let component = match component.find('{') {
        Some(start) => {
            let annotation = &component[start..];
            if !annotation.ends_with('}') || annotation[1..annotation.len() - 1].contains(['{', '}']) {
                return false;
            }
            if start == 0 {
                return true;
            }
            &component[..start]
        }
        None => component,
    };
    if component.chars().all(|c| c.is_ascii_digit()) && !component.is_empty() {
        return true;
    }
    if let Some(exp) = component
        .strip_prefix("10*")
        .or_else(|| component.strip_prefix("10^"))
    {
        let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        return !exp.is_empty() && exp.chars().all(|c| c.is_ascii_digit());
    }
    // trailing exponent, unless the atom ends in a bracket
    let symbol = component.trim_end_matches(|c: char| c.is_ascii_digit());
    let symbol = if symbol.len() != component.len() {
        symbol.strip_suffix(['+', '-']).unwrap_or(symbol)
    } else {
        symbol
    };
    !symbol.is_empty() && is_ucum_atom(symbol)
}

/// Syntactic UCUM check covering prefixes, atoms, exponents, `10*n` factors and annotations.
pub fn validate_ucum(unit: &str) -> Result<(), String> {
    let invalid = || format!("'{unit}' is not a valid UCUM unit");
    if unit.is_empty() || unit.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let body = unit.strip_prefix('/').unwrap_or(unit);
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => depth = depth.checked_sub(1).ok_or_else(invalid)?,
            '.' | '/' if depth == 0 => {
                if !is_ucum_component(&body[start..i]) {
                    return Err(invalid());
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || !is_ucum_component(&body[start..]) {
        return Err(invalid());
    }
    Ok(())
}
