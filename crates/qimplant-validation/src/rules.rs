// SPDX-License-Identifier: MIT OR Apache-2.0
//! Field- and dtype-keyed numeric tolerance rules.
//!
//! A [`Ruleset`] is an ordered list of [`ToleranceRule`]s; the first rule
//! whose field and dtype match wins. The built-in set encodes the
//! regression thresholds:
//!
//! | field   | dtype          | atol  | rtol  |
//! |---------|----------------|-------|-------|
//! | `value` | int64 / uint64 | 5     | 0     |
//! | `value` | any            | 1     | 0     |
//! | `scale` | any            | 1e-5  | 1e-5  |
//! | `zerop` | any            | 1     | 0     |
//!
//! Rules can also be loaded from a YAML policy file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use qimplant_fixtures::{ElementKind, ManifestField, QuantDType};
use serde::Deserialize;

use crate::error::{Result, ValidationError};

/// Absolute and relative tolerance: `|actual - expected| <= atol + rtol * |expected|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Tolerance {
    pub const EXACT: Tolerance = Tolerance { atol: 0.0, rtol: 0.0 };

    #[must_use]
    pub const fn new(atol: f64, rtol: f64) -> Self {
        Self { atol, rtol }
    }

    fn bound(&self, expected: f64) -> f64 {
        self.atol + self.rtol * expected.abs()
    }

    /// Float comparison. NaN on either side never matches.
    #[must_use]
    pub fn allows_f64(&self, actual: f64, expected: f64) -> bool {
        if actual.is_nan() || expected.is_nan() {
            return false;
        }
        (actual - expected).abs() <= self.bound(expected)
    }

    /// Integer comparison; the difference is taken exactly.
    #[must_use]
    pub fn allows_int(&self, actual: i128, expected: i128) -> bool {
        let diff = actual.abs_diff(expected);
        diff as f64 <= self.bound(expected as f64)
    }
}

impl std::fmt::Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atol={}, rtol={}", self.atol, self.rtol)
    }
}

/// Tolerance for one field, optionally restricted to one dtype of the actual data.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceRule {
    pub field: ManifestField,
    /// `None` matches any dtype.
    pub dtype: Option<ElementKind>,
    pub tolerance: Tolerance,
}

impl ToleranceRule {
    #[must_use]
    pub fn matches(&self, field: ManifestField, dtype: ElementKind) -> bool {
        self.field == field && self.dtype.is_none_or(|d| d == dtype)
    }
}

/// Named, ordered collection of tolerance rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    pub name: String,
    pub rules: Vec<ToleranceRule>,
}

impl Ruleset {
    /// First rule matching `(field, dtype)` in this set only.
    #[must_use]
    pub fn lookup(&self, field: ManifestField, dtype: ElementKind) -> Option<Tolerance> {
        self.rules.iter().find(|r| r.matches(field, dtype)).map(|r| r.tolerance)
    }

    /// Tolerance for `(field, dtype)`, falling back to the built-in rules
    /// for anything this set leaves uncovered.
    #[must_use]
    pub fn tolerance(&self, field: ManifestField, dtype: ElementKind) -> Tolerance {
        self.lookup(field, dtype)
            .or_else(|| builtin().lookup(field, dtype))
            .unwrap_or(Tolerance::EXACT)
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        rules_builtin()
    }
}

// ---------- Built-in rules ----------

static BUILTIN: OnceLock<Ruleset> = OnceLock::new();

fn rule(field: ManifestField, dtype: Option<QuantDType>, atol: f64, rtol: f64) -> ToleranceRule {
    ToleranceRule { field, dtype: dtype.map(ElementKind::Int), tolerance: Tolerance::new(atol, rtol) }
}

fn builtin() -> &'static Ruleset {
    BUILTIN.get_or_init(|| Ruleset {
        name: "builtin".into(),
        rules: vec![
            // 64-bit biases are quantized more coarsely
            rule(ManifestField::Value, Some(QuantDType::I64), 5.0, 0.0),
            rule(ManifestField::Value, Some(QuantDType::U64), 5.0, 0.0),
            rule(ManifestField::Value, None, 1.0, 0.0),
            rule(ManifestField::Scale, None, 1e-5, 1e-5),
            rule(ManifestField::ZeroPoint, None, 1.0, 0.0),
        ],
    })
}

/// Returns a clone of the built-in tolerance rules.
pub fn rules_builtin() -> Ruleset {
    builtin().clone()
}

// ---------- YAML policy ----------

#[derive(Debug, Deserialize)]
struct YamlRule {
    field: String,
    dtype: Option<String>,
    atol: f64,
    #[serde(default)]
    rtol: f64,
}

#[derive(Debug, Deserialize)]
struct YamlRuleset {
    name: Option<String>,
    rules: Vec<YamlRule>,
}

#[derive(Debug, Deserialize)]
struct Policy {
    #[allow(dead_code)]
    version: u32,
    rules: HashMap<String, YamlRuleset>,
}

fn parse_field(s: &str) -> Option<ManifestField> {
    match s {
        "value" | "weights" => Some(ManifestField::Value),
        "scale" => Some(ManifestField::Scale),
        "zerop" | "zero_point" => Some(ManifestField::ZeroPoint),
        _ => None,
    }
}

/// Load tolerance rules from a YAML policy file.
///
/// ```yaml
/// version: 1
/// rules:
///   strict:
///     name: "strict-weights"
///     rules:
///       - { field: value, atol: 0 }
///       - { field: value, dtype: int64, atol: 2 }
/// ```
///
/// Rules keep their file order, so more specific entries go first.
pub fn load_policy(path: &Path, key: &str) -> Result<Ruleset> {
    let policy_err = |message: String| ValidationError::Policy { path: path.to_path_buf(), message };

    let text = std::fs::read_to_string(path).map_err(|e| policy_err(e.to_string()))?;
    let pol: Policy = serde_yaml::from_str(&text).map_err(|e| policy_err(e.to_string()))?;
    let rs = pol
        .rules
        .get(key)
        .ok_or_else(|| policy_err(format!("policy key '{key}' not found")))?;

    let rules = rs
        .rules
        .iter()
        .map(|r| {
            let field = parse_field(&r.field)
                .ok_or_else(|| policy_err(format!("unknown field '{}' under '{key}'", r.field)))?;
            let dtype = r
                .dtype
                .as_deref()
                .map(str::parse::<ElementKind>)
                .transpose()
                .map_err(|e| policy_err(format!("under '{key}': {e}")))?;
            if !(r.atol >= 0.0 && r.rtol >= 0.0) {
                return Err(policy_err(format!(
                    "negative tolerance for field '{}' under '{key}'",
                    r.field
                )));
            }
            Ok(ToleranceRule { field, dtype, tolerance: Tolerance::new(r.atol, r.rtol) })
        })
        .collect::<Result<_>>()?;

    Ok(Ruleset { name: rs.name.clone().unwrap_or_else(|| format!("policy:{key}")), rules })
}

#[cfg(test)]
mod tests {
    use super::*;

    const U8: ElementKind = ElementKind::Int(QuantDType::U8);
    const I64: ElementKind = ElementKind::Int(QuantDType::I64);
    const U64: ElementKind = ElementKind::Int(QuantDType::U64);

    #[test]
    fn test_builtin_value_tolerance_depends_on_width() {
        let r = rules_builtin();
        assert_eq!(r.tolerance(ManifestField::Value, U8), Tolerance::new(1.0, 0.0));
        assert_eq!(r.tolerance(ManifestField::Value, I64), Tolerance::new(5.0, 0.0));
        assert_eq!(r.tolerance(ManifestField::Value, U64), Tolerance::new(5.0, 0.0));
    }

    #[test]
    fn test_builtin_scale_and_zero_point() {
        let r = rules_builtin();
        assert_eq!(r.tolerance(ManifestField::Scale, ElementKind::F32), Tolerance::new(1e-5, 1e-5));
        assert_eq!(r.tolerance(ManifestField::ZeroPoint, I64), Tolerance::new(1.0, 0.0));
    }

    #[test]
    fn test_int_boundary_is_inclusive() {
        let t = Tolerance::new(1.0, 0.0);
        assert!(t.allows_int(11, 10));
        assert!(t.allows_int(9, 10));
        assert!(!t.allows_int(12, 10));

        let wide = Tolerance::new(5.0, 0.0);
        assert!(wide.allows_int(i128::from(i64::MIN) + 5, i128::from(i64::MIN)));
        assert!(!wide.allows_int(-6, 0));
    }

    #[test]
    fn test_float_boundary_and_nan() {
        let t = Tolerance::new(1e-5, 1e-5);
        assert!(t.allows_f64(1e-5, 0.0));
        assert!(!t.allows_f64(2e-5, 0.0));
        assert!(t.allows_f64(1.0 + 1.5e-5, 1.0));
        assert!(!t.allows_f64(f64::NAN, f64::NAN));
        assert!(!t.allows_f64(0.0, f64::NAN));
    }

    #[test]
    fn test_first_match_wins() {
        let rs = Ruleset {
            name: "t".into(),
            rules: vec![
                ToleranceRule { field: ManifestField::Value, dtype: None, tolerance: Tolerance::EXACT },
                ToleranceRule {
                    field: ManifestField::Value,
                    dtype: Some(I64),
                    tolerance: Tolerance::new(9.0, 0.0),
                },
            ],
        };
        assert_eq!(rs.tolerance(ManifestField::Value, I64), Tolerance::EXACT);
    }

    #[test]
    fn test_uncovered_field_falls_back_to_builtin() {
        let rs = Ruleset { name: "empty".into(), rules: vec![] };
        assert_eq!(rs.tolerance(ManifestField::Scale, ElementKind::F32), Tolerance::new(1e-5, 1e-5));
    }

    #[test]
    fn test_load_policy_valid() {
        let yaml = r#"
version: 1
rules:
  strict:
    name: "strict-weights"
    rules:
      - field: value
        dtype: int64
        atol: 2
      - field: value
        atol: 0
"#;
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), yaml).unwrap();
        let r = load_policy(tmp.path(), "strict").unwrap();
        assert_eq!(r.name, "strict-weights");
        assert_eq!(r.rules.len(), 2);
        assert_eq!(r.tolerance(ManifestField::Value, I64), Tolerance::new(2.0, 0.0));
        assert_eq!(r.tolerance(ManifestField::Value, U8), Tolerance::EXACT);
        // not covered by the policy
        assert_eq!(r.tolerance(ManifestField::ZeroPoint, I64), Tolerance::new(1.0, 0.0));
    }

    #[test]
    fn test_load_policy_missing_key() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "version: 1\nrules:\n  a:\n    rules: []\n").unwrap();
        let err = load_policy(tmp.path(), "missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_load_policy_rejects_unknown_field_and_dtype() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "version: 1\nrules:\n  a:\n    rules:\n      - { field: bias, atol: 1 }\n",
        )
        .unwrap();
        assert!(load_policy(tmp.path(), "a").is_err());

        std::fs::write(
            tmp.path(),
            "version: 1\nrules:\n  a:\n    rules:\n      - { field: value, dtype: bf16, atol: 1 }\n",
        )
        .unwrap();
        assert!(load_policy(tmp.path(), "a").is_err());
    }
}
