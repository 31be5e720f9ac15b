//! Named test cases and the ordered registry that holds them.

use std::fs;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{FixtureError, Result};
use crate::generator::{FixtureGenerator, QuantizedTensorFixture, TensorRequest};

/// Ordered mapping of tensor role (`ifm`, `ker`, `bias`, `ofm`, ...) to fixture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureSet {
    entries: Vec<(String, QuantizedTensorFixture)>,
}

impl FixtureSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a role. Roles are unique within a set.
    pub fn insert(
        &mut self,
        case: &str,
        role: impl Into<String>,
        fixture: QuantizedTensorFixture,
    ) -> Result<()> {
        let role = role.into();
        if self.get(&role).is_some() {
            return Err(FixtureError::DuplicateRole { case: case.to_string(), role });
        }
        self.entries.push((role, fixture));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, role: &str) -> Option<&QuantizedTensorFixture> {
        self.entries.iter().find(|(r, _)| r == role).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QuantizedTensorFixture)> {
        self.entries.iter().map(|(r, f)| (r.as_str(), f))
    }

    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        self.entries.iter().map(|(r, _)| r.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Anything that can produce a named set of fixtures.
pub trait Generatable {
    /// Case name; also the output directory name.
    fn name(&self) -> &str;

    /// Draw a fresh fixture set from `generator`.
    fn generate(&self, generator: &mut FixtureGenerator) -> Result<FixtureSet>;

    /// Tensor roles this case produces, in emission order.
    fn roles(&self) -> Vec<String> {
        Vec::new()
    }
}

/// One `(role, request)` pair of a [`DeclaredCase`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDecl {
    pub role: String,
    #[serde(flatten)]
    pub request: TensorRequest,
}

/// Data-driven test case: a name plus the tensors to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredCase {
    pub name: String,
    #[serde(rename = "tensor", default)]
    pub tensors: Vec<TensorDecl>,
}

impl DeclaredCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), tensors: Vec::new() }
    }

    #[must_use]
    pub fn tensor(mut self, role: impl Into<String>, request: TensorRequest) -> Self {
        self.tensors.push(TensorDecl { role: role.into(), request });
        self
    }
}

impl Generatable for DeclaredCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, generator: &mut FixtureGenerator) -> Result<FixtureSet> {
        let mut set = FixtureSet::new();
        for decl in &self.tensors {
            let fixture = generator.generate(&decl.request)?;
            set.insert(&self.name, decl.role.clone(), fixture)?;
        }
        Ok(set)
    }

    fn roles(&self) -> Vec<String> {
        self.tensors.iter().map(|t| t.role.clone()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct CaseFile {
    #[serde(rename = "case", default)]
    cases: Vec<DeclaredCase>,
}

/// Parse `[[case]]` tables from a TOML case file.
///
/// ```toml
/// [[case]]
/// name = "Add_000_Q8"
///
/// [[case.tensor]]
/// role = "ifm1"
/// dtype = "uint8"
/// scale_shape = [1]
/// zerop_shape = [1]
/// quantized_dimension = 0
/// ```
pub fn load_case_file(path: &Path) -> Result<Vec<DeclaredCase>> {
    let text = fs::read_to_string(path)
        .map_err(|source| FixtureError::Read { path: path.to_path_buf(), source })?;
    parse_case_file(&text)
        .map_err(|message| FixtureError::CaseFile { path: path.to_path_buf(), message })
}

fn parse_case_file(text: &str) -> std::result::Result<Vec<DeclaredCase>, String> {
    let file: CaseFile = toml::from_str(text).map_err(|e| e.to_string())?;
    Ok(file.cases)
}

/// Ordered collection of test cases. Insertion order is emission order.
#[derive(Default)]
pub struct TestRegistry {
    cases: Vec<Box<dyn Generatable>>,
}

impl TestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a case. Duplicate names are rejected, never overwritten.
    ///
    /// The name becomes a directory under the output root, so it must be a
    /// single normal path component.
    pub fn register(&mut self, case: impl Generatable + 'static) -> Result<()> {
        if !is_directory_name(case.name()) {
            return Err(FixtureError::InvalidCaseName(case.name().to_string()));
        }
        if self.contains(case.name()) {
            return Err(FixtureError::DuplicateCase(case.name().to_string()));
        }
        self.cases.push(Box::new(case));
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cases.iter().any(|c| c.name() == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Generatable> {
        self.cases.iter().map(|c| c.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Keep only the named cases, preserving registration order.
    ///
    /// Unknown names are an error so a typo never silently runs nothing.
    pub fn select(self, names: &[String]) -> Result<Self> {
        if let Some(missing) = names.iter().find(|n| !self.contains(n)) {
            return Err(FixtureError::UnknownCase(missing.clone()));
        }
        let cases = self.cases.into_iter().filter(|c| names.iter().any(|n| n == c.name())).collect();
        Ok(Self { cases })
    }
}

fn is_directory_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(c)), None) if c == name)
}

impl std::fmt::Debug for TestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRegistry").field("cases", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::QuantDType;
    use crate::generator::QuantizedDimension;

    fn scalar_u8() -> TensorRequest {
        TensorRequest::new(QuantDType::U8, [1], [1], QuantizedDimension::Axis(0))
    }

    #[test]
    fn case_names_must_be_plain_directory_names() {
        let mut reg = TestRegistry::new();
        for bad in ["", ".", "..", "../escape", "a/b", "/abs", "Pad_000_Q8/"] {
            let err = reg.register(DeclaredCase::new(bad)).unwrap_err();
            assert!(matches!(err, FixtureError::InvalidCaseName(_)), "{bad:?} accepted");
            assert!(err.is_configuration());
        }
        assert!(reg.is_empty());
        reg.register(DeclaredCase::new("Pad_000_Q8")).unwrap();
    }

    #[test]
    fn registry_preserves_insertion_order() {
        let mut reg = TestRegistry::new();
        for name in ["b", "a", "c"] {
            reg.register(DeclaredCase::new(name).tensor("ifm", scalar_u8())).unwrap();
        }
        assert_eq!(reg.names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn duplicate_case_names_are_rejected() {
        let mut reg = TestRegistry::new();
        reg.register(DeclaredCase::new("Conv")).unwrap();
        let err = reg.register(DeclaredCase::new("Conv")).unwrap_err();
        assert!(matches!(err, FixtureError::DuplicateCase(ref n) if n == "Conv"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicate_roles_are_rejected() {
        let case = DeclaredCase::new("Dup").tensor("ifm", scalar_u8()).tensor("ifm", scalar_u8());
        let err = case.generate(&mut FixtureGenerator::new(Some(0))).unwrap_err();
        assert!(matches!(err, FixtureError::DuplicateRole { .. }));
    }

    #[test]
    fn select_keeps_registration_order_and_rejects_unknown() {
        let mut reg = TestRegistry::new();
        for name in ["x", "y", "z"] {
            reg.register(DeclaredCase::new(name)).unwrap();
        }
        let picked = reg.select(&["z".to_string(), "x".to_string()]).unwrap();
        assert_eq!(picked.names(), vec!["x", "z"]);

        let mut reg = TestRegistry::new();
        reg.register(DeclaredCase::new("x")).unwrap();
        assert!(matches!(reg.select(&["q".to_string()]), Err(FixtureError::UnknownCase(_))));
    }

    #[test]
    fn case_file_parses_nested_tensor_tables() {
        let text = r#"
[[case]]
name = "Add_000_Q8"

[[case.tensor]]
role = "ifm1"
dtype = "uint8"
scale_shape = [1]
zerop_shape = [1]
quantized_dimension = 0

[[case.tensor]]
role = "ker"
dtype = "int16"
scale_shape = [2]
zerop_shape = [2]
quantized_dimension = 0
value_shape = [2, 3]

[[case]]
name = "Relu_000_Q8"

[[case.tensor]]
role = "ifm"
dtype = "int8"
scale_shape = [1]
zerop_shape = [1]
quantized_dimension = "per_tensor"
"#;
        let cases = parse_case_file(text).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].roles(), vec!["ifm1", "ker"]);
        assert_eq!(cases[0].tensors[1].request.value_shape, Some(vec![2, 3]));
        assert_eq!(cases[1].tensors[0].request.quantized_dimension, QuantizedDimension::PerTensor);
    }

    #[test]
    fn case_file_rejects_unknown_dtype() {
        let text = r#"
[[case]]
name = "Bad"
[[case.tensor]]
role = "ifm"
dtype = "float32"
scale_shape = [1]
zerop_shape = [1]
quantized_dimension = 0
"#;
        assert!(parse_case_file(text).is_err());
    }
}
