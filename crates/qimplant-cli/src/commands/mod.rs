//! CLI command implementations

pub mod cases;
pub mod generate;
pub mod run;
pub mod validate;

pub use cases::CasesCommand;
pub use generate::GenerateCommand;
pub use run::RunCommand;
pub use validate::ValidateCommand;

use std::path::Path;

use qimplant_fixtures::{FixtureError, TestRegistry, builtin_registry, load_case_file};

/// Built-in cases plus those from `cases_file`, narrowed to `selected` when non-empty.
pub fn build_registry(
    cases_file: Option<&Path>,
    selected: &[String],
) -> Result<TestRegistry, FixtureError> {
    let mut registry = builtin_registry()?;
    if let Some(path) = cases_file {
        for case in load_case_file(path)? {
            registry.register(case)?;
        }
    }
    if selected.is_empty() { Ok(registry) } else { registry.select(selected) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_file_extends_builtins() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[[case]]\nname = \"Relu_000_Q8\"\n[[case.tensor]]\nrole = \"ifm\"\ndtype = \"uint8\"\nscale_shape = [1]\nzerop_shape = [1]\nquantized_dimension = 0\n",
        )
        .unwrap();
        let reg = build_registry(Some(tmp.path()), &[]).unwrap();
        assert_eq!(reg.names().last(), Some(&"Relu_000_Q8"));
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn case_file_cannot_shadow_builtin() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[[case]]\nname = \"Pad_000_Q8\"\n").unwrap();
        let err = build_registry(Some(tmp.path()), &[]).unwrap_err();
        assert!(matches!(err, FixtureError::DuplicateCase(_)));
    }

    #[test]
    fn selection_narrows() {
        let reg = build_registry(None, &["Mean_000_Q8".to_string()]).unwrap();
        assert_eq!(reg.names(), vec!["Mean_000_Q8"]);
    }
}
