//! Process exit codes, distinct per failure class so CI can triage.

use qimplant_fixtures::FixtureError;
use qimplant_validation::ValidationError;

use crate::driver::DriverError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERIC_FAIL: i32 = 1;
pub const EXIT_MISMATCH: i32 = 2;
pub const EXIT_INTEGRITY: i32 = 3;
pub const EXIT_DRIVER_FAIL: i32 = 4;
pub const EXIT_GENERATION_FAIL: i32 = 5;

/// Exit code for an error that escaped a command.
pub fn code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ValidationError>() {
            return match e {
                ValidationError::Integrity { .. } => EXIT_INTEGRITY,
                _ => EXIT_GENERIC_FAIL,
            };
        }
        if cause.downcast_ref::<DriverError>().is_some() {
            return EXIT_DRIVER_FAIL;
        }
        if cause.downcast_ref::<FixtureError>().is_some() {
            return EXIT_GENERATION_FAIL;
        }
    }
    EXIT_GENERIC_FAIL
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn context_does_not_hide_the_cause() {
        let err: anyhow::Result<()> = Err(DriverError::MissingOutput("out.circle".into()))
            .context("running Conv2D_000_Q8");
        assert_eq!(code_for(&err.unwrap_err()), EXIT_DRIVER_FAIL);
    }

    #[test]
    fn fixture_errors_map_to_generation() {
        let err = anyhow::Error::new(FixtureError::UnknownCase("Nope".into()));
        assert_eq!(code_for(&err), EXIT_GENERATION_FAIL);
    }

    #[test]
    fn integrity_maps_to_its_own_code() {
        let err = anyhow::Error::new(ValidationError::Integrity { errors: vec![] });
        assert_eq!(code_for(&err), EXIT_INTEGRITY);
        assert_eq!(code_for(&anyhow::anyhow!("boom")), EXIT_GENERIC_FAIL);
    }
}
