//! Built-in operator cases of the q-implant regression suite.

use crate::dtype::QuantDType;
use crate::error::Result;
use crate::generator::{QuantizedDimension, TensorRequest};
use crate::registry::{DeclaredCase, TestRegistry};

fn scalar(dtype: QuantDType) -> TensorRequest {
    TensorRequest::new(dtype, [1], [1], QuantizedDimension::Axis(0))
}

/// Conv2D with uint8 activations/kernel and an int32 bias.
#[must_use]
pub fn conv2d_000_q8() -> DeclaredCase {
    DeclaredCase::new("Conv2D_000_Q8")
        .tensor("ifm", scalar(QuantDType::U8))
        // OHWI
        .tensor("ker", scalar(QuantDType::U8).with_value_shape([1, 1, 1, 2]))
        .tensor("bias", scalar(QuantDType::I32).with_value_shape([1]))
        .tensor("ofm", scalar(QuantDType::U8))
}

/// Mean; the reduction-indices input carries no quantization parameters.
#[must_use]
pub fn mean_000_q8() -> DeclaredCase {
    DeclaredCase::new("Mean_000_Q8")
        .tensor("ifm", scalar(QuantDType::U8))
        .tensor("ofm", scalar(QuantDType::U8))
}

/// Pad; the paddings input carries no quantization parameters.
#[must_use]
pub fn pad_000_q8() -> DeclaredCase {
    DeclaredCase::new("Pad_000_Q8")
        .tensor("ifm", scalar(QuantDType::U8))
        .tensor("ofm", scalar(QuantDType::U8))
}

/// Every built-in case, in suite order.
#[must_use]
pub fn builtin_cases() -> Vec<DeclaredCase> {
    vec![conv2d_000_q8(), mean_000_q8(), pad_000_q8()]
}

/// Registry pre-loaded with [`builtin_cases`].
pub fn builtin_registry() -> Result<TestRegistry> {
    let mut registry = TestRegistry::new();
    for case in builtin_cases() {
        registry.register(case)?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FixtureGenerator;
    use crate::registry::Generatable;

    #[test]
    fn builtin_registry_order() {
        let reg = builtin_registry().unwrap();
        assert_eq!(reg.names(), vec!["Conv2D_000_Q8", "Mean_000_Q8", "Pad_000_Q8"]);
    }

    #[test]
    fn conv2d_roles_and_shapes() {
        let set = conv2d_000_q8().generate(&mut FixtureGenerator::new(Some(9))).unwrap();
        assert_eq!(set.roles(), vec!["ifm", "ker", "bias", "ofm"]);
        assert_eq!(set.get("ker").unwrap().value.shape(), &[1, 1, 1, 2]);
        assert_eq!(set.get("bias").unwrap().dtype, QuantDType::I32);
        assert_eq!(set.get("ifm").unwrap().value.shape(), &[1]);
    }

    #[test]
    fn every_builtin_generates() {
        let mut generator = FixtureGenerator::new(Some(11));
        for case in builtin_cases() {
            let set = case.generate(&mut generator).unwrap();
            assert_eq!(set.len(), case.tensors.len(), "case {}", case.name);
        }
    }
}
