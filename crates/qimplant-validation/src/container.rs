// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node-keyed tensor container produced by the injection tool.
//!
//! The container is a safetensors file whose tensor keys are
//! `<node>/<dataset>`. The node is everything before the last `/`, so node
//! names may themselves contain `/`. Each node holds up to three datasets:
//! [`WEIGHTS_DATASET`], [`SCALE_DATASET`] and [`ZERO_POINT_DATASET`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use qimplant_fixtures::{
    ArrayData, ElementKind, ManifestField, NumericArray, QuantDType, element_count,
};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use tracing::{debug, warn};

use crate::error::ContainerError;

pub const WEIGHTS_DATASET: &str = "weights";
pub const SCALE_DATASET: &str = "scale";
pub const ZERO_POINT_DATASET: &str = "zero_point";

/// Container dataset holding a manifest field.
#[must_use]
pub const fn dataset_for(field: ManifestField) -> &'static str {
    match field {
        ManifestField::Value => WEIGHTS_DATASET,
        ManifestField::Scale => SCALE_DATASET,
        ManifestField::ZeroPoint => ZERO_POINT_DATASET,
    }
}

fn kind_from_dtype(dtype: Dtype) -> Option<ElementKind> {
    Some(match dtype {
        Dtype::U8 => ElementKind::Int(QuantDType::U8),
        Dtype::I8 => ElementKind::Int(QuantDType::I8),
        Dtype::U16 => ElementKind::Int(QuantDType::U16),
        Dtype::I16 => ElementKind::Int(QuantDType::I16),
        Dtype::U32 => ElementKind::Int(QuantDType::U32),
        Dtype::I32 => ElementKind::Int(QuantDType::I32),
        Dtype::U64 => ElementKind::Int(QuantDType::U64),
        Dtype::I64 => ElementKind::Int(QuantDType::I64),
        Dtype::F32 => ElementKind::F32,
        Dtype::F64 => ElementKind::F64,
        _ => return None,
    })
}

fn dtype_from_kind(kind: ElementKind) -> Dtype {
    match kind {
        ElementKind::Int(QuantDType::U8) => Dtype::U8,
        ElementKind::Int(QuantDType::I8) => Dtype::I8,
        ElementKind::Int(QuantDType::U16) => Dtype::U16,
        ElementKind::Int(QuantDType::I16) => Dtype::I16,
        ElementKind::Int(QuantDType::U32) => Dtype::U32,
        ElementKind::Int(QuantDType::I32) => Dtype::I32,
        ElementKind::Int(QuantDType::U64) => Dtype::U64,
        ElementKind::Int(QuantDType::I64) => Dtype::I64,
        ElementKind::F32 => Dtype::F32,
        ElementKind::F64 => Dtype::F64,
    }
}

fn decode(key: &str, view: &TensorView<'_>) -> Result<NumericArray, ContainerError> {
    let kind = kind_from_dtype(view.dtype()).ok_or_else(|| ContainerError::UnsupportedDType {
        key: key.to_string(),
        dtype: format!("{:?}", view.dtype()),
    })?;
    let shape = view.shape().to_vec();
    let truncated = || ContainerError::Truncated { key: key.to_string(), shape: shape.clone() };
    let len = element_count(&shape).ok_or_else(truncated)?;
    let data = ArrayData::from_le_bytes(kind, view.data(), len).ok_or_else(truncated)?;
    NumericArray::new(shape.clone(), data).ok_or_else(truncated)
}

/// Decoded container, grouped by node.
///
/// Datasets with a dtype this crate cannot represent are kept as errors and
/// only reported when a comparison actually needs them.
#[derive(Debug, Default)]
pub struct Container {
    nodes: BTreeMap<String, BTreeMap<String, Result<NumericArray, String>>>,
}

impl Container {
    /// Read and decode a container file.
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        let bytes = fs::read(path)
            .map_err(|source| ContainerError::Read { path: path.to_path_buf(), source })?;
        let container = Self::from_bytes(&bytes)?;
        debug!(path = %path.display(), nodes = container.nodes.len(), "opened container");
        Ok(container)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContainerError> {
        let st = SafeTensors::deserialize(bytes).map_err(|e| ContainerError::Format(e.to_string()))?;
        let mut nodes: BTreeMap<String, BTreeMap<String, Result<NumericArray, String>>> =
            BTreeMap::new();
        for (key, view) in st.tensors() {
            let Some((node, dataset)) = key.rsplit_once('/').filter(|(n, d)| !n.is_empty() && !d.is_empty())
            else {
                warn!(key = %key, "ignoring container tensor without a <node>/<dataset> key");
                continue;
            };
            let decoded = decode(&key, &view).map_err(|e| e.to_string());
            nodes.entry(node.to_string()).or_default().insert(dataset.to_string(), decoded);
        }
        Ok(Self { nodes })
    }

    /// Node names in sorted order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn contains_node(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    /// Dataset names held by `node`, sorted.
    #[must_use]
    pub fn datasets(&self, node: &str) -> Vec<&str> {
        self.nodes.get(node).map(|d| d.keys().map(String::as_str).collect()).unwrap_or_default()
    }

    /// Look up one dataset.
    ///
    /// `Ok(None)` when the node or dataset is absent; `Err` with the decode
    /// failure when it exists but could not be read.
    pub fn dataset(&self, node: &str, dataset: &str) -> Result<Option<&NumericArray>, String> {
        match self.nodes.get(node).and_then(|d| d.get(dataset)) {
            None => Ok(None),
            Some(Ok(array)) => Ok(Some(array)),
            Some(Err(message)) => Err(message.clone()),
        }
    }
}

/// Assembles a container in memory and serializes it.
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    tensors: BTreeMap<String, NumericArray>,
}

impl ContainerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) `node/dataset`.
    #[must_use]
    pub fn dataset(mut self, node: &str, dataset: &str, array: NumericArray) -> Self {
        self.insert(node, dataset, array);
        self
    }

    pub fn insert(&mut self, node: &str, dataset: &str, array: NumericArray) {
        self.tensors.insert(format!("{node}/{dataset}"), array);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        let views = self
            .tensors
            .iter()
            .map(|(key, array)| {
                let bytes = array.data().as_bytes();
                TensorView::new(dtype_from_kind(array.kind()), array.shape().to_vec(), bytes)
                    .map(|view| (key.as_str(), view))
                    .map_err(|e| ContainerError::Format(format!("{key}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        safetensors::serialize(views, None).map_err(|e| ContainerError::Format(e.to_string()))
    }

    pub fn write(&self, path: &Path) -> Result<(), ContainerError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)
            .map_err(|source| ContainerError::Write { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_names_split_at_last_slash() {
        let bytes = ContainerBuilder::new()
            .dataset("model/conv_1", WEIGHTS_DATASET, NumericArray::vector(ArrayData::U8(vec![1, 2])))
            .dataset("model/conv_1", SCALE_DATASET, NumericArray::vector(ArrayData::F32(vec![0.5])))
            .dataset("pad_1", ZERO_POINT_DATASET, NumericArray::vector(ArrayData::I64(vec![3])))
            .to_bytes()
            .unwrap();
        let c = Container::from_bytes(&bytes).unwrap();
        assert_eq!(c.nodes().collect::<Vec<_>>(), vec!["model/conv_1", "pad_1"]);
        assert_eq!(c.datasets("model/conv_1"), vec![SCALE_DATASET, WEIGHTS_DATASET]);
        let w = c.dataset("model/conv_1", WEIGHTS_DATASET).unwrap().unwrap();
        assert_eq!(w.data(), &ArrayData::U8(vec![1, 2]));
        assert!(c.dataset("pad_1", WEIGHTS_DATASET).unwrap().is_none());
        assert!(c.dataset("nope", WEIGHTS_DATASET).unwrap().is_none());
    }

    #[test]
    fn multi_dimensional_shape_survives() {
        let arr = NumericArray::new(vec![1, 1, 1, 2], ArrayData::I8(vec![-1, 7])).unwrap();
        let bytes = ContainerBuilder::new().dataset("ker", WEIGHTS_DATASET, arr.clone()).to_bytes().unwrap();
        let c = Container::from_bytes(&bytes).unwrap();
        assert_eq!(c.dataset("ker", WEIGHTS_DATASET).unwrap(), Some(&arr));
    }

    #[test]
    fn keys_without_node_are_ignored() {
        let data = [1u8, 2];
        let view = TensorView::new(Dtype::U8, vec![2], &data).unwrap();
        let bytes = safetensors::serialize(vec![("orphan", view)], None).unwrap();
        let c = Container::from_bytes(&bytes).unwrap();
        assert_eq!(c.node_count(), 0);
    }

    #[test]
    fn unsupported_dtype_is_deferred_to_lookup() {
        let data = [0u8, 0x3c];
        let view = TensorView::new(Dtype::F16, vec![1], &data).unwrap();
        let bytes = safetensors::serialize(vec![("conv/scale", view)], None).unwrap();
        let c = Container::from_bytes(&bytes).unwrap();
        assert!(c.contains_node("conv"));
        let err = c.dataset("conv", SCALE_DATASET).unwrap_err();
        assert!(err.contains("unsupported dtype"));
    }

    #[test]
    fn garbage_bytes_are_a_format_error() {
        assert!(matches!(Container::from_bytes(b"not a container"), Err(ContainerError::Format(_))));
    }

    #[test]
    fn open_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Container::open(&dir.path().join("missing.safetensors")).unwrap_err();
        assert!(matches!(err, ContainerError::Read { .. }));
    }
}
