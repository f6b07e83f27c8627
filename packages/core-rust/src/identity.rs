//! Workload identity records and metadata parsing.
//!
//! Peers announce who they are as a loosely-typed metadata tree; fleets run
//! heterogeneous versions, so the tree may carry fields this build has never
//! heard of. The lenient parser here ignores anything it does not recognize
//! and never fails — forward and backward compatibility beat strictness on
//! this path. A strict variant exists for callers that need full structural
//! fidelity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Metadata field listing which keys a workload shares with its peers.
pub const EXCHANGE_KEYS_FIELD: &str = "EXCHANGE_KEYS";

/// Structured workload identity derived from raw node metadata.
///
/// All fields default to empty. Records are immutable once constructed and
/// shared read-only as `Arc<IdentityRecord>`; a record stays alive for any
/// reader that fetched it even after the owning cache evicts it.
///
/// Serde field names follow the metadata wire keys (`NAME`,
/// `WORKLOAD_NAME`, …).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct IdentityRecord {
    /// Instance name of the workload.
    pub name: String,
    /// Namespace the workload runs in.
    pub namespace: String,
    /// Resource that owns the workload (deployment, job, …).
    pub owner: String,
    /// Name of the owning workload, without the instance suffix.
    pub workload_name: String,
    /// Mesh dataplane version string announced by the workload.
    pub istio_version: String,
    /// Identifier of the mesh the workload belongs to.
    pub mesh_id: String,
    /// Workload labels.
    pub labels: BTreeMap<String, String>,
    /// Platform-specific metadata (cloud project, zone, …).
    pub platform_metadata: BTreeMap<String, String>,
}

impl IdentityRecord {
    /// Lenient, schema-tolerant parse of a metadata tree.
    ///
    /// Recognized scalar fields copy verbatim as strings; a present key with
    /// a non-string value copies as empty rather than being skipped.
    /// `LABELS` and `PLATFORM_METADATA` copy entry-by-entry when the value
    /// is a subtree and are skipped otherwise. Unrecognized keys are
    /// silently ignored. Never fails: a non-map root yields the empty
    /// record.
    #[must_use]
    pub fn from_metadata(metadata: &Value) -> Self {
        let mut record = Self::default();
        let Some(fields) = metadata.as_map() else {
            return record;
        };
        for (key, value) in fields {
            match key.as_str() {
                "NAME" => record.name = string_field(value),
                "NAMESPACE" => record.namespace = string_field(value),
                "OWNER" => record.owner = string_field(value),
                "WORKLOAD_NAME" => record.workload_name = string_field(value),
                "ISTIO_VERSION" => record.istio_version = string_field(value),
                "MESH_ID" => record.mesh_id = string_field(value),
                "LABELS" => copy_string_map(value, &mut record.labels),
                "PLATFORM_METADATA" => copy_string_map(value, &mut record.platform_metadata),
                _ => {}
            }
        }
        record
    }

    /// Strict parse: round-trips the tree through a validated structural
    /// format.
    ///
    /// Unknown fields are still ignored, but a recognized field bound to
    /// the wrong shape (e.g. `LABELS` holding a scalar) fails with
    /// [`Error::MalformedMetadata`].
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedMetadata` when the tree violates the
    /// record's structural constraints.
    pub fn from_metadata_strict(metadata: &Value) -> Result<Self> {
        serde_json::from_value(metadata.to_json())
            .map_err(|err| Error::MalformedMetadata(err.to_string()))
    }
}

fn string_field(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn copy_string_map(value: &Value, target: &mut BTreeMap<String, String>) {
    let Some(entries) = value.as_map() else {
        return;
    };
    for (key, entry) in entries {
        target.insert(key.clone(), string_field(entry));
    }
}

/// Projects the fields named by `EXCHANGE_KEYS` out of a node metadata tree.
///
/// The key list is comma-separated; surrounding whitespace is trimmed and
/// empty items are dropped. Keys absent from the tree are skipped.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` when the tree is not a map, or when
/// `EXCHANGE_KEYS` is missing or not a string.
pub fn select_exchange_metadata(node_metadata: &Value) -> Result<Value> {
    let fields = node_metadata
        .as_map()
        .ok_or_else(|| Error::InvalidArgument("node metadata is not a map".to_string()))?;
    let keys = fields
        .get(EXCHANGE_KEYS_FIELD)
        .ok_or_else(|| Error::InvalidArgument("metadata exchange key is missing".to_string()))?;
    let keys = keys
        .as_str()
        .ok_or_else(|| Error::InvalidArgument("metadata exchange key is not a string".to_string()))?;

    let mut selected = BTreeMap::new();
    for key in keys.split(',').map(str::trim).filter(|key| !key.is_empty()) {
        if let Some(value) = fields.get(key) {
            selected.insert(key.to_string(), value.clone());
        }
    }
    Ok(Value::Map(selected))
}
