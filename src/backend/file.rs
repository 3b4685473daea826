//! JSON file backend.
//!
//! Serves a garage described by a JSON document. The file is re-read on every
//! fetch, so editing it while the shell runs shows up on the next refresh.
//!
//! Plain JSON scalars and arrays are read-only leaves, objects are containers.
//! An object with a `$value` key describes a leaf with metadata:
//!
//! ```json
//! {
//!   "garage": {
//!     "VIN1": {
//!       "odometer": 12345,
//!       "climatisation": {
//!         "command": { "$value": "stop", "$settable": true, "$enum": ["start", "stop"] }
//!       },
//!       "charging": {
//!         "target_level": { "$value": 80, "$settable": true, "$kind": "integer" }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! `set` rewrites the file atomically (temporary file plus rename).

use super::{Backend, BackendError};
use crate::tree::{LeafSnapshot, NodePath, Snapshot, Value, ValueKind};
use serde_json::Map;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const VALUE_KEY: &str = "$value";
const SETTABLE_KEY: &str = "$settable";
const ENUM_KEY: &str = "$enum";
const KIND_KEY: &str = "$kind";

/// Backend reading a JSON document from disk.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Backend serving the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Document location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<serde_json::Value, BackendError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            BackendError::Unavailable(format!("cannot read {}: {}", self.path.display(), err))
        })?;
        serde_json::from_str(&text).map_err(|err| {
            BackendError::Unavailable(format!("cannot parse {}: {}", self.path.display(), err))
        })
    }

    async fn store(&self, doc: &serde_json::Value) -> Result<(), BackendError> {
        let text = serde_json::to_string_pretty(doc)
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        let write_err = |err: std::io::Error| {
            BackendError::Unavailable(format!("cannot write {}: {}", self.path.display(), err))
        };
        tokio::fs::write(&tmp, text).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)
    }
}

fn is_descriptor(map: &Map<String, serde_json::Value>) -> bool {
    map.contains_key(VALUE_KEY)
}

/// Convert a JSON document (or part of one) into a snapshot.
pub fn snapshot_from_json(json: &serde_json::Value) -> Snapshot {
    match json {
        serde_json::Value::Object(map) if is_descriptor(map) => Snapshot::Leaf(leaf_from_descriptor(map)),
        serde_json::Value::Object(map) => Snapshot::Container(
            map.iter()
                .map(|(name, child)| (name.clone(), snapshot_from_json(child)))
                .collect(),
        ),
        other => Snapshot::leaf(Value::from_json(other.clone())),
    }
}

fn leaf_from_descriptor(map: &Map<String, serde_json::Value>) -> LeafSnapshot {
    let raw = map.get(VALUE_KEY).cloned().unwrap_or_default();
    let settable = map
        .get(SETTABLE_KEY)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    let variants: Option<Vec<String>> = map.get(ENUM_KEY).and_then(|e| e.as_array()).map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    });

    let mut value = Value::from_json(raw);
    let kind = match (variants, map.get(KIND_KEY).and_then(|k| k.as_str())) {
        (Some(variants), _) => {
            if let Value::Text(text) = value {
                value = Value::Enum(text);
            }
            ValueKind::Enum(variants)
        }
        (None, Some("bool")) => ValueKind::Bool,
        (None, Some("integer")) => ValueKind::Integer,
        (None, Some("float")) => ValueKind::Float,
        (None, Some("text")) => ValueKind::Text,
        (None, Some("structured")) => ValueKind::Structured,
        (None, _) => ValueKind::infer(&value),
    };

    LeafSnapshot {
        value,
        kind,
        settable,
    }
}

fn locate_mut<'a>(
    doc: &'a mut serde_json::Value,
    path: &NodePath,
) -> Option<&'a mut serde_json::Value> {
    path.segments()
        .iter()
        .try_fold(doc, |node, segment| node.as_object_mut()?.get_mut(segment))
}

impl Backend for FileBackend {
    async fn fetch(&self, path: &NodePath) -> Result<Snapshot, BackendError> {
        log::debug!("reading {} for {}", self.path.display(), path);
        let doc = self.load().await?;
        snapshot_from_json(&doc)
            .get(path)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn update(&self, path: &NodePath, value: &Value) -> Result<(), BackendError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;

        let slot = locate_mut(&mut doc, path).ok_or(BackendError::NotFound)?;
        let Some(descriptor) = slot.as_object_mut().filter(|map| is_descriptor(map)) else {
            return Err(BackendError::Rejected("read-only".into()));
        };
        if !descriptor
            .get(SETTABLE_KEY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
        {
            return Err(BackendError::Rejected("read-only".into()));
        }

        let json = serde_json::to_value(value).map_err(|err| BackendError::Rejected(err.to_string()))?;
        descriptor.insert(VALUE_KEY.to_string(), json);

        log::info!("writing {} = {} to {}", path, value, self.path.display());
        self.store(&doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NodePath {
        NodePath::parse_absolute(s).unwrap()
    }

    fn doc() -> serde_json::Value {
        serde_json::json!({
            "garage": {
                "VIN1": {
                    "odometer": 12345,
                    "climatisation": {
                        "command": {"$value": "stop", "$settable": true, "$enum": ["start", "stop"]}
                    },
                    "charging": {
                        "target_level": {"$value": 80, "$settable": true, "$kind": "integer"}
                    }
                }
            }
        })
    }

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("car-shell-file-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("garage.json");
        std::fs::write(&path, serde_json::to_string(&doc()).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_snapshot_from_json() {
        let snap = snapshot_from_json(&doc());
        assert_eq!(
            snap.get(&at("/garage/VIN1/odometer")),
            Some(&Snapshot::leaf(12345))
        );
        assert_eq!(
            snap.get(&at("/garage/VIN1/climatisation/command")),
            Some(&Snapshot::settable(
                Value::Enum("stop".into()),
                ValueKind::Enum(vec!["start".into(), "stop".into()])
            ))
        );
        assert_eq!(
            snap.get(&at("/garage/VIN1/charging/target_level")),
            Some(&Snapshot::settable(80, ValueKind::Integer))
        );
    }

    #[tokio::test]
    async fn test_fetch_and_update_round_trip() {
        let path = temp_file("update");
        let backend = FileBackend::new(&path);

        let target = at("/garage/VIN1/charging/target_level");
        backend.update(&target, &Value::Integer(90)).await.unwrap();
        assert_eq!(
            backend.fetch(&target).await.unwrap(),
            Snapshot::settable(90, ValueKind::Integer)
        );

        assert_eq!(
            backend.update(&at("/garage/VIN1/odometer"), &Value::Integer(0)).await,
            Err(BackendError::Rejected("read-only".into()))
        );
        assert_eq!(
            backend.update(&at("/garage/VIN1/wheels"), &Value::Integer(0)).await,
            Err(BackendError::NotFound)
        );

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let backend = FileBackend::new("/nonexistent/car-shell/garage.json");
        assert!(matches!(
            backend.fetch(&NodePath::root()).await,
            Err(BackendError::Unavailable(_))
        ));
    }
}
