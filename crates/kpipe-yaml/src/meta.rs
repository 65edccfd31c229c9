use crate::node::{field, scalar_text, untag};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Identity of a resource document.
///
/// Missing fields read as empty strings and empty maps; documents that are
/// not resources at all simply produce an empty meta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl ResourceMeta {
    pub fn from_value(value: &Value) -> Self {
        let text = |v: Option<&Value>| v.and_then(scalar_text).unwrap_or_default();
        let metadata = field(value, "metadata");
        ResourceMeta {
            api_version: text(field(value, "apiVersion")),
            kind: text(field(value, "kind")),
            name: text(metadata.and_then(|m| field(m, "name"))),
            namespace: text(metadata.and_then(|m| field(m, "namespace"))),
            labels: string_map(metadata.and_then(|m| field(m, "labels"))),
            annotations: string_map(metadata.and_then(|m| field(m, "annotations"))),
        }
    }

    /// True when both apiVersion and kind are set
    pub fn is_resource(&self) -> bool {
        !self.api_version.is_empty() && !self.kind.is_empty()
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(Value::Mapping(map)) = value.map(untag) {
        for (k, v) in map {
            if let (Some(k), Some(v)) = (scalar_text(k), scalar_text(v)) {
                out.insert(k, v);
            }
        }
    }
    out
}
