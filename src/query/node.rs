use std::sync::Arc;

use serde_json::Value;

/// Key carrying the GraphQL type of a returned object
pub const TYPENAME_KEY: &str = "__typename";

/// Key carrying the global node identifier of a returned object
pub const ID_KEY: &str = "id";

/// A remote object recognised while scanning a response.
///
/// Nodes are created once per object instance and never mutated. The parent
/// link points at the closest enclosing node and is only used for lookups
/// such as "which repository does this pull request belong to"; parents never
/// reference their children, so the links cannot form cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredNode {
    id: String,
    element_type: String,
    payload: Value,
    parent: Option<Arc<DiscoveredNode>>,
}

impl DiscoveredNode {
    pub fn new(
        id: impl Into<String>,
        element_type: impl Into<String>,
        payload: Value,
        parent: Option<Arc<DiscoveredNode>>,
    ) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            payload,
            parent,
        }
    }

    /// Build a node from a JSON object carrying both `__typename` and `id`
    pub fn from_object(
        object: &serde_json::Map<String, Value>,
        parent: Option<Arc<DiscoveredNode>>,
    ) -> Option<Self> {
        let element_type = object.get(TYPENAME_KEY)?.as_str()?;
        let id = object.get(ID_KEY)?.as_str()?;
        Some(Self::new(
            id,
            element_type,
            Value::Object(object.clone()),
            parent,
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn parent(&self) -> Option<&Arc<DiscoveredNode>> {
        self.parent.as_ref()
    }

    /// String value of a top level payload key
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Identifier of the object nested under `key`, e.g. `repository.id`
    pub fn nested_id(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(|nested| nested.get(ID_KEY))
            .and_then(Value::as_str)
    }
}
