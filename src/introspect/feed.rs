use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::TypeTag;
use crate::introspect::descriptor::Direction;

/// Raw operation list as reported by the native library's introspection.
///
/// The binding layer treats this as trusted data; [`DescriptorStore::load`] only checks that it is
/// internally consistent.
///
/// [`DescriptorStore::load`]: crate::DescriptorStore::load
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct IntrospectionFeed {
    #[serde(default)]
    pub library: String,
    pub operations: Vec<RawOperation>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RawOperation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Parameters in the order the native library reports them.
    pub params: Vec<RawParam>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RawParam {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub direction: Direction,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl IntrospectionFeed {
    pub fn from_json(json: &str) -> BindResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| BindError::introspection(format!("invalid introspection feed: {e}")))
    }

    pub fn to_json(&self) -> BindResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BindError::introspection(format!("serializing feed: {e}")))
    }
}
