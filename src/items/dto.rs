use serde::Deserialize;
use serde_json::Value;

/// Body for creating or updating an item. Omitted `tags` keep their current
/// value on update and default to `[]` on create.
#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub name: String,
    #[serde(default)]
    pub tags: Option<Value>,
}
