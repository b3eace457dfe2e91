use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListNameRequest {
    pub name: String,
}
