use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Debug)]
pub struct DatabaseProperty {
    pub id: String,
    #[serde(rename = "type")]
    pub typ: String,
}

#[derive(Deserialize, Debug)]
pub struct RetrieveDatabaseResp {
    pub id: String,
    #[serde(default)]
    pub title: Vec<Value>,
    #[serde(default)]
    pub properties: std::collections::HashMap<String, DatabaseProperty>,
}

impl RetrieveDatabaseResp {
    /// Literal content of the first title segment, if it has one.
    pub fn title_text(&self) -> Option<&str> {
        self.title.first()?.get("text")?.get("content")?.as_str()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub typ: String,
}

impl Block {
    pub fn is_child_database(&self) -> bool {
        self.typ == "child_database"
    }
}

#[derive(Deserialize, Debug)]
pub struct BlockChildrenResp {
    pub results: Vec<Block>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Deserialize)]
pub(crate) struct CreatedObjectResp {
    pub id: String,
}
