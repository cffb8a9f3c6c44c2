use serde::{Deserialize, Serialize};

/// Common metadata carried by every intent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description")]
    pub description: String,
    #[serde(default, alias = "UserData1")]
    pub user_data1: String,
    #[serde(default, alias = "UserData2")]
    pub user_data2: String,
}

impl Metadata {
    pub fn named(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}
