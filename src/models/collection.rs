use serde::{Deserialize, Serialize};

/// The collection a user is currently working in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCollection {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub egi_count: u32,
}

impl CurrentCollection {
    /// Edit page for owners and editors, public page otherwise.
    pub fn link(&self) -> String {
        if self.can_edit {
            format!("/collections/{}/edit", self.id)
        } else {
            format!("/collections/{}", self.id)
        }
    }
}
