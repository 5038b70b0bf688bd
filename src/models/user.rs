use serde::{Deserialize, Serialize};

/// Operator identity in the account directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub onlyfans_account_ids: Vec<String>,
}
