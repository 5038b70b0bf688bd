use serde::{Deserialize, Serialize};

/// A connected OnlyFans account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OnlyFansAccount {
    #[serde(rename = "account")]
    pub account_id: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_wire_names() {
        let account: OnlyFansAccount =
            serde_json::from_value(json!({"account": "acct_1", "name": "Main"}))
                .expect("invalid account");
        assert_eq!(account.account_id, "acct_1");
        assert_eq!(account.name, "Main");
        let value = serde_json::to_value(&account).expect("serialize failed");
        assert_eq!(value, json!({"account": "acct_1", "name": "Main"}));
    }
}
