use serde_json::{Map, Value};
use std::collections::HashSet;

pub type ChatId = i64;

/// Kind of mutation reported by a change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Update,
    Replace,
}

/// One notification from the store: what happened to which chat, and the
/// full document state after the mutation when the feed delivered it.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub operation: OperationKind,
    pub key: Option<ChatId>,
    pub document: Option<ChatDocument>,
}

/// A chat document as stored: a semi-structured mapping. Accessors default
/// on missing or mistyped fields instead of failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatDocument {
    fields: Map<String, Value>,
}

impl ChatDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn with_messages(chat_id: ChatId, messages: Vec<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert("chat_id".into(), chat_id.into());
        fields.insert("messages".into(), Value::Array(messages));
        Self { fields }
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.fields.get("chat_id").and_then(Value::as_i64)
    }

    pub fn messages(&self) -> &[Value] {
        self.fields
            .get("messages")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The most recently appended message, regardless of sender.
    pub fn latest_message(&self) -> Option<&Value> {
        self.messages().last()
    }

    /// The most recent message with role "client", by `created_at`.
    pub fn latest_client_message(&self) -> Option<&Value> {
        self.messages()
            .iter()
            .filter(|message| message.get("role").and_then(Value::as_str) == Some("client"))
            .filter(|message| message.get("created_at").is_some())
            .max_by_key(|message| {
                message
                    .get("created_at")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
            })
    }

    /// Content fingerprint of the messages field. This is the raw JSON
    /// rendering: formatting or key-ordering differences count as changes.
    pub fn fingerprint(&self) -> String {
        self.fields
            .get("messages")
            .map(Value::to_string)
            .unwrap_or_else(|| Value::Null.to_string())
    }
}

/// Predicate restricting a change feed to a set of chat ids. An empty set
/// matches nothing, so an idle feed costs nothing to tail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    chat_ids: HashSet<ChatId>,
}

impl ChangeFilter {
    pub fn new(chat_ids: HashSet<ChatId>) -> Self {
        Self { chat_ids }
    }

    pub fn is_empty(&self) -> bool {
        self.chat_ids.is_empty()
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        let key = event
            .key
            .or_else(|| event.document.as_ref().and_then(ChatDocument::chat_id));
        key.is_some_and(|chat_id| self.chat_ids.contains(&chat_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> ChatDocument {
        ChatDocument::from_value(value).expect("not an object")
    }

    #[test]
    fn accessors_default_on_missing_fields() {
        let doc = document(json!({}));
        assert_eq!(doc.chat_id(), None);
        assert!(doc.messages().is_empty());
        assert!(doc.latest_message().is_none());
        assert!(doc.latest_client_message().is_none());
    }

    #[test]
    fn latest_client_message_by_created_at() {
        let doc = document(json!({
            "chat_id": 42,
            "messages": [
                {"role": "client", "content": "old", "created_at": "2024-01-01T00:00:00Z"},
                {"role": "creator", "content": "reply", "created_at": "2024-01-03T00:00:00Z"},
                {"role": "client", "content": "new", "created_at": "2024-01-02T00:00:00Z"},
                {"role": "client", "content": "undated"},
            ]
        }));
        let latest = doc.latest_client_message().expect("no client message");
        assert_eq!(latest.get("content").and_then(Value::as_str), Some("new"));
        assert_eq!(
            doc.latest_message()
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str),
            Some("undated")
        );
    }

    #[test]
    fn fingerprint_tracks_raw_rendering() {
        let a = document(json!({"chat_id": 1, "messages": [{"content": "m1"}]}));
        let b = document(json!({"chat_id": 1, "messages": [{"content": "m1"}]}));
        let c = document(json!({"chat_id": 1, "messages": [{"content": "m2"}]}));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(document(json!({})).fingerprint(), "null");
    }

    #[test]
    fn filter_matches_by_key_or_document() {
        let filter = ChangeFilter::new(HashSet::from([42]));
        let matching = ChangeEvent {
            operation: OperationKind::Update,
            key: Some(42),
            document: None,
        };
        let by_document = ChangeEvent {
            operation: OperationKind::Insert,
            key: None,
            document: Some(ChatDocument::with_messages(42, Vec::new())),
        };
        let other = ChangeEvent {
            operation: OperationKind::Update,
            key: Some(99),
            document: None,
        };
        assert!(filter.matches(&matching));
        assert!(filter.matches(&by_document));
        assert!(!filter.matches(&other));
    }

    #[test]
    fn empty_filter_matches_nothing() {
        let filter = ChangeFilter::default();
        assert!(filter.is_empty());
        let event = ChangeEvent {
            operation: OperationKind::Update,
            key: Some(42),
            document: None,
        };
        assert!(!filter.matches(&event));
    }
}
