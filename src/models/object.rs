use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One bucket object as seen by a single listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Backend path. May use a URL-encoded separator (`uploads%2Fname`).
    pub path: String,
    /// Plain object key, e.g. `uploads/name.png`.
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub public_url: String,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>, updated_at: DateTime<Utc>, public_url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            updated_at,
            public_url: public_url.into(),
        }
    }

    /// True when this entry is the placeholder object some backends return
    /// for the prefix itself.
    pub fn is_prefix_marker(&self, prefix: &str) -> bool {
        let bare = prefix.trim_end_matches('/');
        self.name == prefix || self.name == bare || self.name == format!("{}/", bare)
    }
}
