use crate::index::MetadataFilter;

/// Sentinel for un-typed documents; never used as a search filter.
pub const UNKNOWN_DOCUMENT_TYPE: &str = "unknown";

pub(crate) const USER_ID_KEY: &str = "user_id";
pub(crate) const SESSION_ID_KEY: &str = "session_id";
pub(crate) const DOCUMENT_ID_KEY: &str = "document_id";
pub(crate) const CHUNK_ID_KEY: &str = "chunk_id";
pub(crate) const DOCUMENT_TYPE_KEY: &str = "document_type";
pub(crate) const TEXT_KEY: &str = "text";
pub(crate) const FILENAME_KEY: &str = "filename";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeNarrowing {
    User,
    Session(String),
    Document(String),
}

/// Effective tenant boundary of a search.
///
/// `document_id` wins over `session_id`; with neither the scope is the
/// whole user partition. `user_id` is always part of the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationScope {
    user_id: String,
    narrowing: ScopeNarrowing,
    document_type: Option<String>,
}

impl IsolationScope {
    pub fn resolve(
        user_id: &str,
        session_id: Option<&str>,
        document_id: Option<&str>,
        document_type: Option<&str>,
    ) -> Self {
        let narrowing = match (present(document_id), present(session_id)) {
            (Some(document_id), _) => ScopeNarrowing::Document(document_id.to_string()),
            (None, Some(session_id)) => ScopeNarrowing::Session(session_id.to_string()),
            (None, None) => ScopeNarrowing::User,
        };
        let document_type = present(document_type)
            .filter(|t| *t != UNKNOWN_DOCUMENT_TYPE)
            .map(str::to_string);

        Self {
            user_id: user_id.to_string(),
            narrowing,
            document_type,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn narrowing(&self) -> &ScopeNarrowing {
        &self.narrowing
    }

    pub fn document_type(&self) -> Option<&str> {
        self.document_type.as_deref()
    }

    pub fn filter(&self) -> MetadataFilter {
        let filter = MetadataFilter::new().eq(USER_ID_KEY, self.user_id.as_str());
        let filter = match &self.narrowing {
            ScopeNarrowing::User => filter,
            ScopeNarrowing::Session(session_id) => filter.eq(SESSION_ID_KEY, session_id.as_str()),
            ScopeNarrowing::Document(document_id) => {
                filter.eq(DOCUMENT_ID_KEY, document_id.as_str())
            }
        };
        match &self.document_type {
            Some(document_type) => filter.eq(DOCUMENT_TYPE_KEY, document_type.as_str()),
            None => filter,
        }
    }
}

/// Id of a stored chunk vector.
///
/// Prefixed with the session when there is one, else the user. A chunk
/// stored under a session is therefore not addressable by the user-only id.
pub fn vector_id(user_id: &str, session_id: Option<&str>, document_id: &str, chunk_id: u32) -> String {
    let prefix = present(session_id).unwrap_or(user_id);
    format!("{}_{}_{}", prefix, document_id, chunk_id)
}

pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
