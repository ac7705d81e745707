//! Process-lifetime bookkeeping of uploaded documents and sessions.
//!
//! Vectors live in the index; this registry only tracks what was uploaded,
//! by which tenant and session, and the chunk text needed to (re-)embed a
//! document. Every lookup is scoped to the caller's tenant: a record owned by
//! someone else is reported as absent.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::ProcessedDocument;
use crate::retrieval::ChunkRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub user_id: String,
    pub filename: String,
    pub file_type: String,
    pub document_type: String,
    pub total_chunks: usize,
    pub upload_time: DateTime<Utc>,
    pub session_id: Option<String>,
}

type SessionKey = (String, String);

fn session_key(user_id: &str, session_id: &str) -> SessionKey {
    (user_id.to_string(), session_id.to_string())
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<SessionKey, SessionRecord>,
    documents: HashMap<String, DocumentRecord>,
    chunks: HashMap<String, Vec<ChunkRecord>>,
}

impl RegistryInner {
    fn owned_document(&self, user_id: &str, document_id: &str) -> Option<&DocumentRecord> {
        self.documents
            .get(document_id)
            .filter(|doc| doc.user_id == user_id)
    }
}

/// Shared handle; clones see the same registry.
#[derive(Clone, Default)]
pub struct DocumentRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a tenant's session. Replacing drops its document list.
    pub fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
        description: Option<String>,
    ) -> SessionRecord {
        let record = SessionRecord {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            description,
            created_at: Utc::now(),
            documents: Vec::new(),
        };
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if guard
            .sessions
            .insert(session_key(user_id, session_id), record.clone())
            .is_some()
        {
            tracing::debug!("Session {} of {} replaced", session_id, user_id);
        }
        record
    }

    pub fn get_session(&self, user_id: &str, session_id: &str) -> Option<SessionRecord> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard
            .sessions
            .get(&session_key(user_id, session_id))
            .cloned()
    }

    pub fn list_sessions(&self, user_id: &str) -> Vec<SessionRecord> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut sessions: Vec<_> = guard
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    /// Remove a session record. Its documents stay registered.
    pub fn remove_session(&self, user_id: &str, session_id: &str) -> Option<SessionRecord> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.sessions.remove(&session_key(user_id, session_id))
    }

    /// Total sessions across tenants, for health reporting.
    pub fn session_count(&self) -> usize {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.sessions.len()
    }

    /// Total documents across tenants, for health reporting.
    pub fn document_count(&self) -> usize {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.documents.len()
    }

    pub fn register_document(
        &self,
        document: &ProcessedDocument,
        user_id: &str,
        session_id: Option<&str>,
    ) -> DocumentRecord {
        let session_id = session_id
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        let record = DocumentRecord {
            document_id: document.document_id.clone(),
            user_id: user_id.to_string(),
            filename: document.filename.clone(),
            file_type: document.file_type.clone(),
            document_type: document.document_type.clone(),
            total_chunks: document.chunks.len(),
            upload_time: document.upload_time,
            session_id: session_id.clone(),
        };

        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard
            .documents
            .insert(record.document_id.clone(), record.clone());
        guard
            .chunks
            .insert(record.document_id.clone(), document.chunks.clone());
        if let Some(session) = session_id
            .as_deref()
            .and_then(|id| guard.sessions.get_mut(&session_key(user_id, id)))
        {
            if !session.documents.contains(&record.document_id) {
                session.documents.push(record.document_id.clone());
            }
        }
        record
    }

    pub fn get_document(&self, user_id: &str, document_id: &str) -> Option<DocumentRecord> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.owned_document(user_id, document_id).cloned()
    }

    pub fn document_chunks(&self, user_id: &str, document_id: &str) -> Option<Vec<ChunkRecord>> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.owned_document(user_id, document_id)?;
        guard.chunks.get(document_id).cloned()
    }

    /// A tenant's documents ordered by upload time, optionally limited to one session.
    pub fn list_documents(&self, user_id: &str, session_id: Option<&str>) -> Vec<DocumentRecord> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut documents: Vec<_> = guard
            .documents
            .values()
            .filter(|doc| doc.user_id == user_id)
            .filter(|doc| session_id.map_or(true, |s| doc.session_id.as_deref() == Some(s)))
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.upload_time.cmp(&b.upload_time));
        documents
    }

    pub fn remove_document(&self, user_id: &str, document_id: &str) -> Option<DocumentRecord> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.owned_document(user_id, document_id)?;
        let record = guard.documents.remove(document_id)?;
        guard.chunks.remove(document_id);
        if let Some(session) = record
            .session_id
            .as_deref()
            .and_then(|id| guard.sessions.get_mut(&session_key(user_id, id)))
        {
            session.documents.retain(|id| id != document_id);
        }
        Some(record)
    }
}
