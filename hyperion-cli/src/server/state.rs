//! Shared state of the HTTP server

use hyperion_engine::{DocumentParameters, DocumentResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Where a submitted document stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Running,
    Finished(DocumentResult),
}

/// State shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Parameters every submitted document starts from
    pub parameters: Arc<DocumentParameters>,
    submissions: Arc<RwLock<HashMap<String, Submission>>>,
}

impl AppState {
    pub fn new(parameters: DocumentParameters) -> Self {
        Self {
            parameters: Arc::new(parameters),
            submissions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn insert(&self, id: &str, submission: Submission) {
        let mut map = self.submissions.write().unwrap_or_else(|e| e.into_inner());
        map.insert(id.to_string(), submission);
    }

    /// Look up a submission; a finished one is handed out only once
    pub fn take(&self, id: &str) -> Option<Submission> {
        let mut map = self.submissions.write().unwrap_or_else(|e| e.into_inner());
        match map.get(id).copied()? {
            Submission::Running => Some(Submission::Running),
            Submission::Finished(_) => map.remove(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_results_are_taken_once() {
        let state = AppState::new(DocumentParameters::default());
        state.insert("a", Submission::Running);
        assert_eq!(state.take("a"), Some(Submission::Running));
        assert_eq!(state.take("a"), Some(Submission::Running));

        let result = DocumentResult::failed();
        state.insert("a", Submission::Finished(result));
        assert_eq!(state.take("a"), Some(Submission::Finished(result)));
        assert_eq!(state.take("a"), None);
        assert_eq!(state.take("unknown"), None);
    }
}
