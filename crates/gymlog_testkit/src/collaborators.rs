//! Doubles for the conflict dialog, navigation and credentials.

use async_trait::async_trait;
use gymlog_model::{MergeConflict, Resolution, Resolutions};
use gymlog_sync::{ConflictResolver, CredentialProvider, Navigator, SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
enum Answer {
    Always(Resolution),
    Decline,
    Script(VecDeque<Option<Resolutions>>),
}

/// A conflict resolver with canned answers.
///
/// Every call is recorded so tests can inspect what the user was shown.
#[derive(Debug)]
pub struct ScriptedResolver {
    answer: Mutex<Answer>,
    calls: Mutex<Vec<Vec<MergeConflict>>>,
}

impl ScriptedResolver {
    fn with_answer(answer: Answer) -> Self {
        Self {
            answer: Mutex::new(answer),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Resolves every conflict the same way.
    pub fn always(resolution: Resolution) -> Self {
        Self::with_answer(Answer::Always(resolution))
    }

    /// Never decides.
    pub fn declining() -> Self {
        Self::with_answer(Answer::Decline)
    }

    /// Answers from a queue; declines once it runs dry.
    pub fn scripted(answers: impl IntoIterator<Item = Option<Resolutions>>) -> Self {
        Self::with_answer(Answer::Script(answers.into_iter().collect()))
    }

    /// Conflicts passed to each call so far.
    pub fn calls(&self) -> Vec<Vec<MergeConflict>> {
        self.calls.lock().clone()
    }

    /// Number of times the user was asked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ConflictResolver for ScriptedResolver {
    async fn resolve(&self, conflicts: &[MergeConflict]) -> Option<Resolutions> {
        self.calls.lock().push(conflicts.to_vec());
        match &mut *self.answer.lock() {
            Answer::Always(resolution) => Some(Resolutions::all(conflicts, *resolution)),
            Answer::Decline => None,
            Answer::Script(queue) => queue.pop_front().flatten(),
        }
    }
}

/// Counts login requests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    logins: AtomicUsize,
}

impl RecordingNavigator {
    /// A navigator that has not been asked yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// How often the login screen was requested.
    pub fn login_requests(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn require_login(&self) {
        self.logins.fetch_add(1, Ordering::SeqCst);
    }
}

/// A fixed access token that can be revoked.
#[derive(Debug)]
pub struct StaticCredentials {
    token: Mutex<Option<String>>,
}

impl StaticCredentials {
    /// Hands out `token` until logout.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    /// Has no token.
    pub fn logged_out() -> Self {
        Self {
            token: Mutex::new(None),
        }
    }

    /// Returns true while a token is held.
    pub fn is_logged_in(&self) -> bool {
        self.token.lock().is_some()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn access_token(&self) -> SyncResult<String> {
        self.token.lock().clone().ok_or(SyncError::Unauthenticated)
    }

    async fn logout(&self) -> SyncResult<()> {
        self.token.lock().take();
        Ok(())
    }
}
