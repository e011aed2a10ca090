//! Resume-or-start-fresh decision.
//!
//! The most recently used session is resumed automatically when it was
//! touched within the auto-resume window. Otherwise the caller's
//! [`SessionChooser`] picks one of the candidates, a new session, or
//! cancels (which also means a new session).

use super::{Session, SessionStore};

/// What a chooser decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChoice {
    Resume(String),
    New,
    Cancel,
}

/// Pluggable session selection, called only when there is something to choose from.
pub trait SessionChooser: Send + Sync {
    fn choose(&self, candidates: &[Session]) -> SessionChoice;
}

impl<F> SessionChooser for F
where
    F: Fn(&[Session]) -> SessionChoice + Send + Sync,
{
    fn choose(&self, candidates: &[Session]) -> SessionChoice {
        self(candidates)
    }
}

/// Never resume.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysNew;

impl SessionChooser for AlwaysNew {
    fn choose(&self, _candidates: &[Session]) -> SessionChoice {
        SessionChoice::New
    }
}

/// Resume whatever was used last, however old.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeLatest;

impl SessionChooser for ResumeLatest {
    fn choose(&self, candidates: &[Session]) -> SessionChoice {
        candidates
            .first()
            .map(|s| SessionChoice::Resume(s.session_id.clone()))
            .unwrap_or(SessionChoice::New)
    }
}

/// Outcome of [`plan_session`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPlan {
    /// Loaded and active in the store
    Resume(Session),
    /// Caller should create a session from a fresh catalog listing
    Fresh,
}

/// Decide between resuming and starting fresh.
pub fn plan_session(
    store: &SessionStore,
    auto_resume_hours: f64,
    chooser: &dyn SessionChooser,
) -> SessionPlan {
    let sessions = store.list_sessions();
    let Some(latest) = sessions.first() else {
        return SessionPlan::Fresh;
    };

    if latest.last_used_hours() < auto_resume_hours {
        if let Some(session) = store.load_session(&latest.session_id) {
            tracing::info!(target: "session", "Auto-resuming {}", session.summary());
            return SessionPlan::Resume(session);
        }
    }

    match chooser.choose(&sessions) {
        SessionChoice::Resume(id) => match store.load_session(&id) {
            Some(session) => {
                tracing::info!(target: "session", "Resuming {}", session.summary());
                SessionPlan::Resume(session)
            }
            None => {
                tracing::warn!(target: "session", id = %id, "Selected session could not be loaded, starting fresh");
                SessionPlan::Fresh
            }
        },
        SessionChoice::New | SessionChoice::Cancel => SessionPlan::Fresh,
    }
}
