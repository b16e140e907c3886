use std::ops::{Deref, DerefMut};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BrowserEngine, BrowserError, BrowserSession};

/// Owns one browser session for the duration of a request.
///
/// Two release paths:
/// 1. `release().await` - the normal path, called once the protected work
///    has finished whether it succeeded or not.
/// 2. `Drop` - if the guard is dropped unreleased (panic, client hung up and
///    the handler future was cancelled) the close is spawned onto the
///    runtime captured at acquisition.
///
/// Both paths take the session out of the guard, so it is closed exactly once.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
    id: Uuid,
    runtime: tokio::runtime::Handle,
}

impl SessionGuard {
    pub async fn acquire(engine: &dyn BrowserEngine) -> Result<Self, BrowserError> {
        let id = Uuid::new_v4();
        let session = engine.launch().await.map_err(|e| {
            warn!(session_id = %id, "browser launch failed: {e}");
            e
        })?;
        info!(session_id = %id, "browser session launched");

        Ok(Self {
            session: Some(session),
            id,
            runtime: tokio::runtime::Handle::current(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Closes the session, consuming the guard. Close failures are logged
    /// and otherwise ignored; the request outcome is already decided.
    pub async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            match session.close().await {
                Ok(()) => info!(session_id = %self.id, "browser session closed"),
                Err(e) => warn!(session_id = %self.id, "browser session close failed: {e}"),
            }
        }
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        self.session
            .as_deref()
            .expect("SessionGuard: session already released")
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
            .as_deref_mut()
            .expect("SessionGuard: session already released")
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            let id = self.id;
            warn!(session_id = %id, "browser session dropped without release, closing in background");
            self.runtime.spawn(async move {
                match session.close().await {
                    Ok(()) => debug!(session_id = %id, "background close succeeded"),
                    Err(e) => warn!(session_id = %id, "background close failed: {e}"),
                }
            });
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Behavior, FakeEngine};
    use super::*;

    #[tokio::test]
    async fn test_release_closes_once() {
        let engine = FakeEngine::new(Behavior::Succeed);
        let guard = SessionGuard::acquire(&engine).await.unwrap();
        guard.release().await;
        assert_eq!(engine.counters.launches(), 1);
        assert_eq!(engine.counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_drop_without_release_closes_in_background() {
        let engine = FakeEngine::new(Behavior::Succeed);
        let guard = SessionGuard::acquire(&engine).await.unwrap();
        drop(guard);
        // let the spawned close run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_release_after_failed_work() {
        let engine = FakeEngine::new(Behavior::Fail(|| BrowserError::Protocol("boom".into())));
        let mut guard = SessionGuard::acquire(&engine).await.unwrap();
        assert!(guard.render_pdf("<p>x</p>").await.is_err());
        guard.release().await;
        assert_eq!(engine.counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_propagates() {
        let engine = FakeEngine::new(Behavior::Succeed).failing_launch();
        let err = SessionGuard::acquire(&engine).await.err().unwrap();
        assert!(matches!(err, BrowserError::Launch(_)));
        assert_eq!(engine.counters.closes(), 0);
    }
}
