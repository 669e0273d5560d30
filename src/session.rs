use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backends::{OracleBackend, OracleSession};
use crate::error::PaletteError;
use crate::pipeline::Mode;

/// Who decides when the browser process goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessPolicy {
    /// Keep the process alive across requests; only contexts are per request.
    KeepWarm,
    /// Tear the process down after every request.
    PerRequest,
}

impl ProcessPolicy {
    pub fn from_keep_warm(keep_warm: bool) -> Self {
        if keep_warm {
            ProcessPolicy::KeepWarm
        } else {
            ProcessPolicy::PerRequest
        }
    }
}

/// An isolated browsing context bound to one mode.
pub struct Session {
    mode: Mode,
    oracle: Box<dyn OracleSession>,
    _open: OpenGuard,
}

impl Session {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn oracle(&mut self) -> &mut dyn OracleSession {
        self.oracle.as_mut()
    }
}

/// Counts a session as open until dropped, whichever path drops it.
struct OpenGuard(Arc<AtomicUsize>);

impl OpenGuard {
    fn new(open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self(open.clone())
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns the oracle backend and hands out one session per mode.
pub struct SessionManager {
    backend: Arc<dyn OracleBackend>,
    policy: ProcessPolicy,
    navigation_timeout: Duration,
    open: Arc<AtomicUsize>,
    shut_down: AtomicBool,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn OracleBackend>,
        policy: ProcessPolicy,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            policy,
            navigation_timeout,
            open: Arc::new(AtomicUsize::new(0)),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> ProcessPolicy {
        self.policy
    }

    /// Sessions acquired and not yet released or dropped.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Open a fresh context for `mode` and wait for the oracle page to load.
    pub async fn acquire(&self, mode: Mode) -> Result<Session, PaletteError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(PaletteError::SessionUnavailable {
                mode,
                reason: "session manager is shut down".to_string(),
            });
        }

        let opened = tokio::time::timeout(self.navigation_timeout, self.backend.open_session(mode))
            .await
            .map_err(|_| PaletteError::SessionUnavailable {
                mode,
                reason: format!("navigation timed out after {:?}", self.navigation_timeout),
            })?
            .map_err(|err| PaletteError::SessionUnavailable {
                mode,
                reason: format!("{err:#}"),
            })?;

        tracing::debug!(%mode, backend = self.backend.name(), "session acquired");
        Ok(Session {
            mode,
            oracle: opened,
            _open: OpenGuard::new(&self.open),
        })
    }

    /// Close the session's context. Failures are logged, never returned.
    pub async fn release(&self, session: Session) {
        let Session {
            mode,
            oracle,
            _open: open,
        } = session;
        match tokio::time::timeout(self.navigation_timeout, oracle.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%mode, error = %err, "failed to close session"),
            Err(_) => tracing::warn!(
                %mode,
                timeout = ?self.navigation_timeout,
                "session close timed out, abandoning it"
            ),
        }
        drop(open);
        tracing::debug!(%mode, "session released");
    }

    /// End-of-request hook: stop the browser unless it is kept warm.
    pub async fn finish_request(&self) {
        if self.policy == ProcessPolicy::PerRequest {
            self.stop_backend().await;
        }
    }

    async fn stop_backend(&self) {
        match tokio::time::timeout(self.navigation_timeout, self.backend.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "failed to stop browser"),
            Err(_) => tracing::warn!(timeout = ?self.navigation_timeout, "browser stop timed out"),
        }
    }

    /// Close everything. Idempotent.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_backend().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::scripted::{OracleScript, ScriptedBackend};

    fn manager_with(script: OracleScript, policy: ProcessPolicy) -> (Arc<ScriptedBackend>, SessionManager) {
        let backend = Arc::new(ScriptedBackend::new(script));
        let dyn_backend: Arc<dyn OracleBackend> = backend.clone();
        let manager = SessionManager::new(dyn_backend, policy, Duration::from_secs(30));
        (backend, manager)
    }

    #[test]
    fn policy_from_flag() {
        assert_eq!(ProcessPolicy::from_keep_warm(true), ProcessPolicy::KeepWarm);
        assert_eq!(ProcessPolicy::from_keep_warm(false), ProcessPolicy::PerRequest);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_and_release_are_counted() {
        let (backend, manager) = manager_with(OracleScript::default(), ProcessPolicy::KeepWarm);
        let light = manager.acquire(Mode::Light).await.unwrap();
        let dark = manager.acquire(Mode::Dark).await.unwrap();
        assert_eq!(light.mode(), Mode::Light);
        assert_eq!(manager.open_sessions(), 2);

        manager.release(light).await;
        assert_eq!(manager.open_sessions(), 1);
        drop(dark);
        assert_eq!(manager.open_sessions(), 0);

        let record = backend.record();
        assert_eq!(record.closed, vec![Mode::Light]);
        assert_eq!(record.live, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_is_session_unavailable() {
        let mut script = OracleScript::default();
        script.dark.unavailable = true;
        let (_backend, manager) = manager_with(script, ProcessPolicy::KeepWarm);

        let err = manager.acquire(Mode::Dark).await.err().unwrap();
        assert!(matches!(err, PaletteError::SessionUnavailable { mode: Mode::Dark, .. }));
        assert_eq!(manager.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_navigation_times_out() {
        let script = OracleScript {
            open_delay: Duration::from_secs(60),
            ..OracleScript::default()
        };
        let (_backend, manager) = manager_with(script, ProcessPolicy::KeepWarm);

        let err = manager.acquire(Mode::Light).await.err().unwrap();
        assert!(err.to_string().contains("navigation timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_close_is_abandoned_after_timeout() {
        let mut script = OracleScript::default();
        script.light.hung_close = true;
        let (backend, manager) = manager_with(script, ProcessPolicy::KeepWarm);

        let session = manager.acquire(Mode::Light).await.unwrap();
        let started = tokio::time::Instant::now();
        manager.release(session).await;

        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(31));
        assert_eq!(manager.open_sessions(), 0);
        let record = backend.record();
        assert!(record.closed.is_empty());
        assert_eq!(record.live, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn finish_request_follows_policy() {
        let (warm, manager) = manager_with(OracleScript::default(), ProcessPolicy::KeepWarm);
        manager.finish_request().await;
        assert_eq!(warm.record().shutdowns, 0);

        let (cold, manager) = manager_with(OracleScript::default(), ProcessPolicy::PerRequest);
        manager.finish_request().await;
        assert_eq!(cold.record().shutdowns, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_idempotent_and_final() {
        let (backend, manager) = manager_with(OracleScript::default(), ProcessPolicy::KeepWarm);
        manager.shutdown().await;
        manager.shutdown().await;
        assert_eq!(backend.record().shutdowns, 1);
        assert!(manager.acquire(Mode::Light).await.is_err());
    }
}
