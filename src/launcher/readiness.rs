//! Readiness polling for the freshly launched server.
//!
//! A poll is one TCP connect attempt. A refused or timed-out connect is the
//! normal state while weights load; the only way out besides success is the
//! launcher process exiting, after which a connection can never be made.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

use super::errors::LauncherError;
use super::lifecycle::{LauncherHandle, ProcessStatus};

/// Log a progress line every this many unsuccessful polls.
const PROGRESS_LOG_EVERY: u64 = 30;

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Waiting,
    Ready,
    Failed { exit_code: Option<i32> },
}

/// How to poll.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPolicy {
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    /// `None` polls until success or process exit.
    pub timeout: Option<Duration>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
            timeout: None,
        }
    }
}

// ─── Seams ───────────────────────────────────────────────────────────────────

/// Something that can be checked for reachability.
pub trait Probe {
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// Something that can report whether the launched process is still alive.
pub trait ProcessMonitor {
    fn status(&mut self) -> Result<ProcessStatus, LauncherError>;
}

impl ProcessMonitor for LauncherHandle {
    fn status(&mut self) -> Result<ProcessStatus, LauncherError> {
        LauncherHandle::status(self)
    }
}

/// TCP connect probe against `host:port`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
        }
    }
}

impl Probe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::trace!(host = %self.host, port = self.port, error = %e, "connect failed");
                false
            }
            Err(_) => {
                tracing::trace!(host = %self.host, port = self.port, "connect timed out");
                false
            }
        }
    }
}

// ─── Polling ─────────────────────────────────────────────────────────────────

/// One poll: connect, and if that fails, check whether the process exited.
pub async fn poll_once<P, M>(probe: &P, monitor: &mut M) -> Result<ReadinessState, LauncherError>
where
    P: Probe,
    M: ProcessMonitor,
{
    if probe.is_reachable().await {
        return Ok(ReadinessState::Ready);
    }

    match monitor.status()? {
        ProcessStatus::Running => Ok(ReadinessState::Waiting),
        ProcessStatus::Exited { code } => Ok(ReadinessState::Failed { exit_code: code }),
    }
}

/// Poll until reachable. Fails with `LaunchFailure` as soon as the process
/// exits, or with `ReadinessTimeout` if `policy.timeout` is set and elapses.
pub async fn wait_until_ready<P, M>(
    probe: &P,
    monitor: &mut M,
    policy: &ReadinessPolicy,
    target: (&str, u16),
) -> Result<(), LauncherError>
where
    P: Probe,
    M: ProcessMonitor,
{
    let started = Instant::now();
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        match poll_once(probe, monitor).await? {
            ReadinessState::Ready => {
                tracing::info!(
                    host = target.0,
                    port = target.1,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "webserver ready"
                );
                return Ok(());
            }
            ReadinessState::Failed { exit_code } => {
                tracing::error!(?exit_code, attempts, "launcher exited before becoming ready");
                return Err(LauncherError::LaunchFailure { exit_code });
            }
            ReadinessState::Waiting => {}
        }

        if let Some(limit) = policy.timeout {
            if started.elapsed() >= limit {
                return Err(LauncherError::ReadinessTimeout {
                    host: target.0.to_string(),
                    port: target.1,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
        }

        if attempts % PROGRESS_LOG_EVERY == 0 {
            tracing::info!(
                host = target.0,
                port = target.1,
                attempts,
                elapsed_secs = started.elapsed().as_secs(),
                "still waiting for webserver"
            );
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Block until the launched server accepts connections on `host:port`.
pub async fn await_ready(
    handle: &mut LauncherHandle,
    host: &str,
    port: u16,
    policy: &ReadinessPolicy,
) -> Result<(), LauncherError> {
    let probe = TcpProbe::new(host, port, policy.connect_timeout);
    wait_until_ready(&probe, handle, policy, (host, port)).await
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Probe that becomes reachable after `ready_after` attempts (never if `None`).
    struct CountingProbe {
        attempts: Arc<AtomicUsize>,
        ready_after: Option<usize>,
    }

    impl Probe for CountingProbe {
        async fn is_reachable(&self) -> bool {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            matches!(self.ready_after, Some(limit) if n >= limit)
        }
    }

    /// Monitor that reports exit after `exit_after` checks (never if `None`).
    struct ScriptedMonitor {
        checks: usize,
        exit_after: Option<(usize, Option<i32>)>,
    }

    impl ProcessMonitor for ScriptedMonitor {
        fn status(&mut self) -> Result<ProcessStatus, LauncherError> {
            self.checks += 1;
            match self.exit_after {
                Some((after, code)) if self.checks >= after => Ok(ProcessStatus::Exited { code }),
                _ => Ok(ProcessStatus::Running),
            }
        }
    }

    fn running() -> ScriptedMonitor {
        ScriptedMonitor {
            checks: 0,
            exit_after: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_polls_at_interval_indefinitely() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let probe = CountingProbe {
            attempts: attempts.clone(),
            ready_after: None,
        };
        let mut monitor = running();
        let policy = ReadinessPolicy::default();

        let k = 10;
        let result = tokio::time::timeout(
            Duration::from_secs(k),
            wait_until_ready(&probe, &mut monitor, &policy, ("127.0.0.1", 8000)),
        )
        .await;

        assert!(result.is_err(), "must not return while the server is unreachable");
        assert!(attempts.load(Ordering::SeqCst) >= k as usize);
        assert_eq!(monitor.checks, attempts.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_some_polls() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let probe = CountingProbe {
            attempts: attempts.clone(),
            ready_after: Some(4),
        };
        let mut monitor = running();
        let started = Instant::now();

        wait_until_ready(&probe, &mut monitor, &ReadinessPolicy::default(), ("h", 1))
            .await
            .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_stops_polling_with_exit_code() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let probe = CountingProbe {
            attempts: attempts.clone(),
            ready_after: None,
        };
        let mut monitor = ScriptedMonitor {
            checks: 0,
            exit_after: Some((3, Some(137))),
        };

        let err = wait_until_ready(&probe, &mut monitor, &ReadinessPolicy::default(), ("h", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::LaunchFailure { exit_code: Some(137) }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_timeout() {
        let probe = CountingProbe {
            attempts: Arc::new(AtomicUsize::new(0)),
            ready_after: None,
        };
        let mut monitor = running();
        let policy = ReadinessPolicy {
            timeout: Some(Duration::from_secs(5)),
            ..ReadinessPolicy::default()
        };

        let err = wait_until_ready(&probe, &mut monitor, &policy, ("h", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::ReadinessTimeout { waited_secs: 5, .. }));
    }

    #[tokio::test]
    async fn test_tcp_probe_reachable_on_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(1));
        assert!(probe.is_reachable().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_unreachable_on_closed_port() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(1));
        assert!(!probe.is_reachable().await);
    }

    /// Wraps a reachability check and counts its attempts.
    struct Counted<P> {
        inner: P,
        attempts: AtomicUsize,
    }

    impl<P: Probe + Sync> Probe for Counted<P> {
        async fn is_reachable(&self) -> bool {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.inner.is_reachable().await
        }
    }

    #[tokio::test]
    async fn test_listening_port_ready_on_first_attempt() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let check = Counted {
            inner: TcpProbe::new("127.0.0.1", port, Duration::from_secs(1)),
            attempts: AtomicUsize::new(0),
        };
        let mut monitor = running();
        let policy = ReadinessPolicy {
            timeout: Some(Duration::from_secs(5)),
            ..ReadinessPolicy::default()
        };

        wait_until_ready(&check, &mut monitor, &policy, ("127.0.0.1", port))
            .await
            .unwrap();

        assert_eq!(check.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.checks, 0, "process status is only consulted after a failed connect");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_await_ready_with_listening_port() {
        use super::super::lifecycle::LaunchCommand;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut handle = LauncherHandle::start(&LaunchCommand::new("sleep", ["30"])).unwrap();

        let policy = ReadinessPolicy {
            timeout: Some(Duration::from_secs(5)),
            ..ReadinessPolicy::default()
        };
        await_ready(&mut handle, "127.0.0.1", port, &policy).await.unwrap();
        handle.shutdown(Duration::from_secs(5)).await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_await_ready_launcher_exit_is_launch_failure() {
        use super::super::lifecycle::LaunchCommand;

        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut handle =
            LauncherHandle::start(&LaunchCommand::new("sh", ["-c", "exit 3"])).unwrap();

        let policy = ReadinessPolicy {
            poll_interval: Duration::from_millis(20),
            connect_timeout: Duration::from_millis(200),
            timeout: Some(Duration::from_secs(10)),
        };
        let err = await_ready(&mut handle, "127.0.0.1", port, &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::LaunchFailure { exit_code: Some(3) }));
    }
}
