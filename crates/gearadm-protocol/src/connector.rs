//! Connection acquisition with bounded retry.
//!
//! The [`Dialer`] trait is the transport seam: production code dials TCP,
//! while tests substitute scripted failures to observe the retry loop.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::cancel::{CANCEL_CHECK_INTERVAL, CancellationToken};
use crate::channel::AdminStream;
use crate::endpoint::Endpoint;
use crate::error::{ConfigurationError, ConnectError};

/// Attempts made per endpoint unless configured otherwise.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Upper bound for a single connection attempt unless configured otherwise.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens stream connections to job servers.
pub trait Dialer: Send + Sync {
    /// Connection type produced by this dialer.
    type Stream: AdminStream;

    /// Makes one connection attempt bounded by `timeout`.
    ///
    /// Implementations that block should give up promptly once `cancel`
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns the transport error reported by the attempt, or an
    /// [`io::ErrorKind::Interrupted`] error when cancelled.
    fn dial(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> io::Result<Self::Stream>;
}

/// Dials job servers over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    /// Resolves and connects on a helper thread that is abandoned once
    /// `cancel` fires.
    fn dial(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> io::Result<TcpStream> {
        let host = endpoint.host().to_owned();
        let port = endpoint.port();
        interruptible(cancel, move || connect_any(&host, port, timeout))
    }
}

fn connect_any(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for address in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses")
    }))
}

/// Runs blocking `work` on a helper thread and waits for it, checking
/// `cancel` every [`CANCEL_CHECK_INTERVAL`].
///
/// On cancellation the helper is abandoned and finishes in the background;
/// its result is discarded.
pub(crate) fn interruptible<T, F>(cancel: &CancellationToken, work: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(String::from("gearadm-dial"))
        .spawn(move || drop(sender.send(work())))?;

    loop {
        if cancel.is_cancelled() {
            return Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "connection attempt cancelled",
            ));
        }
        match receiver.recv_timeout(CANCEL_CHECK_INTERVAL) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::other("connection attempt ended without a result"));
            }
        }
    }
}

/// How hard to try before declaring an endpoint unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    max_attempts: u32,
    connect_timeout: Duration,
    retry_delay: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_delay: Duration::ZERO,
        }
    }
}

impl ConnectPolicy {
    /// Builds a policy making at most `max_attempts` attempts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroAttempts`] when `max_attempts` is 0.
    pub fn new(max_attempts: u32) -> Result<Self, ConfigurationError> {
        if max_attempts == 0 {
            return Err(ConfigurationError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            ..Self::default()
        })
    }

    /// Sets the upper bound for each attempt.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Sets the pause between failed attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound for each attempt.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Pause between failed attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}

/// Connects to `endpoint`, retrying transport failures up to the policy limit.
///
/// Attempts run sequentially. Failures are logged and swallowed until the
/// final attempt, whose error is reported in [`ConnectError::Unreachable`].
///
/// # Errors
///
/// Returns [`ConnectError::Unreachable`] after `max_attempts` failures, or
/// [`ConnectError::Cancelled`] when `cancel` fires before or during an
/// attempt, or during a retry delay.
pub fn connect<D>(
    dialer: &D,
    endpoint: &Endpoint,
    policy: &ConnectPolicy,
    cancel: &CancellationToken,
) -> Result<D::Stream, ConnectError>
where
    D: Dialer + ?Sized,
{
    let cancelled = || ConnectError::Cancelled {
        endpoint: endpoint.to_string(),
    };
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        match dialer.dial(endpoint, policy.connect_timeout, cancel) {
            Ok(stream) => {
                debug!(%endpoint, attempt, "connected to job server");
                return Ok(stream);
            }
            Err(_) if cancel.is_cancelled() => return Err(cancelled()),
            Err(error) => {
                debug!(
                    %endpoint,
                    attempt,
                    max_attempts = policy.max_attempts,
                    %error,
                    "connection attempt failed"
                );
                last_error = Some(error);
            }
        }
        if attempt < policy.max_attempts
            && !policy.retry_delay.is_zero()
            && !cancel.sleep(policy.retry_delay)
        {
            return Err(cancelled());
        }
    }

    Err(ConnectError::Unreachable {
        endpoint: endpoint.to_string(),
        attempts: policy.max_attempts,
        source: last_error.unwrap_or_else(|| io::Error::other("no connection attempt was made")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Instant;

    use mockall::mock;
    use rstest::{fixture, rstest};

    mock! {
        pub Dialer {}
        impl Dialer for Dialer {
            type Stream = TcpStream;
            fn dial(
                &self,
                endpoint: &Endpoint,
                timeout: Duration,
                cancel: &CancellationToken,
            ) -> io::Result<TcpStream>;
        }
    }

    #[fixture]
    fn endpoint() -> Endpoint {
        Endpoint::parse("gearman1:4730").expect("endpoint")
    }

    fn refused() -> io::Error {
        io::Error::from(io::ErrorKind::ConnectionRefused)
    }

    #[rstest]
    #[case::single_attempt(1)]
    #[case::default_attempts(3)]
    #[case::many_attempts(5)]
    fn succeeds_on_final_attempt(endpoint: Endpoint, #[case] max_attempts: u32) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let address = listener.local_addr().expect("local addr");
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let mut dialer = MockDialer::new();
        dialer
            .expect_dial()
            .times(usize::try_from(max_attempts).expect("attempts fit usize"))
            .returning(move |_, _, _| {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < max_attempts {
                    Err(refused())
                } else {
                    TcpStream::connect(address)
                }
            });

        let policy = ConnectPolicy::new(max_attempts).expect("policy");
        let stream = connect(&dialer, &endpoint, &policy, &CancellationToken::new())
            .expect("final attempt should connect");
        assert_eq!(stream.peer_addr().expect("peer addr"), address);
        assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
    }

    #[rstest]
    #[case::single_attempt(1)]
    #[case::default_attempts(3)]
    #[case::many_attempts(4)]
    fn gives_up_after_exactly_max_attempts(endpoint: Endpoint, #[case] max_attempts: u32) {
        let mut dialer = MockDialer::new();
        dialer
            .expect_dial()
            .times(usize::try_from(max_attempts).expect("attempts fit usize"))
            .returning(|_, _, _| Err(refused()));

        let policy = ConnectPolicy::new(max_attempts).expect("policy");
        let error = connect(&dialer, &endpoint, &policy, &CancellationToken::new())
            .expect_err("every attempt fails");
        match error {
            ConnectError::Unreachable {
                endpoint: key,
                attempts,
                source,
            } => {
                assert_eq!(key, "gearman1:4730");
                assert_eq!(attempts, max_attempts);
                assert_eq!(source.kind(), io::ErrorKind::ConnectionRefused);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn passes_connect_timeout_to_dialer(endpoint: Endpoint) {
        let mut dialer = MockDialer::new();
        dialer
            .expect_dial()
            .withf(|_, timeout, _| *timeout == Duration::from_millis(250))
            .times(1)
            .returning(|_, _, _| Err(refused()));

        let policy = ConnectPolicy::new(1)
            .expect("policy")
            .with_connect_timeout(Duration::from_millis(250));
        let result = connect(&dialer, &endpoint, &policy, &CancellationToken::new());
        assert!(result.is_err());
    }

    #[rstest]
    fn cancelled_token_prevents_attempts(endpoint: Endpoint) {
        let mut dialer = MockDialer::new();
        dialer.expect_dial().never();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let error = connect(&dialer, &endpoint, &ConnectPolicy::default(), &cancel)
            .expect_err("cancelled before dialling");
        assert!(matches!(error, ConnectError::Cancelled { .. }));
    }

    #[rstest]
    fn cancellation_interrupts_retry_delay(endpoint: Endpoint) {
        let mut dialer = MockDialer::new();
        dialer.expect_dial().times(1).returning(|_, _, _| Err(refused()));

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let policy = ConnectPolicy::new(3)
            .expect("policy")
            .with_retry_delay(Duration::from_secs(30));
        let started = Instant::now();
        let error = connect(&dialer, &endpoint, &policy, &cancel).expect_err("cancelled");
        assert!(matches!(error, ConnectError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().expect("canceller thread");
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(matches!(
            ConnectPolicy::new(0),
            Err(ConfigurationError::ZeroAttempts)
        ));
    }

    #[test]
    fn tcp_dialer_reports_refused_port() {
        let port = {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
            listener.local_addr().expect("local addr").port()
        };
        let endpoint = Endpoint::parse(&format!("127.0.0.1:{port}")).expect("endpoint");
        let result = TcpDialer.dial(
            &endpoint,
            Duration::from_secs(1),
            &CancellationToken::new(),
        );
        assert!(result.is_err(), "closed port should refuse connections");
    }

    /// Stands in for a peer that never answers the connection attempt.
    struct StallingDialer;

    impl Dialer for StallingDialer {
        type Stream = TcpStream;

        fn dial(
            &self,
            _endpoint: &Endpoint,
            _timeout: Duration,
            cancel: &CancellationToken,
        ) -> io::Result<TcpStream> {
            interruptible(cancel, || {
                thread::sleep(Duration::from_secs(30));
                Err(refused())
            })
        }
    }

    #[rstest]
    fn cancellation_interrupts_attempt_in_flight(endpoint: Endpoint) {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let policy = ConnectPolicy::new(3)
            .expect("policy")
            .with_connect_timeout(Duration::from_secs(30));
        let started = Instant::now();
        let error = connect(&StallingDialer, &endpoint, &policy, &cancel)
            .expect_err("cancelled during the attempt");

        assert!(matches!(error, ConnectError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
        handle.join().expect("canceller thread");
    }

    #[test]
    fn interruptible_returns_work_result() {
        let value = interruptible(&CancellationToken::new(), || Ok(7_u8)).expect("work result");
        assert_eq!(value, 7);
    }

    #[test]
    fn interruptible_reports_cancellation_as_interrupted() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let error = interruptible(&cancel, || {
            thread::sleep(Duration::from_secs(30));
            Ok(())
        })
        .expect_err("cancelled");
        assert_eq!(error.kind(), io::ErrorKind::Interrupted);
    }
}
