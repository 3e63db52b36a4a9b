//! Fake job server for tests.
//!
//! Spawns a TCP listener on an ephemeral port that records each command line
//! it receives and answers with a scripted reply, optionally fragmented or
//! left unterminated.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

const ACCEPT_DEADLINE: Duration = Duration::from_secs(5);
const HOLD_OPEN_LIMIT: Duration = Duration::from_secs(5);

/// How the fake server answers each connection.
#[derive(Debug, Clone)]
pub struct ServerScript {
    chunks: Vec<String>,
    chunk_delay: Duration,
    hold_open: bool,
}

impl ServerScript {
    /// Answers with `text` in a single write.
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            chunks: vec![text.into()],
            chunk_delay: Duration::ZERO,
            hold_open: false,
        }
    }

    /// Answers with each chunk in a separate write.
    #[must_use]
    pub fn fragmented<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            chunk_delay: Duration::from_millis(10),
            hold_open: false,
        }
    }

    /// Keeps the connection open after writing until the client disconnects.
    #[must_use]
    pub const fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// A scripted job server listening on `127.0.0.1`.
pub struct FakeJobServer {
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
    handle: Option<thread::JoinHandle<io::Result<()>>>,
}

impl FakeJobServer {
    /// Spawns a server that answers one connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot be bound.
    pub fn spawn(script: ServerScript) -> io::Result<Self> {
        Self::spawn_for(script, 1)
    }

    /// Spawns a server that answers up to `connections` connections.
    ///
    /// The server stops early when no client connects within five seconds.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot be bound.
    pub fn spawn_for(script: ServerScript, connections: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();
        let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let handle = thread::spawn(move || serve(&listener, &script, connections, &recorded));
        Ok(Self {
            port,
            requests,
            handle: Some(handle),
        })
    }

    /// The server's `host:port` endpoint text.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Waits for the server to finish and returns the command lines it received.
    ///
    /// # Errors
    ///
    /// Returns an error when the server thread failed or panicked.
    pub fn take_requests(&mut self) -> io::Result<Vec<String>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| io::Error::other("fake job server thread panicked"))??;
        }
        let requests = self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(requests.clone())
    }
}

impl Drop for FakeJobServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            drop(handle.join());
        }
    }
}

/// Returns an endpoint on a port with no listener behind it.
///
/// # Errors
///
/// Returns an error when no ephemeral port can be reserved.
pub fn closed_endpoint() -> io::Result<String> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(format!("127.0.0.1:{port}"))
}

fn serve(
    listener: &TcpListener,
    script: &ServerScript,
    connections: usize,
    requests: &Mutex<Vec<String>>,
) -> io::Result<()> {
    let mut served = 0;
    let mut deadline = Instant::now() + ACCEPT_DEADLINE;
    while served < connections {
        match listener.accept() {
            Ok((stream, _)) => {
                answer(stream, script, requests)?;
                served += 1;
                deadline = Instant::now() + ACCEPT_DEADLINE;
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(error) => return Err(error),
        }
    }
    Ok(())
}

fn answer(
    mut stream: TcpStream,
    script: &ServerScript,
    requests: &Mutex<Vec<String>>,
) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    let mut line = String::new();
    BufReader::new(stream.try_clone()?).read_line(&mut line)?;
    requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(line);

    for (index, chunk) in script.chunks.iter().enumerate() {
        if index > 0 && !script.chunk_delay.is_zero() {
            thread::sleep(script.chunk_delay);
        }
        stream.write_all(chunk.as_bytes())?;
        stream.flush()?;
    }

    if script.hold_open {
        stream.set_read_timeout(Some(HOLD_OPEN_LIMIT))?;
        let mut sink = [0_u8; 64];
        while matches!(stream.read(&mut sink), Ok(read) if read > 0) {}
    }
    Ok(())
}
