//! Single-connection, tag-multiplexed request/response transport (spec §4.2).
//!
//! Modeled on the reactor pattern `hooteproto::client::HootClient` uses for
//! its ZMQ DEALER socket — one long-lived reader task, pending requests
//! tracked in a mutex-guarded map keyed by correlation id, completion
//! delivered through a single-shot channel — but the socket here is a plain
//! `tokio::net::TcpStream` split into owned halves rather than a ZMQ socket,
//! since LookinServer speaks raw length-prefixed TCP, not ZMTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::frame::{Frame, Header, HEADER_LEN};

/// Connection lifecycle (spec §3, "Connection state machine"). `Closed` and
/// `Failed` are terminal: a new connection requires a fresh `Transport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Ready,
    Closed,
    Failed,
}

type PendingMap = HashMap<u32, oneshot::Sender<Result<Frame, Error>>>;

struct Inner {
    state: Mutex<ConnectionState>,
    pending: Mutex<PendingMap>,
    tag_counter: AtomicU32,
    write_half: Mutex<Option<OwnedWriteHalf>>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    port: Mutex<Option<u16>>,
}

/// Owns one TCP socket to LookinServer and the reader task draining it.
///
/// Per spec §3: "at most one connection instance is in `Ready` at a time per
/// session" — a `Transport` enforces that for itself; the `Session` above it
/// enforces it doesn't hold two at once.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ConnectionState::Idle),
                pending: Mutex::new(HashMap::new()),
                // Tag 0 is reserved and never issued (spec §4.2).
                tag_counter: AtomicU32::new(1),
                write_half: Mutex::new(None),
                reader_handle: Mutex::new(None),
                port: Mutex::new(None),
            }),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.lock().await
    }

    pub async fn connected_port(&self) -> Option<u16> {
        *self.inner.port.lock().await
    }

    /// Connect to `127.0.0.1:port`. Fails with `AlreadyConnected` unless this
    /// instance is still `Idle`.
    pub async fn connect(&self, port: u16) -> Result<(), Error> {
        {
            let mut state = self.inner.state.lock().await;
            match *state {
                ConnectionState::Idle => *state = ConnectionState::Connecting,
                _ => return Err(Error::AlreadyConnected),
            }
        }

        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                let (read_half, write_half) = stream.into_split();
                *self.inner.write_half.lock().await = Some(write_half);
                *self.inner.port.lock().await = Some(port);

                let reader_inner = Arc::clone(&self.inner);
                let handle =
                    tokio::spawn(async move { Self::reader_loop(reader_inner, read_half).await });
                *self.inner.reader_handle.lock().await = Some(handle);
                *self.inner.state.lock().await = ConnectionState::Ready;
                tracing::info!(port, "connected to LookinServer");
                Ok(())
            }
            Err(err) => {
                *self.inner.state.lock().await = ConnectionState::Failed;
                Err(Error::ConnectionFailed(err.to_string()))
            }
        }
    }

    /// Tear the connection down. Idempotent: calling it on an already-closed
    /// or never-connected transport is a no-op.
    pub async fn disconnect(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if matches!(*state, ConnectionState::Closed | ConnectionState::Failed) {
                return;
            }
            *state = ConnectionState::Closed;
        }

        if let Some(handle) = self.inner.reader_handle.lock().await.take() {
            handle.abort();
        }
        self.inner.write_half.lock().await.take();
        Self::fail_all_pending(&self.inner, Error::NotConnected).await;
    }

    /// Send one request and await its matched response or a terminal
    /// outcome (spec §4.2: timeout, send failure, or teardown).
    pub async fn send_request(
        &self,
        request_type: u32,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Frame, Error> {
        {
            let state = self.inner.state.lock().await;
            if *state != ConnectionState::Ready {
                return Err(Error::NotConnected);
            }
        }

        let tag = self.next_tag();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(tag, tx);

        let frame = Frame::new(request_type, tag, payload);
        let bytes = frame.encode();

        {
            let mut guard = self.inner.write_half.lock().await;
            match guard.as_mut() {
                Some(writer) => {
                    if let Err(err) = writer.write_all(&bytes).await {
                        self.inner.pending.lock().await.remove(&tag);
                        return Err(Error::SendError(err.to_string()));
                    }
                }
                None => {
                    self.inner.pending.lock().await.remove(&tag);
                    return Err(Error::NotConnected);
                }
            }
        }

        tokio::select! {
            biased;
            res = rx => match res {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::NotConnected),
            },
            _ = tokio::time::sleep(timeout) => {
                // Whoever removes the tag from `pending` first owns the
                // outcome: if we win the race, the reader never will see
                // this tag again and we report Timeout ourselves. If we
                // lose (the reader already grabbed it), the response is
                // already on its way down `rx`.
                let removed = self.inner.pending.lock().await.remove(&tag);
                if removed.is_some() {
                    Err(Error::Timeout)
                } else {
                    rx_after_timeout_race(rx).await
                }
            }
        }
    }

    fn next_tag(&self) -> u32 {
        loop {
            let tag = self.inner.tag_counter.fetch_add(1, Ordering::Relaxed);
            if tag != 0 {
                return tag;
            }
        }
    }

    async fn reader_loop(inner: Arc<Inner>, mut read_half: OwnedReadHalf) {
        loop {
            let mut header_buf = [0u8; HEADER_LEN];
            if let Err(err) = read_half.read_exact(&mut header_buf).await {
                tracing::warn!(%err, "reader: header read failed, tearing down");
                Self::teardown_from_reader(&inner).await;
                return;
            }

            let header = match Header::decode(&header_buf) {
                Ok(h) => h,
                Err(err) => {
                    tracing::warn!(%err, "reader: malformed header, tearing down");
                    Self::teardown_from_reader(&inner).await;
                    return;
                }
            };

            let mut payload = vec![0u8; header.payload_size as usize];
            if header.payload_size > 0 {
                if let Err(err) = read_half.read_exact(&mut payload).await {
                    tracing::warn!(%err, "reader: payload read failed, tearing down");
                    Self::teardown_from_reader(&inner).await;
                    return;
                }
            }

            let tag = header.tag;
            let frame = Frame { header, payload };
            let maybe_tx = inner.pending.lock().await.remove(&tag);
            match maybe_tx {
                Some(tx) => {
                    let _ = tx.send(Ok(frame));
                }
                None => {
                    tracing::trace!(tag, "dropping frame with no matching pending request");
                }
            }
        }
    }

    async fn teardown_from_reader(inner: &Arc<Inner>) {
        {
            let mut state = inner.state.lock().await;
            if matches!(*state, ConnectionState::Closed | ConnectionState::Failed) {
                return;
            }
            *state = ConnectionState::Closed;
        }
        inner.write_half.lock().await.take();
        Self::fail_all_pending(inner, Error::NotConnected).await;
    }

    async fn fail_all_pending(inner: &Arc<Inner>, err: Error) {
        let mut pending = inner.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(err.clone()));
        }
    }
}

/// We lost the race to remove `tag` from the pending table ourselves, which
/// means the reader already claimed it and is about to (or already did)
/// deliver through `rx`. Wait for that delivery rather than fabricate a
/// second outcome for the same tag.
async fn rx_after_timeout_race(rx: oneshot::Receiver<Result<Frame, Error>>) -> Result<Frame, Error> {
    match rx.await {
        Ok(outcome) => outcome,
        Err(_) => Err(Error::NotConnected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RequestCode;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    async fn echo_server(listener: TcpListener) {
        let (mut sock, _) = listener.accept().await.unwrap();
        loop {
            let mut header_buf = [0u8; HEADER_LEN];
            if sock.read_exact(&mut header_buf).await.is_err() {
                return;
            }
            let header = Header::decode(&header_buf).unwrap();
            let mut payload = vec![0u8; header.payload_size as usize];
            if header.payload_size > 0 {
                sock.read_exact(&mut payload).await.unwrap();
            }
            let reply = Frame::new(header.r#type, header.tag, payload);
            sock.write_all(&reply.encode()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn connect_send_and_receive_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(echo_server(listener));

        let transport = Transport::new();
        transport.connect(port).await.unwrap();
        assert_eq!(transport.state().await, ConnectionState::Ready);

        let frame = transport
            .send_request(RequestCode::Ping.as_u32(), b"hi".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(frame.payload, b"hi");
    }

    #[tokio::test]
    async fn second_connect_on_same_instance_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(echo_server(listener));

        let transport = Transport::new();
        transport.connect(port).await.unwrap();
        let err = transport.connect(port).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyConnected));
    }

    #[tokio::test]
    async fn send_request_without_connection_fails_fast() {
        let transport = Transport::new();
        let err = transport
            .send_request(RequestCode::Ping.as_u32(), vec![], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn timeout_fires_when_server_never_replies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            // Accept the connection but never answer.
            std::future::pending::<()>().await;
        });

        let transport = Transport::new();
        transport.connect(port).await.unwrap();
        let started = tokio::time::Instant::now();
        let err = transport
            .send_request(RequestCode::Ping.as_u32(), vec![], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn disconnect_fails_every_pending_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let transport = Transport::new();
        transport.connect(port).await.unwrap();

        let t1 = transport.clone();
        let t2 = transport.clone();
        let h1 = tokio::spawn(async move {
            t1.send_request(RequestCode::Ping.as_u32(), vec![], Duration::from_secs(5))
                .await
        });
        let h2 = tokio::spawn(async move {
            t2.send_request(RequestCode::Hierarchy.as_u32(), vec![], Duration::from_secs(5))
                .await
        });

        // Give both requests a moment to land in the pending table.
        tokio::time::sleep(Duration::from_millis(50)).await;
        transport.disconnect().await;

        assert!(matches!(h1.await.unwrap().unwrap_err(), Error::NotConnected));
        assert!(matches!(h2.await.unwrap().unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn interleaved_requests_each_get_their_own_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(echo_server(listener));

        let transport = Transport::new();
        transport.connect(port).await.unwrap();

        let t1 = transport.clone();
        let t2 = transport.clone();
        let (r1, r2) = tokio::join!(
            t1.send_request(RequestCode::Hierarchy.as_u32(), b"hierarchy".to_vec(), Duration::from_secs(1)),
            t2.send_request(RequestCode::Ping.as_u32(), b"ping".to_vec(), Duration::from_secs(1)),
        );
        assert_eq!(r1.unwrap().payload, b"hierarchy");
        assert_eq!(r2.unwrap().payload, b"ping");
    }
}
