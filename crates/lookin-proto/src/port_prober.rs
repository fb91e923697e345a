//! Concurrent TCP port discovery (spec §4.1).
//!
//! LookinServer listens on loopback on one of a small fixed range of ports.
//! The prober fires a connect attempt at every port in the range concurrently
//! and never writes a byte — a successful TCP handshake is the only signal
//! it needs.

use std::ops::RangeInclusive;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinSet;

/// Fixed port range LookinServer is known to bind in (spec §4.1).
pub const PORT_RANGE: RangeInclusive<u16> = 47164..=47169;

async fn probe_one(port: u16, timeout: Duration) -> Option<u16> {
    let addr = ("127.0.0.1", port);
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            // We only wanted to know the socket is acceptable; drop it
            // immediately so a later real connect() isn't refused as a
            // second client of a single-client server.
            drop(stream);
            Some(port)
        }
        Ok(Err(err)) => {
            tracing::trace!(port, %err, "probe connect failed");
            None
        }
        Err(_) => {
            tracing::trace!(port, "probe timed out");
            None
        }
    }
}

/// Probe every port in `range` concurrently; return the first one that
/// accepts a connection, cancelling every other in-flight probe. Returns
/// `None` if every probe fails or times out.
pub async fn find_first(range: RangeInclusive<u16>, timeout: Duration) -> Option<u16> {
    let mut set = JoinSet::new();
    for port in range {
        set.spawn(probe_one(port, timeout));
    }

    let mut winner = None;
    while let Some(res) = set.join_next().await {
        if let Ok(Some(port)) = res {
            winner = Some(port);
            break;
        }
    }
    // Cancel every other in-flight attempt (spec §5: "Port probes cancel
    // siblings when one succeeds").
    set.abort_all();
    winner
}

/// Probe every port in `range` concurrently; wait for every attempt to
/// finish and return the successful ports, sorted ascending.
pub async fn find_all(range: RangeInclusive<u16>, timeout: Duration) -> Vec<u16> {
    let mut set = JoinSet::new();
    for port in range {
        set.spawn(probe_one(port, timeout));
    }

    let mut found = Vec::new();
    while let Some(res) = set.join_next().await {
        if let Ok(Some(port)) = res {
            found.push(port);
        }
    }
    found.sort_unstable();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn find_first_hits_the_only_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let range = port..=port;
        let found = find_first(range, Duration::from_millis(500)).await;
        assert_eq!(found, Some(port));
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn find_first_returns_none_when_nothing_listens() {
        // Port 1 is privileged and essentially guaranteed closed locally.
        let found = find_first(1..=1, Duration::from_millis(200)).await;
        assert_eq!(found, None);
    }
}
