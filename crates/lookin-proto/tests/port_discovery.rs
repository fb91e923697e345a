//! End-to-end port discovery against a real loopback listener (spec §8,
//! scenario A: "Listener opens on port 47166 only... no listener is hit
//! twice.").

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lookin_proto::port_prober::find_first;
use tokio::net::TcpListener;

#[tokio::test]
async fn find_first_hits_exactly_one_listener_among_a_range() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let winning_port = listener.local_addr().unwrap().port();

    let accept_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accept_count);
    let accept_task = tokio::spawn(async move {
        if let Ok((_sock, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    // Probe a range that straddles the winning port with ports nothing
    // listens on; the prober must still land on the one real listener.
    let range = (winning_port.saturating_sub(2))..=(winning_port.saturating_add(2));
    let found = find_first(range, Duration::from_millis(500)).await;
    assert_eq!(found, Some(winning_port));

    tokio::time::sleep(Duration::from_millis(100)).await;
    accept_task.abort();
    assert_eq!(accept_count.load(Ordering::SeqCst), 1, "listener must be hit exactly once");
}
