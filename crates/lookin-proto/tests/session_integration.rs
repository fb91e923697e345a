//! End-to-end `Session` behavior against a fake LookinServer built from the
//! same archive codec the client uses (spec §8 scenarios B, C, D, F).

use std::collections::BTreeMap;
use std::time::Duration;

use lookin_proto::archive::{self, Value};
use lookin_proto::error::Error;
use lookin_proto::frame::{Frame, Header, HEADER_LEN};
use lookin_proto::session::Session;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn response_envelope(data: Option<Value>, error: Option<Value>) -> Vec<u8> {
    let mut fields: BTreeMap<&'static str, Value> = BTreeMap::new();
    fields.insert("data", data.unwrap_or(Value::Null));
    fields.insert("error", error.unwrap_or(Value::Null));
    fields.insert("appIsInBackground", Value::Bool(false));
    archive::encode_dict(Value::classed(
        "LookinResponseAttachment",
        fields.into_iter(),
    ))
}

fn leaf_label(oid: u64) -> Value {
    Value::dict([
        ("viewOid", Value::Int(oid as i64)),
        ("layerOid", Value::Int((oid + 1000) as i64)),
        ("className", Value::Str("UILabel".to_string())),
        (
            "frame",
            Value::Rect(lookin_proto::archive::Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 }),
        ),
    ])
}

fn hierarchy_with_labels(count: u64) -> Value {
    let children: Vec<Value> = (0..count).map(leaf_label).collect();
    let root = Value::dict([
        ("viewOid", Value::Int(0)),
        ("layerOid", Value::Int(9000)),
        ("className", Value::Str("UIView".to_string())),
        (
            "frame",
            Value::Rect(lookin_proto::archive::Rect { x: 0.0, y: 0.0, width: 100.0, height: 100.0 }),
        ),
        ("children", Value::Array(children)),
    ]);
    Value::classed("LookinHierarchyInfo", [("appInfo", Value::Null), ("root", root)])
}

/// Handles one connection, dispatching by request type until the socket
/// closes. `failing_layer_oids` makes `AllAttrGroups` fail for those oids,
/// modeling scenario F's "views #3 and #17 fail".
async fn fake_server(mut sock: TcpStream, failing_layer_oids: Vec<u64>, label_count: u64) {
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

        let response_payload = match header.r#type {
            200 => response_envelope(None, None), // Ping
            202 => response_envelope(Some(hierarchy_with_labels(label_count)), None), // Hierarchy
            210 => {
                let request = archive::Decoder::new().decode(&payload).unwrap();
                let layer_oid = request.get("data").and_then(Value::as_u64).unwrap();
                if failing_layer_oids.contains(&layer_oid) {
                    response_envelope(None, Some(Value::Str("layer not found".to_string())))
                } else {
                    let group = Value::dict([
                        ("name", Value::Str("text".to_string())),
                        (
                            "items",
                            Value::Array(vec![Value::dict([
                                ("identifier", Value::Str("lb_t_t".to_string())),
                                ("value", Value::Str(format!("Label {layer_oid}"))),
                            ])]),
                        ),
                    ]);
                    response_envelope(Some(Value::Array(vec![group])), None)
                }
            }
            204 => response_envelope(None, Some(Value::Str("setFoo: is not a known selector".to_string()))),
            other => panic!("fake server received unexpected request type {other}"),
        };

        let reply = Frame::new(header.r#type, header.tag, response_payload);
        sock.write_all(&reply.encode()).await.unwrap();
    }
}

async fn spawn_fake_server(failing_layer_oids: Vec<u64>, label_count: u64) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        if let Ok((sock, _)) = listener.accept().await {
            fake_server(sock, failing_layer_oids, label_count).await;
        }
    });
    port
}

#[tokio::test]
async fn ping_happy_path_reports_alive() {
    let port = spawn_fake_server(vec![], 0).await;
    let session = Session::new();
    session.connect_to(port).await.unwrap();

    let alive = session.ping(Some(Duration::from_secs(5))).await.unwrap();
    assert!(alive);
}

#[tokio::test]
async fn interleaved_hierarchy_and_ping_each_get_their_own_response() {
    let port = spawn_fake_server(vec![], 3).await;
    let session = std::sync::Arc::new(Session::new());
    session.connect_to(port).await.unwrap();

    let s1 = session.clone();
    let s2 = session.clone();
    let (hierarchy, ping) = tokio::join!(
        s1.refresh_hierarchy(Some(Duration::from_secs(2))),
        s2.ping(Some(Duration::from_secs(2))),
    );

    assert!(hierarchy.unwrap().root.children.len() == 3);
    assert!(ping.unwrap());
}

#[tokio::test]
async fn server_error_surfaces_without_tearing_down_connection() {
    let port = spawn_fake_server(vec![], 0).await;
    let session = Session::new();
    session.connect_to(port).await.unwrap();

    let err = session
        .modify_attribute(0, "setFoo:", 14, Value::Bool(true), Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ServerError(_)));
    assert_eq!(session.state().await, lookin_proto::transport::ConnectionState::Ready);
}

#[tokio::test]
async fn text_enrichment_swallows_per_view_failures() {
    // 25 text-bearing views; the server fails two of their layer oids
    // (spec §8 scenario F: "views #3 and #17 fail").
    let failing = vec![1000 + 3, 1000 + 17];
    let port = spawn_fake_server(failing, 25).await;
    let session = Session::new();
    session.connect_to(port).await.unwrap();

    let enriched = session.hierarchy_with_text(Some(Duration::from_secs(5))).await.unwrap();
    assert_eq!(enriched.text_by_view_oid.len(), 23);
    assert!(!enriched.text_by_view_oid.contains_key(&3));
    assert!(!enriched.text_by_view_oid.contains_key(&17));
}
