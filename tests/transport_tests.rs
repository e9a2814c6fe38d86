//! HTTP delivery against a local listener.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use pilotscope_core::config::PilotConfig;
use pilotscope_exec::{Delivery, Endpoint, HttpTransport, PilotScope, Transport, TransportError};

/// Read one request, answer with `response` verbatim and hand back the
/// request together with the still-open connection.
fn serve_raw(listener: TcpListener, response: String) -> thread::JoinHandle<(String, TcpStream)> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_request(&mut stream);
        stream.write_all(response.as_bytes()).expect("write response");
        stream.flush().expect("flush response");
        (request, stream)
    })
}

/// Answer one request with `status` and `body`, closing afterwards.
fn serve_once(listener: TcpListener, status: &'static str, body: &'static str) -> thread::JoinHandle<String> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let server = serve_raw(listener, response);
    thread::spawn(move || server.join().expect("server thread").0)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).expect("read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some((head, body)) = text.split_once("\r\n\r\n") {
            let len = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if body.len() >= len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn local_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

fn http(cfg: &PilotConfig) -> HttpTransport {
    HttpTransport::new(cfg).expect("http client")
}

#[test]
fn test_http_round_trip_posts_json() {
    let (listener, port) = local_listener();
    let server = serve_once(listener, "200 OK", "received");

    let mut transport = http(&PilotConfig::default());
    let response = transport
        .round_trip(&Endpoint::new("127.0.0.1", port), r#"{"tid":"1"}"#)
        .unwrap();
    assert_eq!(response, "received");

    let request = server.join().unwrap();
    assert!(request.starts_with("POST / HTTP/1.1\r\n"));
    assert!(request
        .to_ascii_lowercase()
        .contains("content-type: application/json\r\n"));
    assert!(request.ends_with(r#"{"tid":"1"}"#));
}

#[test]
fn test_http_error_status_is_reported() {
    let (listener, port) = local_listener();
    let server = serve_once(listener, "500 Internal Server Error", "boom");

    let mut transport = http(&PilotConfig::default());
    let err = transport
        .round_trip(&Endpoint::new("127.0.0.1", port), "{}")
        .unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 500, ref body } if body == "boom"));
    server.join().unwrap();
}

#[test]
fn test_hooks_deliver_over_http() {
    let (listener, port) = local_listener();
    let server = serve_once(listener, "200 OK", "ok");

    let cfg = PilotConfig::default();
    let mut ps = PilotScope::new(cfg.clone(), http(&cfg));
    let query = format!(
        r#"/*pilotscope {{"anchor": {{"SUBQUERY_CARD_FETCH_ANCHOR": {{}}}}, "url": "127.0.0.1", "port": {port}, "enableTerminate": false, "tid": "11"}} pilotscope*/ select 1"#
    );
    ps.planner_hook(&query, |_| ()).unwrap();

    let request = server.join().unwrap();
    let (_, body) = request.split_once("\r\n\r\n").unwrap();
    let payload: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(payload["tid"], "11");
    assert_eq!(payload["anchor_names"], serde_json::json!(["SUBQUERY_CARD_FETCH_ANCHOR"]));
    assert_eq!(
        ps.last_report().unwrap().delivery,
        Delivery::Sent {
            response: "ok".into()
        }
    );
}

#[test]
fn test_unreachable_collector_does_not_fail_query() {
    let (listener, port) = local_listener();
    drop(listener);

    let cfg = PilotConfig {
        connect_timeout_ms: 200,
        ..PilotConfig::default()
    };
    let mut ps = PilotScope::new(cfg.clone(), http(&cfg));
    let query = format!(
        r#"/*pilotscope {{"anchor": {{"SUBQUERY_CARD_FETCH_ANCHOR": {{}}}}, "host": "127.0.0.1", "port": {port}, "enableTerminate": false}} pilotscope*/ select 1"#
    );
    assert!(ps.planner_hook(&query, |_| ()).is_ok());
    assert!(!ps.is_active());
    assert!(matches!(
        ps.last_report().unwrap().delivery,
        Delivery::Failed { .. }
    ));
}

#[test]
fn test_keep_alive_collector_response_is_read() {
    let (listener, port) = local_listener();
    let server = serve_raw(listener, "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".into());

    let cfg = PilotConfig {
        io_timeout_ms: 2_000,
        ..PilotConfig::default()
    };
    let mut transport = http(&cfg);
    let response = transport
        .round_trip(&Endpoint::new("127.0.0.1", port), "{}")
        .unwrap();
    assert_eq!(response, "ok");

    // Connection is held open by the collector until here.
    let (request, _open) = server.join().unwrap();
    assert!(request.ends_with("{}"));
}

#[test]
fn test_chunked_collector_response_is_decoded() {
    let (listener, port) = local_listener();
    let server = serve_raw(
        listener,
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nrec\r\n5\r\neived\r\n0\r\n\r\n".into(),
    );

    let mut transport = http(&PilotConfig::default());
    let response = transport
        .round_trip(&Endpoint::new("http://127.0.0.1/", port), "{}")
        .unwrap();
    assert_eq!(response, "received");
    server.join().unwrap();
}
