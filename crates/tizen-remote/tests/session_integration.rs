//! Integration tests for the duplex control session.
//!
//! # Purpose
//!
//! These tests drive a real [`DuplexSession`] against a fake TV: a local
//! `tokio-tungstenite` server that performs the WebSocket upgrade, sends the
//! handshake event, and then follows a per-test script.  They verify:
//!
//! - The handshake: the token in the URL and the token the TV issues.
//! - Correlation: notifications arriving during an exchange are skipped.
//! - Ordering: fire-and-forget frames reach the TV in the order sent.
//! - Lifecycle: double connect, double close, handshake timeout, and the
//!   TV hanging up.
//!
//! # Fake TV lifecycle
//!
//! ```text
//! test                           fake TV task
//! ────                           ────────────
//! fake_tv(script) ─────────────▶ bind 127.0.0.1:0, accept one client
//! session.connect(token) ──────▶ upgrade (request URI recorded)
//!                                script(ws): send handshake, read, reply...
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use tizen_core::protocol::encode_key_command;
use tizen_core::{Key, KeyAction};
use tizen_remote::infrastructure::session::{
    DuplexSession, SessionConfig, SessionError, SessionState,
};

type FakeSocket = WebSocketStream<TcpStream>;

const HANDSHAKE: &str = r#"{"event":"ms.channel.connect","data":{"id":"client-1","token":"4242","clients":[{"id":"client-1","connectTime":1,"deviceName":"VGl6ZW5SZW1vdGU=","isHost":false,"attributes":{"name":"VGl6ZW5SZW1vdGU="}}]}}"#;
const HANDSHAKE_NO_TOKEN: &str = r#"{"event":"ms.channel.connect","data":{"id":"client-1","clients":[]}}"#;

/// Starts a fake TV that accepts one connection and runs `script` on it.
///
/// Returns the port and a slot holding the request URI once the upgrade is done.
async fn fake_tv<F, Fut>(script: F) -> (u16, Arc<Mutex<String>>)
where
    F: FnOnce(FakeSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let uri = Arc::new(Mutex::new(String::new()));
    let recorded = Arc::clone(&uri);

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let record_uri =
            move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                *recorded.lock().unwrap() = request.uri().to_string();
                Ok(response)
            };
        let ws = accept_hdr_async(tcp, record_uri).await.unwrap();
        script(ws).await;
    });

    (port, uri)
}

/// Next text frame from the client, skipping keepalive pings.
async fn next_text(ws: &mut FakeSocket) -> Option<String> {
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// Keeps reading until the client goes away so pings get answered.
async fn drain(mut ws: FakeSocket) {
    while next_text(&mut ws).await.is_some() {}
}

fn session(port: u16) -> DuplexSession {
    DuplexSession::new(
        SessionConfig::plain("127.0.0.1")
            .with_port(port)
            .with_read_timeout(Duration::from_secs(2))
            .with_write_timeout(Duration::from_secs(2)),
    )
}

// ── Handshake ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_adopts_token_issued_by_tv() {
    // Arrange
    let (port, uri) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        drain(ws).await;
    })
    .await;
    let session = session(port);

    // Act
    let info = session.connect("").await.unwrap();

    // Assert
    assert_eq!(info.event, "ms.channel.connect");
    assert_eq!(info.token, "4242");
    assert_eq!(info.clients.len(), 1);
    assert_eq!(session.token(), "4242");
    assert_eq!(session.state(), SessionState::Connected);
    assert!(session.is_connected());
    let uri = uri.lock().unwrap().clone();
    assert!(uri.starts_with("/api/v2/channels/samsung.remote.control?name="));
    assert!(uri.ends_with("&token="));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_presents_saved_token_and_keeps_it() {
    let (port, uri) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE_NO_TOKEN.into())).await.unwrap();
        drain(ws).await;
    })
    .await;
    let session = session(port);

    let info = session.connect("1234").await.unwrap();

    assert_eq!(info.token, "");
    assert_eq!(session.token(), "1234");
    assert!(uri.lock().unwrap().ends_with("&token=1234"));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_skips_notifications_before_handshake() {
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(r#"{"event":"ms.remote.touchEnable"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        drain(ws).await;
    })
    .await;
    let session = session(port);

    let info = session.connect("").await.unwrap();

    assert_eq!(info.token, "4242");
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_handshake_timeout_leaves_session_retryable() {
    // Arrange: the TV upgrades but never sends the handshake event
    let (port, _) = fake_tv(|ws| async move {
        drain(ws).await;
    })
    .await;
    let session = DuplexSession::new(
        SessionConfig::plain("127.0.0.1")
            .with_port(port)
            .with_read_timeout(Duration::from_millis(300)),
    );

    // Act
    let result = session.connect("").await;

    // Assert
    assert!(matches!(result, Err(SessionError::HandshakeTimeout(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_unauthorized_handshake_is_rejected() {
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(r#"{"event":"ms.channel.unauthorized"}"#.into()))
            .await
            .unwrap();
        drain(ws).await;
    })
    .await;
    let session = session(port);

    let result = session.connect("").await;

    assert!(matches!(result, Err(SessionError::Unauthorized)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_second_connect_fails_fast() {
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        drain(ws).await;
    })
    .await;
    let session = session(port);
    session.connect("").await.unwrap();

    let second = session.connect("").await;

    assert!(matches!(second, Err(SessionError::AlreadyConnected)));
    assert!(session.is_connected());
    session.close().await.unwrap();
}

// ── Exchanges ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_and_await_skips_ignorable_events() {
    // Arrange: the TV answers with two notifications ahead of the real reply
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        let request = next_text(&mut ws).await.unwrap();
        assert!(request.contains("ed.apps.launch"));
        for notification in [
            r#"{"event":"ms.remote.touchDisable","data":null}"#,
            r#"{"event":"ms.remote.imeEnd"}"#,
        ] {
            ws.send(Message::Text(notification.into())).await.unwrap();
        }
        ws.send(Message::Text(r#"{"event":"ed.apps.launch","data":200}"#.into()))
            .await
            .unwrap();
        drain(ws).await;
    })
    .await;
    let session = session(port);
    session.connect("").await.unwrap();
    let request = tizen_core::protocol::encode_launch_app(
        "org.tizen.browser",
        tizen_core::LaunchActionType::NativeLaunch,
        "https://example.com",
    )
    .unwrap();

    // Act
    let reply = session.send_and_await(request).await.unwrap();

    // Assert
    assert_eq!(reply, r#"{"event":"ed.apps.launch","data":200}"#);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_send_and_await_times_out_on_silence() {
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        drain(ws).await;
    })
    .await;
    let session = DuplexSession::new(
        SessionConfig::plain("127.0.0.1")
            .with_port(port)
            .with_read_timeout(Duration::from_millis(400)),
    );
    session.connect("").await.unwrap();

    let result = session.send_and_await("{}".to_string()).await;

    assert!(matches!(result, Err(SessionError::ReadTimeout(_))));
}

#[tokio::test]
async fn test_key_frames_arrive_in_order_with_requested_verbs() {
    // Arrange
    let (seen_tx, seen_rx) = oneshot::channel::<Vec<String>>();
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(next_text(&mut ws).await.unwrap());
        }
        let _ = seen_tx.send(seen);
        drain(ws).await;
    })
    .await;
    let session = session(port);
    session.connect("").await.unwrap();
    let commands = [
        (Key::VolUp, KeyAction::Press),
        (Key::VolUp, KeyAction::Release),
        (Key::Mute, KeyAction::Click),
    ];

    // Act
    for (key, action) in commands {
        session
            .send_command(encode_key_command(key, action).unwrap())
            .await
            .unwrap();
    }
    let seen = tokio::time::timeout(Duration::from_secs(2), seen_rx)
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(seen.len(), 3);
    for ((key, action), frame) in commands.iter().zip(&seen) {
        assert!(frame.contains(&format!(r#""Cmd":"{}""#, action.verb())), "{frame}");
        assert!(frame.contains(&format!(r#""DataOfCmd":"{key}""#)), "{frame}");
    }
    session.close().await.unwrap();
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_delivers_acknowledged_command() {
    // Arrange
    let (seen_tx, seen_rx) = oneshot::channel::<Option<String>>();
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        let _ = seen_tx.send(next_text(&mut ws).await);
        drain(ws).await;
    })
    .await;
    let session = session(port);
    session.connect("").await.unwrap();

    // Act: close straight after the send is acknowledged
    session
        .send_command(encode_key_command(Key::Mute, KeyAction::Click).unwrap())
        .await
        .unwrap();
    session.close().await.unwrap();

    // Assert
    let seen = tokio::time::timeout(Duration::from_secs(2), seen_rx)
        .await
        .unwrap()
        .unwrap();
    let frame = seen.expect("TV should receive the key before the close frame");
    assert!(frame.contains(r#""DataOfCmd":"KEY_MUTE""#), "{frame}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_delivers_acknowledged_command_on_worker_pool() {
    for round in 0..20 {
        // Arrange
        let (seen_tx, seen_rx) = oneshot::channel::<Option<String>>();
        let (port, _) = fake_tv(|mut ws| async move {
            ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
            let _ = seen_tx.send(next_text(&mut ws).await);
            drain(ws).await;
        })
        .await;
        let session = session(port);
        session.connect("").await.unwrap();

        // Act
        session
            .send_command(encode_key_command(Key::VolUp, KeyAction::Click).unwrap())
            .await
            .unwrap();
        session.close().await.unwrap();

        // Assert
        let seen = tokio::time::timeout(Duration::from_secs(2), seen_rx)
            .await
            .unwrap()
            .unwrap();
        assert!(seen.is_some(), "round {round}: acknowledged key was dropped");
    }
}

#[tokio::test]
async fn test_close_twice_is_noop() {
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        drain(ws).await;
    })
    .await;
    let session = session(port);
    session.connect("").await.unwrap();

    session.close().await.unwrap();
    session.close().await.unwrap();

    assert!(!session.is_connected());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(
        session.send_command("{}".to_string()).await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn test_tv_hanging_up_ends_the_session() {
    // Arrange: the TV closes right after the handshake
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        let _ = ws.close(None).await;
    })
    .await;
    let session = session(port);
    session.connect("").await.unwrap();

    // Act: wait for both loops to notice
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while session.is_connected() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Assert
    assert!(!session.is_connected());
    assert!(matches!(
        session.send_command("{}".to_string()).await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn test_reconnect_after_tv_hangs_up() {
    // Arrange: one listener serves two connections in turn
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        let _ = ws.close(None).await;

        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(HANDSHAKE_NO_TOKEN.into())).await.unwrap();
        drain(ws).await;
    });
    let session = session(port);
    session.connect("").await.unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while session.is_connected() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Act: the dead link is discarded and a new one opened with the adopted token
    let info = session.connect(&session.token()).await.unwrap();

    // Assert
    assert_eq!(info.token, "");
    assert_eq!(session.token(), "4242");
    assert!(session.is_connected());
    session.close().await.unwrap();
}

// ── Keepalive ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_keepalive_holds_idle_link() {
    // Arrange: the fake TV keeps reading, so every ping gets its pong
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        drain(ws).await;
    })
    .await;
    let session = DuplexSession::new(
        SessionConfig::plain("127.0.0.1")
            .with_port(port)
            .with_read_timeout(Duration::from_millis(300))
            .with_write_timeout(Duration::from_secs(2)),
    );
    session.connect("").await.unwrap();

    // Act: stay idle for five read timeouts
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // Assert
    assert!(session.is_connected());
    assert_eq!(session.state(), SessionState::Connected);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_link_drops_when_pings_go_unanswered() {
    // Arrange: the fake TV holds the socket open but never reads, so no pongs
    let (port, _) = fake_tv(|mut ws| async move {
        ws.send(Message::Text(HANDSHAKE.into())).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(ws);
    })
    .await;
    let read_timeout = Duration::from_millis(300);
    let session = DuplexSession::new(
        SessionConfig::plain("127.0.0.1")
            .with_port(port)
            .with_read_timeout(read_timeout)
            .with_write_timeout(Duration::from_secs(2)),
    );
    session.connect("").await.unwrap();
    assert!(session.is_connected());
    let started = tokio::time::Instant::now();

    // Act
    let deadline = started + Duration::from_secs(2);
    while session.is_connected() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Assert: gone after about one read timeout, well before the TV hangs up
    assert!(!session.is_connected());
    assert!(started.elapsed() < read_timeout * 3, "took {:?}", started.elapsed());
    assert!(matches!(
        session.send_command("{}".to_string()).await,
        Err(SessionError::NotConnected)
    ));
}
