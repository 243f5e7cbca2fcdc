//! In-process relay for exercising the client over real WebSockets.

use futures::{SinkExt, StreamExt};
use nostr::{Event, EventTemplate, KIND_SHORT_TEXT_NOTE, finalize_event};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, sleep};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// How the relay answers an `EVENT` frame.
#[derive(Debug, Clone)]
pub enum AckMode {
    Accept,
    Reject(String),
    /// Three-element `OK`, missing the message
    Truncated,
    /// Never answer
    Silent,
}

#[derive(Debug, Clone)]
enum Push {
    Event(Event),
    /// Drop every open connection without a close handshake
    Kick,
}

pub struct TestRelay {
    pub url: String,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Value>>>,
    push: broadcast::Sender<Push>,
}

impl TestRelay {
    pub async fn start(mode: AckMode) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let connections = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let (push, _) = broadcast::channel(64);

        let accept_connections = Arc::clone(&connections);
        let accept_received = Arc::clone(&received);
        let accept_push = push.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle_connection(
                    stream,
                    mode.clone(),
                    Arc::clone(&accept_received),
                    accept_push.subscribe(),
                ));
            }
        });

        Self {
            url,
            connections,
            received,
            push,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Every frame of type `kind` received so far, across all connections.
    pub fn frames(&self, kind: &str) -> Vec<Value> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|frame| frame[0] == kind)
            .cloned()
            .collect()
    }

    /// Wait until at least `count` frames of type `kind` have arrived.
    pub async fn wait_for_frames(&self, kind: &str, count: usize) -> Vec<Value> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let frames = self.frames(kind);
            if frames.len() >= count {
                return frames;
            }
            if Instant::now() > deadline {
                panic!("expected {} {} frames, saw {}", count, kind, frames.len());
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    /// Send `event` to every open subscription.
    pub fn push_event(&self, event: &Event) {
        let _ = self.push.send(Push::Event(event.clone()));
    }

    pub fn kick(&self) {
        let _ = self.push.send(Push::Kick);
    }
}

async fn handle_connection(
    stream: TcpStream,
    mode: AckMode,
    received: Arc<Mutex<Vec<Value>>>,
    mut push: broadcast::Receiver<Push>,
) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();
    let mut subscription: Option<String> = None;

    loop {
        tokio::select! {
            msg = read.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                received.lock().unwrap().push(frame.clone());

                let reply = match frame[0].as_str() {
                    Some("REQ") => {
                        subscription = frame[1].as_str().map(str::to_string);
                        subscription.as_ref().map(|sub| json!(["EOSE", sub]))
                    }
                    Some("CLOSE") => {
                        subscription = None;
                        None
                    }
                    Some("EVENT") => {
                        let id = frame[1]["id"].clone();
                        match &mode {
                            AckMode::Accept => Some(json!(["OK", id, true, ""])),
                            AckMode::Reject(reason) => Some(json!(["OK", id, false, reason])),
                            AckMode::Truncated => Some(json!(["OK", id, true])),
                            AckMode::Silent => None,
                        }
                    }
                    _ => Some(json!(["NOTICE", "unsupported message"])),
                };
                if let Some(reply) = reply {
                    if write.send(Message::text(reply.to_string())).await.is_err() {
                        break;
                    }
                }
            }
            push = push.recv() => match push {
                Ok(Push::Event(event)) => {
                    if let Some(sub) = &subscription {
                        let frame = json!(["EVENT", sub, event]).to_string();
                        if write.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(Push::Kick) | Err(_) => break,
            },
        }
    }
}

pub fn signed_note(content: &str) -> Event {
    let template = EventTemplate {
        created_at: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs(),
        kind: KIND_SHORT_TEXT_NOTE,
        tags: vec![],
        content: content.to_string(),
    };
    finalize_event(&template, &[0x07; 32]).unwrap()
}
