//! In-process stand-in for the operation backend
//!
//! Speaks the real wire format over a real WebSocket on 127.0.0.1 and keeps
//! users, tokens and emoji records in memory.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use noemoji::session::SessionStore;
use noemoji::transport::WsTransportConfig;
use noemoji::{Client, Gateway};

const USER_FIELDS: [&str; 6] = ["uid", "name", "tel", "email", "super", "pwh"];

#[derive(Default)]
pub struct BackendState {
    pub users: BTreeMap<String, Value>,
    /// token -> uid
    pub tokens: BTreeMap<String, String>,
    pub emojis: Vec<Value>,
    /// Every op received, in arrival order
    pub ops: Vec<String>,
    /// Swallow requests without answering
    pub silent: bool,
    /// Answer every request with this text instead of handling it
    pub raw_reply: Option<String>,
    /// Answer `user.mod` with `false`
    pub refuse_mod: bool,
    next_token: u64,
    clock: i64,
}

impl BackendState {
    /// `None` means no reply is sent.
    fn handle(&mut self, text: &str) -> Option<String> {
        let request: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => return Some(format!("JSONDecodeError: {e}")),
        };
        let op = request["op"].as_str().unwrap_or_default().to_string();
        self.ops.push(op.clone());

        if self.silent {
            return None;
        }
        if let Some(raw) = &self.raw_reply {
            return Some(raw.clone());
        }

        Some(match self.dispatch(&op, &request) {
            Ok(value) => value.to_string(),
            Err(raw) => raw,
        })
    }

    fn dispatch(&mut self, op: &str, request: &Value) -> Result<Value, String> {
        match op {
            "user.query" => Ok(match request.get("uid").and_then(Value::as_str) {
                Some(uid) => self.users.get(uid).cloned().unwrap_or(Value::Null),
                None => Value::Array(self.users.values().cloned().collect()),
            }),
            "user.mod" => {
                let mut record = Map::new();
                for key in USER_FIELDS {
                    let value = request.get(key).ok_or(format!("KeyError: '{key}'"))?;
                    record.insert(key.to_string(), value.clone());
                }
                if self.refuse_mod {
                    return Ok(Value::Bool(false));
                }
                let uid = text_field(request, "uid")?;
                // Any update invalidates the principal's outstanding tokens.
                self.tokens.retain(|_, owner| *owner != uid);
                self.users.insert(uid, Value::Object(record));
                Ok(Value::Bool(true))
            }
            "user.mktoken" => {
                let uid = text_field(request, "uid")?;
                Ok(Value::String(self.issue_token(&uid)))
            }
            "user.validate" => {
                let uid = text_field(request, "uid")?;
                let token = text_field(request, "token")?;
                Ok(Value::Bool(self.tokens.get(&token) == Some(&uid)))
            }
            "user.rmtoken" => {
                let token = text_field(request, "token")?;
                self.tokens.remove(&token);
                Ok(Value::Null)
            }
            "emoji.insert" => {
                let uid = text_field(request, "uid")?;
                let emoji = request
                    .get("emoji")
                    .and_then(Value::as_i64)
                    .ok_or("KeyError: 'emoji'")?;
                self.clock += 1;
                self.emojis
                    .push(json!({ "uid": uid, "emoji": emoji, "time": self.clock }));
                Ok(Value::Bool(true))
            }
            "emoji.query" => Ok(match request.get("uid").and_then(Value::as_str) {
                Some(uid) => Value::Array(
                    self.emojis
                        .iter()
                        .filter(|r| r["uid"] == uid)
                        .map(|r| json!({ "emoji": r["emoji"], "time": r["time"] }))
                        .collect(),
                ),
                None => Value::Array(self.emojis.clone()),
            }),
            other => Err(format!("unknown op: {other}")),
        }
    }

    fn issue_token(&mut self, uid: &str) -> String {
        self.next_token += 1;
        let token = format!("tok-{}-{}", uid, self.next_token);
        self.tokens.insert(token.clone(), uid.to_string());
        token
    }
}

fn text_field(request: &Value, key: &str) -> Result<String, String> {
    request
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("KeyError: '{key}'"))
}

pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<Mutex<BackendState>>,
    task: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(BackendState::default()));

        let shared = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, shared.clone()));
            }
        });

        Self { addr, state, task }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn config(&self, request_timeout: Duration) -> WsTransportConfig {
        WsTransportConfig {
            url: self.url(),
            request_timeout,
        }
    }

    pub fn gateway(&self) -> Gateway {
        Gateway::websocket(self.config(Duration::from_secs(5)))
    }

    pub fn client(&self, store: Arc<dyn SessionStore>) -> Client {
        Client::new(self.gateway(), store)
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    pub fn ops(&self) -> Vec<String> {
        self.state().ops.clone()
    }

    /// Seed a user directly, bypassing registration
    pub fn add_user(&self, uid: &str, name: &str, secret: &str, is_super: bool) {
        let pwh = noemoji::auth::hash_password(secret).unwrap();
        self.state().users.insert(
            uid.to_string(),
            json!({
                "uid": uid,
                "name": name,
                "tel": null,
                "email": null,
                "super": is_super,
                "pwh": pwh,
            }),
        );
    }

    /// Stop accepting connections; later calls are refused.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

async fn serve(stream: TcpStream, state: Arc<Mutex<BackendState>>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let reply = state.lock().unwrap().handle(&text);
        if let Some(reply) = reply {
            if ws.send(Message::Text(reply)).await.is_err() {
                return;
            }
        }
    }
}
