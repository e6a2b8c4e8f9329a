use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

pub const API_KEY: &str = "test-key";

/// Local stand-in for the `generateContent` endpoint.
///
/// Models in `failing_models` answer with a 503 error body; the others echo
/// the chapter title back as `[model] translated: {title}`.
pub struct GeminiStub {
    pub base_url: String,
    requested: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl GeminiStub {
    pub fn spawn(failing_models: &[&str]) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start gemini stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1beta");

        let failing: HashSet<String> = failing_models.iter().map(|m| (*m).to_owned()).collect();
        let requested = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = {
            let requested = Arc::clone(&requested);
            thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                        Ok(Some(req)) => req,
                        Ok(None) => continue,
                        Err(_) => break,
                    };

                    let url = request.url().to_string();
                    let model = url
                        .strip_prefix("/v1beta/models/")
                        .and_then(|rest| rest.strip_suffix(":generateContent"))
                        .map(str::to_owned);
                    let Some(model) = model.filter(|_| request.method() == &tiny_http::Method::Post)
                    else {
                        let _ = request.respond(
                            tiny_http::Response::from_string("not found").with_status_code(404),
                        );
                        continue;
                    };
                    requested.lock().unwrap().push(model.clone());

                    let has_key = request.headers().iter().any(|h| {
                        h.field.equiv("x-goog-api-key") && h.value.as_str() == API_KEY
                    });
                    if !has_key {
                        let _ = request.respond(json_response(
                            401,
                            serde_json::json!({ "error": { "message": "missing api key" } }),
                        ));
                        continue;
                    }

                    let mut body = String::new();
                    if request.as_reader().read_to_string(&mut body).is_err() {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid request body")
                                .with_status_code(400),
                        );
                        continue;
                    }

                    if failing.contains(&model) {
                        let _ = request.respond(json_response(
                            503,
                            serde_json::json!({
                                "error": { "code": 503, "message": format!("{model} is overloaded") }
                            }),
                        ));
                        continue;
                    }

                    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                    let prompt = parsed
                        .pointer("/contents/0/parts/0/text")
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    let title = prompt
                        .lines()
                        .find_map(|line| line.strip_prefix("Chapter title: "))
                        .unwrap_or("?");

                    let _ = request.respond(json_response(
                        200,
                        serde_json::json!({
                            "candidates": [{
                                "content": {
                                    "role": "model",
                                    "parts": [ { "text": format!("[{model}] translated: {title}") } ]
                                },
                                "finishReason": "STOP"
                            }]
                        }),
                    ));
                }
            })
        };

        Self {
            base_url,
            requested,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Models in the order their endpoints were called.
    pub fn requested_models(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Drop for GeminiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn json_response(status: u16, body: Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}
