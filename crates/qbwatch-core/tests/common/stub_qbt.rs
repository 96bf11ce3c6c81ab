//! Minimal HTTP/1.1 stub of the qBittorrent Web API for integration tests.
//!
//! Serves `/api/v2/auth/login`, `/app/version`, `/torrents/info`,
//! `/torrents/properties`, `/torrents/add`, `/torrents/pause` and
//! `/torrents/resume` from a shared in-memory state, plus a static
//! `.torrent` file for upload tests. Records every pause/resume hash,
//! upload body and login attempt so tests can assert on the command
//! traffic.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

const SID: &str = "stub-session-1";

#[derive(Debug, Default)]
pub struct StubState {
    /// JSON objects returned by `/torrents/info`.
    pub torrents: Vec<serde_json::Value>,
    /// Hashes from pause commands, flattened in call order.
    pub paused: Vec<String>,
    /// Hashes from resume commands, flattened in call order.
    pub resumed: Vec<String>,
    /// Number of login attempts seen.
    pub logins: usize,
    /// Bodies of `/torrents/add` uploads, raw.
    pub added: Vec<String>,
    /// If true, login answers `Fails.` (wrong credentials).
    pub reject_login: bool,
}

/// Handle to the running stub. The server thread lives until process exit.
pub struct StubQbt {
    base_url: String,
    state: Arc<Mutex<StubState>>,
}

impl StubQbt {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(StubState::default()));
        let server_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&server_state);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            state,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap()
    }

    pub fn set_torrents(&self, torrents: Vec<serde_json::Value>) {
        self.state().torrents = torrents;
    }

    pub fn reject_login(&self, reject: bool) {
        self.state().reject_login = reject;
    }
}

/// Build one `/torrents/info` entry.
pub fn torrent(hash: &str, progress: f64, state: &str, size: u64) -> serde_json::Value {
    serde_json::json!({
        "hash": hash,
        "name": format!("torrent-{hash}"),
        "progress": progress,
        "state": state,
        "size": size,
        "downloaded": (progress * size as f64) as u64,
        "dlspeed": 1024,
        "upspeed": 0,
        "ratio": 0.0,
        "eta": 120,
        "num_seeds": 3,
        "num_leechs": 1,
    })
}

fn handle(mut stream: TcpStream, state: &Arc<Mutex<StubState>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() || request_line.is_empty() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();

    let mut content_length = 0usize;
    let mut has_session = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).is_err() {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            if name.eq_ignore_ascii_case("cookie") && value.contains(&format!("SID={SID}")) {
                has_session = true;
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 && reader.read_exact(&mut body).is_err() {
        return;
    }
    let body = String::from_utf8_lossy(&body).to_string();

    let path = target.split('?').next().unwrap_or("");
    match (method.as_str(), path) {
        ("POST", "/api/v2/auth/login") => {
            let reject = {
                let mut st = state.lock().unwrap();
                st.logins += 1;
                st.reject_login
            };
            if reject {
                respond(&mut stream, 200, &[], "Fails.");
            } else {
                let cookie = format!("Set-Cookie: SID={SID}; HttpOnly; path=/");
                respond(&mut stream, 200, &[&cookie], "Ok.");
            }
        }
        ("GET", "/api/v2/app/version") => {
            if has_session {
                respond(&mut stream, 200, &[], "4.6.5");
            } else {
                respond(&mut stream, 403, &[], "Forbidden");
            }
        }
        ("GET", "/api/v2/torrents/info") => {
            if has_session {
                let json = serde_json::Value::Array(state.lock().unwrap().torrents.clone());
                respond(&mut stream, 200, &[], &json.to_string());
            } else {
                respond(&mut stream, 403, &[], "Forbidden");
            }
        }
        ("GET", "/api/v2/torrents/properties") => {
            let json = serde_json::json!({"time_elapsed": 3600, "seeds": 5, "peers": 2});
            respond(&mut stream, 200, &[], &json.to_string());
        }
        ("GET", "/files/test.torrent") => {
            respond(&mut stream, 200, &[], "d8:announce0:e");
        }
        ("POST", "/api/v2/torrents/add") => {
            state.lock().unwrap().added.push(body);
            respond(&mut stream, 200, &[], "Ok.");
        }
        ("POST", "/api/v2/torrents/pause") => {
            state.lock().unwrap().paused.extend(parse_hashes(&body));
            respond(&mut stream, 200, &[], "");
        }
        ("POST", "/api/v2/torrents/resume") => {
            state.lock().unwrap().resumed.extend(parse_hashes(&body));
            respond(&mut stream, 200, &[], "");
        }
        _ => respond(&mut stream, 404, &[], "Not Found"),
    }
}

/// Pull the pipe-separated hash list out of a form-encoded command body.
fn parse_hashes(body: &str) -> Vec<String> {
    body.split('&')
        .find_map(|pair| pair.strip_prefix("hashes="))
        .map(|raw| {
            url_decode(raw)
                .split('|')
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn url_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 3 <= bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                if let Ok(b) = u8::from_str_radix(hex, 16) {
                    out.push(b);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).to_string()
}

fn respond(stream: &mut TcpStream, status: u16, extra_headers: &[&str], body: &str) {
    let reason = match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Error",
    };
    let mut response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n",
        body.len()
    );
    for header in extra_headers {
        response.push_str(header);
        response.push_str("\r\n");
    }
    response.push_str("\r\n");
    response.push_str(body);
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
