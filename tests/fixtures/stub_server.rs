//! Scripted HTTP server for exercising the HTTP clients.

use std::thread;

use tiny_http::{Header, Response, Server, StatusCode};

/// One canned reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Serves `replies` in order, one per request, then stops.
///
/// Returns the base URL and a handle yielding the requested URLs.
pub fn spawn_stub(replies: Vec<Reply>) -> (String, thread::JoinHandle<Vec<String>>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let base = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut urls = Vec::new();
        for reply in replies {
            let Ok(req) = server.recv() else { break };
            urls.push(req.url().to_string());
            let response = Response::from_string(reply.body)
                .with_status_code(StatusCode(reply.status))
                .with_header(Header::from_bytes("Content-Type", "application/json").expect("content type header"));
            let _ = req.respond(response);
        }
        urls
    });
    (base, handle)
}
