use std::time::Duration;

use thiserror::Error;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const READ_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP status {status}{}", body_suffix(.body))]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response decode failed: {0}")]
    Decode(String),
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        let truncated = body.chars().take(240).collect::<String>();
        format!(" ({truncated})")
    }
}

pub fn agent(connect_timeout: Duration, read_timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(connect_timeout)
        .timeout_read(read_timeout)
        .timeout_write(read_timeout)
        .build()
}

fn into_text(result: Result<ureq::Response, ureq::Error>) -> Result<String, HttpError> {
    match result {
        Ok(response) => response
            .into_string()
            .map_err(|err| HttpError::Decode(err.to_string())),
        Err(ureq::Error::Status(status, response)) => Err(HttpError::Status {
            status,
            body: response.into_string().ok().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(err)) => Err(HttpError::Transport(err.to_string())),
    }
}

/// Single GET, no retries. Retry policy is the caller's business.
pub fn get_text(agent: &ureq::Agent, url: &str) -> Result<String, HttpError> {
    into_text(agent.get(url).call())
}

pub fn post_json(agent: &ureq::Agent, url: &str, body: &str) -> Result<String, HttpError> {
    into_text(
        agent
            .post(url)
            .set("Content-Type", "application/json")
            .send_string(body),
    )
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Canned responses keyed by request path. Unknown paths get a 404.
    #[derive(Debug)]
    pub(crate) struct TestServer {
        pub(crate) base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        pub(crate) fn spawn(routes: Vec<(&str, u16, String)>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let routes: Vec<(String, u16, String)> = routes
                .into_iter()
                .map(|(path, status, body)| (path.to_string(), status, body))
                .collect();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let requests_clone = Arc::clone(&requests);
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let (path, body) = read_request(&mut stream);
                        requests_clone
                            .lock()
                            .expect("lock requests")
                            .push(format!("{path} {body}").trim_end().to_string());
                        let (status, payload) = routes
                            .iter()
                            .find(|(p, _, _)| *p == path)
                            .map(|(_, s, b)| (*s, b.clone()))
                            .unwrap_or((404, String::new()));
                        let _ = write_response(&mut stream, status, &payload);
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().expect("lock requests").clone()
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.join_handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn read_request(stream: &mut TcpStream) -> (String, String) {
        let _ = stream.set_nonblocking(false);
        let _ = stream.set_read_timeout(Some(Duration::from_millis(500)));
        let mut buf = [0_u8; 4096];
        let mut data = Vec::new();
        let mut expected_len: Option<usize> = None;

        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(read) => data.extend_from_slice(&buf[..read]),
            }
            let text = String::from_utf8_lossy(&data);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let len = *expected_len.get_or_insert_with(|| {
                    text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse().ok())?
                        })
                        .unwrap_or(0)
                });
                if data.len() >= header_end + 4 + len {
                    break;
                }
            }
        }

        let text = String::from_utf8_lossy(&data).to_string();
        let path = text
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or_default()
            .to_string();
        let body = text
            .split_once("\r\n\r\n")
            .map(|(_, b)| b.to_string())
            .unwrap_or_default();
        (path, body)
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let payload = body.as_bytes();
        write!(
            stream,
            "HTTP/1.1 {status} Status\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        )?;
        stream.write_all(payload)?;
        stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::TestServer;
    use super::*;

    fn test_agent() -> ureq::Agent {
        agent(Duration::from_millis(500), Duration::from_millis(500))
    }

    #[test]
    fn get_text_returns_body() {
        let server = TestServer::spawn(vec![("/ok", 200, "hello".to_string())]);
        let body = get_text(&test_agent(), &format!("{}/ok", server.base_url)).unwrap();
        assert_eq!(body, "hello");
    }

    #[test]
    fn get_text_does_not_retry_server_errors() {
        let server = TestServer::spawn(vec![("/down", 503, "maintenance".to_string())]);

        let err = get_text(&test_agent(), &format!("{}/down", server.base_url)).unwrap_err();

        assert!(
            err.to_string().contains("HTTP status 503 (maintenance)"),
            "unexpected error message: {err}"
        );
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn post_json_sends_body() {
        let server = TestServer::spawn(vec![("/echo", 200, "{}".to_string())]);

        post_json(
            &test_agent(),
            &format!("{}/echo", server.base_url),
            r#"{"a":1}"#,
        )
        .unwrap();

        assert_eq!(server.requests(), vec![r#"/echo {"a":1}"#.to_string()]);
    }

    #[test]
    fn transport_error_when_nothing_listens() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = get_text(&test_agent(), &format!("http://{addr}/")).unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
