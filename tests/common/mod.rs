#![allow(dead_code)]

use std::io;

use cascade::{Headers, Transport};

/// One response written through the transport seam.
#[derive(Debug, Clone)]
pub struct WrittenResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WrittenResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body is not valid JSON")
    }
}

/// Transport double recording every write, for idempotence and payload
/// assertions.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub writes: Vec<WrittenResponse>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single recorded write, panicking when the one-shot contract was
    /// violated.
    pub fn single(&self) -> &WrittenResponse {
        assert_eq!(self.writes.len(), 1, "expected exactly one write");
        &self.writes[0]
    }
}

impl Transport for MockTransport {
    fn write_response(&mut self, status: u16, headers: &Headers, body: &[u8]) -> io::Result<()> {
        self.writes.push(WrittenResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_vec(),
        });
        Ok(())
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::time::Duration;

    /// Reserve an ephemeral port for a test server.
    pub fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    /// Fire a raw HTTP request and collect everything the server writes
    /// before the read timeout.
    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Split a raw HTTP response into (status line, body).
    pub fn parse_response(raw: &str) -> (String, String) {
        let status = raw.lines().next().unwrap_or("").to_string();
        let body = raw
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (status, body)
    }
}
