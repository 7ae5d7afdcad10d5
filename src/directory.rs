use std::{
    thread::{self, JoinHandle},
    time::Instant,
};

use crate::{
    error::{Error, Result},
    model::Server,
};

/// Client of the remote server catalog
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    url: String,
    http: reqwest::blocking::Client,
}

impl DirectoryClient {
    /// The catalog request waits as long as the server takes; the blocking
    /// client would otherwise give up after 30s.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()?;

        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// Fetches the whole catalog; any failure discards the response entirely
    pub fn fetch_servers(&self) -> Result<Vec<Server>> {
        let timer = Instant::now();

        let response = self.http.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(format!("HTTP error! status: {status}")));
        }

        let body = response.text()?;
        let servers = parse_servers(&body)?;

        log::info!(
            "fetched {} servers in {}ms",
            servers.len(),
            timer.elapsed().as_millis()
        );

        Ok(servers)
    }

    /// Runs [`Self::fetch_servers`] off the UI thread
    pub fn spawn_fetch(&self) -> JoinHandle<Result<Vec<Server>>> {
        let client = self.clone();
        thread::spawn(move || client.fetch_servers())
    }
}

pub fn parse_servers(body: &str) -> Result<Vec<Server>> {
    serde_json::from_str(body).map_err(|err| Error::network(format!("malformed server list: {err}")))
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_servers() {
        let body = r#"[
            {"id": 1, "name": "Akatsuki", "devserver": "akatsuki.gg", "players": 900, "votes": 10},
            {"id": 2, "name": "Ripple", "devserver": "ripple.moe", "players": 12, "votes": 3,
             "image": "https://ripple.moe/logo.png", "url": "https://ripple.moe"}
        ]"#;

        let servers = parse_servers(body).unwrap();

        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].devserver, "ripple.moe");
    }

    #[test]
    fn test_malformed_body_is_total_failure() {
        // one bad entry rejects the whole list
        let body = r#"[
            {"id": 1, "name": "Akatsuki", "devserver": "akatsuki.gg"},
            {"id": "two", "name": "Ripple"}
        ]"#;

        let err = parse_servers(body).unwrap_err();
        assert!(matches!(err, Error::Network(_)));

        assert!(parse_servers("{\"error\": \"bad key\"}").is_err());
    }

    /// Serves a single canned HTTP response on a loopback port
    fn serve_once(status: &'static str, body: &'static str) -> String {
        serve_once_after(Duration::ZERO, status, body)
    }

    fn serve_once_after(delay: Duration, status: &'static str, body: &'static str) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            thread::sleep(delay);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });

        format!("http://{addr}/api/v2/client/servers")
    }

    #[test]
    fn test_fetch_servers() {
        let url = serve_once(
            "200 OK",
            r#"[{"id": 5, "name": "Gatari", "devserver": "gatari.pw", "players": 40}]"#,
        );

        let client = DirectoryClient::new(url).unwrap();
        let servers = client.spawn_fetch().join().unwrap().unwrap();

        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "Gatari");
    }

    #[test]
    fn test_error_status_is_network_error() {
        let url = serve_once("503 Service Unavailable", r#"[]"#);

        let err = DirectoryClient::new(url).unwrap().fetch_servers().unwrap_err();

        assert!(matches!(err, Error::Network(ref msg) if msg.contains("503")));
    }

    #[test]
    fn test_transport_failure_is_network_error() {
        // nothing listens on the discard port
        let client = DirectoryClient::new("http://127.0.0.1:9/servers").unwrap();

        let err = client.fetch_servers().unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_slow_catalog_is_awaited() {
        let client = DirectoryClient::new(serve_once_after(
            Duration::from_secs(2),
            "200 OK",
            r#"[{"id": 9, "name": "Kurikku", "devserver": "kurikku.pw"}]"#,
        ))
        .unwrap();

        let servers = client.fetch_servers().unwrap();
        assert_eq!(servers[0].id, 9);
    }
}
