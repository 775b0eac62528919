//! Engine round trips against a local mock HTTP/1.1 server.
//!
//! Exercises the plain-TCP path end to end: request-line formatting, header
//! emission order, cookie folding, user-agent forcing, redirects, and both
//! content-length and chunked response bodies.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use wraith::{Client, Cookie, Options};

/// One-shot mock server: accepts a single connection, captures the raw
/// request head, answers with the canned response.
async fn mock_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            let n = socket.read(&mut byte).await.unwrap();
            if n == 0 {
                break;
            }
            head.push(byte[0]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        String::from_utf8_lossy(&head).into_owned()
    });

    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn get_with_content_length_body() {
    let (base, server) = mock_server(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello",
    )
    .await;

    let client = Client::new();
    let response = client.send(&base, Options::new(), "GET").await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.text().unwrap(), "hello");
    assert_eq!(response.header("content-type"), Some("text/plain"));

    let head = server.await.unwrap();
    assert!(head.starts_with("GET / HTTP/1.1\r\n"));
}

#[tokio::test]
async fn chunked_response_bodies_are_decoded() {
    let (base, _server) = mock_server(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    )
    .await;

    let client = Client::new();
    let response = client.send(&base, Options::new(), "GET").await.unwrap();
    assert_eq!(response.text().unwrap(), "hello world");
}

#[tokio::test]
async fn header_order_cookies_and_user_agent_reach_the_wire() {
    let (base, server) =
        mock_server("HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n").await;

    let mut options = Options::new();
    options.headers.set("Accept", "*/*");
    options.headers.set("X-Token", "t");
    options.user_agent = "test-agent/1.0".to_string();
    options.cookies = vec![Cookie::new("sid", "42"), Cookie::new("theme", "dark")];
    options.header_order = Some(vec![
        "user-agent".to_string(),
        "x-token".to_string(),
        "accept".to_string(),
        "cookie".to_string(),
    ]);

    let client = Client::new();
    let response = client.send(&base, options, "GET").await.unwrap();
    assert_eq!(response.status, 204);

    let head = server.await.unwrap();
    let ua_pos = head.find("User-Agent: test-agent/1.0").unwrap();
    let token_pos = head.find("X-Token: t").unwrap();
    let accept_pos = head.find("Accept: */*").unwrap();
    let cookie_pos = head.find("Cookie: sid=42; theme=dark").unwrap();
    assert!(ua_pos < token_pos && token_pos < accept_pos && accept_pos < cookie_pos);
}

#[tokio::test]
async fn post_body_carries_content_length() {
    let (base, server) =
        mock_server("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;

    let mut options = Options::new();
    options.body = b"name=value".to_vec();

    let client = Client::new();
    let response = client.send(&base, options, "post").await.unwrap();
    assert_eq!(response.status, 200);

    let head = server.await.unwrap();
    assert!(head.starts_with("POST / HTTP/1.1\r\n"));
    assert!(head.contains("Content-Length: 10\r\n"));
}

#[tokio::test]
async fn redirects_are_followed_and_method_rewritten() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut request_lines = Vec::new();
        for response in [
            format!(
                "HTTP/1.1 302 Found\r\nLocation: http://{addr}/next\r\nContent-Length: 0\r\n\r\n"
            ),
            "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone".to_string(),
        ] {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut byte = [0u8; 1];
            while !head.ends_with(b"\r\n\r\n") {
                if socket.read(&mut byte).await.unwrap() == 0 {
                    break;
                }
                head.push(byte[0]);
            }
            request_lines.push(
                String::from_utf8_lossy(&head)
                    .lines()
                    .next()
                    .unwrap()
                    .to_string(),
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        }
        request_lines
    });

    let mut options = Options::new();
    options.body = b"payload".to_vec();

    let client = Client::new();
    let response = client
        .send(&format!("http://{addr}/start"), options, "POST")
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text().unwrap(), "done");

    let lines = server.await.unwrap();
    assert_eq!(lines[0], "POST /start HTTP/1.1");
    // 302 turns the replay into a bodyless GET.
    assert_eq!(lines[1], "GET /next HTTP/1.1");
}

#[tokio::test]
async fn disable_redirect_returns_the_redirect_response() {
    let (base, _server) = mock_server(
        "HTTP/1.1 301 Moved Permanently\r\nLocation: https://example.com/\r\nContent-Length: 0\r\n\r\n",
    )
    .await;

    let mut options = Options::new();
    options.disable_redirect = true;

    let client = Client::new();
    let response = client.send(&base, options, "GET").await.unwrap();
    assert_eq!(response.status, 301);
    assert_eq!(response.redirect_url(), Some("https://example.com/"));
}

#[tokio::test]
async fn concurrent_requests_all_succeed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut byte = [0u8; 1];
                while !head.ends_with(b"\r\n\r\n") {
                    match socket.read(&mut byte).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => head.push(byte[0]),
                    }
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                    .await;
            });
        }
    });

    let client = Client::new();
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let url = format!("http://{addr}/");
        tasks.push(tokio::spawn(async move {
            client.send(&url, Options::new(), "GET").await
        }));
    }
    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }
}

#[tokio::test]
async fn timeout_aborts_a_stalled_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and then never respond.
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    });

    let mut options = Options::new();
    options.timeout_seconds = 1;

    let client = Client::new();
    let err = client
        .send(&format!("http://{addr}/"), options, "GET")
        .await
        .unwrap_err();
    assert!(matches!(err, wraith::Error::Timeout));
}
