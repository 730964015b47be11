//! Integration tests for the proctoring HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use futures::{SinkExt, Stream, StreamExt};
    use proctor_agent::server::{run, ServerConfig};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::{self, Message};

    /// Next text reply on the stream, parsed as JSON.
    async fn next_reply<S>(ws: &mut S) -> serde_json::Value
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("Timed out waiting for reply")
                .expect("Stream closed")
                .expect("Stream error");
            if let Message::Text(text) = message {
                return serde_json::from_str(&text).expect("Failed to parse reply");
            }
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        // Random port, no recording backend
        let config = ServerConfig::new(0, None);

        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());
        assert_eq!(body["activeSessions"], 0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_analyze_frame_reports_multiple_faces() {
        let config = ServerConfig::new(0, None);
        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let frame = serde_json::json!({
            "interviewId": "iv-http-1",
            "faces": [{}, {}],
            "detections": [],
            "timestamp": 1_767_261_600.0
        });

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/analyze_frame", addr))
            .json(&frame)
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["success"], true);
        assert_eq!(body["timestamp"], 1_767_261_600.0);

        let events = body["events"].as_array().expect("events array");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["eventType"], "multiple_faces");
        assert_eq!(events[0]["interviewId"], "iv-http-1");
        assert_eq!(events[0]["metadata"]["faceCount"], 2);

        // Same frame again inside the cooldown window
        let response = client
            .post(format!("http://{}/analyze_frame", addr))
            .json(&frame)
            .send()
            .await
            .expect("Failed to send request");
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert!(body["events"].as_array().expect("events array").is_empty());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_analyze_frame_rejects_bad_requests() {
        let config = ServerConfig::new(0, None);
        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{}/analyze_frame", addr))
            .json(&serde_json::json!({ "faces": [] }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status().as_u16(), 400);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "INVALID_FRAME");

        let response = client
            .post(format!("http://{}/analyze_frame", addr))
            .json(&serde_json::json!({ "interviewId": "  ", "faces": [] }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status().as_u16(), 400);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "MISSING_INTERVIEW_ID");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let config = ServerConfig::new(0, None);
        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let session_url = format!("http://{}/sessions/iv-life", addr);
        let stats_url = format!("http://{}/sessions/iv-life/stats", addr);

        let response = client.get(&stats_url).send().await.expect("Failed to send request");
        assert_eq!(response.status().as_u16(), 404);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "UNKNOWN_SESSION");

        let response = client.post(&session_url).send().await.expect("Failed to send request");
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["interviewId"], "iv-life");
        assert_eq!(body["active"], true);

        let response = client.get(&stats_url).send().await.expect("Failed to send request");
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["totalEvents"], 0);
        assert_eq!(body["currentlyFocused"], true);

        let response = client
            .delete(&session_url)
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["active"], false);

        let response = client.get(&stats_url).send().await.expect("Failed to send request");
        assert_eq!(response.status().as_u16(), 404);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_stream_answers_every_frame() {
        let config = ServerConfig::new(0, None);
        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::new();
        let stats_url = format!("http://{}/sessions/iv-ws/stats", addr);

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/stream/iv-ws", addr))
            .await
            .expect("Failed to connect stream");

        let frame = serde_json::json!({
            "faces": [{}, {}],
            "detections": [],
            "timestamp": 1_767_261_600.0
        });
        ws.send(Message::Text(frame.to_string()))
            .await
            .expect("Failed to send frame");

        let reply = next_reply(&mut ws).await;
        assert_eq!(reply["type"], "events");
        assert_eq!(reply["frameProcessed"], true);
        assert_eq!(reply["timestamp"], 1_767_261_600.0);
        assert!(reply.get("error").is_none());
        let events = reply["events"].as_array().expect("events array");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["eventType"], "multiple_faces");
        assert_eq!(events[0]["interviewId"], "iv-ws");

        // The stream opened the session
        let response = client.get(&stats_url).send().await.expect("Failed to send request");
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["totalEvents"], 1);

        ws.send(Message::Text("not a frame".to_string()))
            .await
            .expect("Failed to send frame");
        let reply = next_reply(&mut ws).await;
        assert_eq!(reply["type"], "events");
        assert_eq!(reply["frameProcessed"], false);
        assert!(reply["events"].as_array().expect("events array").is_empty());
        assert!(reply["error"].as_str().is_some());

        ws.close(None).await.expect("Failed to close stream");

        // Closing the stream ends the session
        let mut status = 0;
        for _ in 0..40 {
            let response = client.get(&stats_url).send().await.expect("Failed to send request");
            status = response.status().as_u16();
            if status == 404 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(status, 404);

        let _ = shutdown_tx.send(());
    }
}
