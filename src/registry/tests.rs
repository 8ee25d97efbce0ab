//! Registry Module Tests
//!
//! ## Test Scopes
//! - **NodeRegistry**: Registration, uniqueness, dial failures, snapshots.
//! - **HTTP handlers**: `/register` status codes and `/clients` listing.
//! - **Registration client**: A node announcing itself to a served coordinator.

#[cfg(test)]
mod tests {
    use crate::app::{Coordinator, CoordinatorOptions};
    use crate::error::TransferError;
    use crate::metadata::memory::MemoryMetadataStore;
    use crate::registry::client::register_with_coordinator;
    use crate::registry::service::NodeRegistry;
    use crate::registry::types::{REGISTERED_OK, RegisterRequest};
    use crate::testing::TestNode;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const DIAL: Duration = Duration::from_secs(2);

    fn coordinator(registry: Arc<NodeRegistry>) -> Coordinator {
        Coordinator::new(
            registry,
            Arc::new(MemoryMetadataStore::new()),
            &CoordinatorOptions {
                chunk_size: 1024,
                max_upload_size: 1024 * 1024,
                fetch_timeout: Duration::from_secs(5),
                session_timeout: Duration::from_secs(5),
            },
        )
    }

    fn register_request(name: &str, address: &str) -> Request<Body> {
        let body = serde_json::to_vec(&RegisterRequest {
            service_name: name.to_string(),
            grpc_address: address.to_string(),
        })
        .unwrap();
        Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    // ============================================================
    // NODE REGISTRY
    // ============================================================

    #[tokio::test]
    async fn test_register_then_lookup() {
        let mut node = TestNode::spawn("node-a").await;
        let registry = NodeRegistry::new(DIAL);

        assert!(registry.is_empty());
        registry.register("node-a", &node.address()).await.unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("node-a").is_some());
        assert!(registry.lookup("node-b").is_none());
        assert_eq!(registry.list_names(), vec!["node-a".to_string()]);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_name_is_conflict_and_first_wins() {
        let mut first = TestNode::spawn("node-a").await;
        let mut second = TestNode::spawn("node-a").await;
        let registry = NodeRegistry::new(DIAL);

        registry.register("node-a", &first.address()).await.unwrap();
        let result = registry.register("node-a", &second.address()).await;
        assert!(matches!(result, Err(TransferError::Conflict(_))));

        let nodes = registry.list_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address, first.address());

        first.stop().await;
        second.stop().await;
    }

    #[tokio::test]
    async fn test_unreachable_address_registers_nothing() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let registry = NodeRegistry::new(DIAL);
        let result = registry.register("ghost", &addr.to_string()).await;

        assert!(matches!(result, Err(TransferError::Upstream { .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_input_is_bad_request() {
        let registry = NodeRegistry::new(DIAL);

        assert!(matches!(
            registry.register("", "127.0.0.1:5001").await,
            Err(TransferError::BadRequest(_))
        ));
        assert!(matches!(
            registry.register("node-a", "").await,
            Err(TransferError::BadRequest(_))
        ));
        assert!(matches!(
            registry.register("node-a", "not a valid address").await,
            Err(TransferError::BadRequest(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_same_name_single_winner() {
        let mut node = TestNode::spawn("node-a").await;
        let registry = NodeRegistry::new(DIAL);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let address = node.address();
            handles.push(tokio::spawn(async move {
                registry.register("node-a", &address).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => winners += 1,
                Err(TransferError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_snapshots_are_sorted_and_detached() {
        let mut b = TestNode::spawn("node-b").await;
        let mut a = TestNode::spawn("node-a").await;
        let registry = NodeRegistry::new(DIAL);
        registry.register("node-b", &b.address()).await.unwrap();
        registry.register("node-a", &a.address()).await.unwrap();

        let snapshot = registry.connections();
        let names = registry.list_names();
        assert_eq!(names, vec!["node-a".to_string(), "node-b".to_string()]);

        let mut c = TestNode::spawn("node-c").await;
        registry.register("node-c", &c.address()).await.unwrap();

        // Later registrations do not leak into an existing snapshot.
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 3);

        a.stop().await;
        b.stop().await;
        c.stop().await;
    }

    // ============================================================
    // HTTP HANDLERS
    // ============================================================

    #[tokio::test]
    async fn test_register_endpoint_status_codes() {
        let mut node = TestNode::spawn("node-a").await;
        let app = coordinator(NodeRegistry::new(DIAL)).router();

        let resp = app
            .clone()
            .oneshot(register_request("node-a", &node.address()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, REGISTERED_OK.as_bytes());

        let resp = app
            .clone()
            .oneshot(register_request("node-a", &node.address()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .clone()
            .oneshot(register_request("node-b", "not a valid address"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(Request::builder().uri("/clients").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let names: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(names, vec!["node-a".to_string()]);

        node.stop().await;
    }

    // ============================================================
    // REGISTRATION CLIENT
    // ============================================================

    #[tokio::test]
    async fn test_node_registers_with_served_coordinator() {
        let mut node = TestNode::spawn("node-a").await;
        let registry = NodeRegistry::new(DIAL);
        let app = coordinator(registry.clone()).router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let http = reqwest::Client::new();
        let request = RegisterRequest {
            service_name: "node-a".to_string(),
            grpc_address: node.address(),
        };

        register_with_coordinator(&http, &url, &request, 3).await.unwrap();
        assert_eq!(registry.list_names(), vec!["node-a".to_string()]);

        // A conflict is final and not retried.
        let result = register_with_coordinator(&http, &url, &request, 3).await;
        assert!(matches!(result, Err(TransferError::Conflict(_))));

        server.abort();
        node.stop().await;
    }

    #[tokio::test]
    async fn test_unreachable_coordinator_exhausts_attempts() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let request = RegisterRequest {
            service_name: "node-a".to_string(),
            grpc_address: "127.0.0.1:5001".to_string(),
        };
        let result = register_with_coordinator(&reqwest::Client::new(), &url, &request, 2).await;
        assert!(matches!(result, Err(TransferError::Upstream { .. })));
    }
}
