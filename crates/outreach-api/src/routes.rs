//! API routes

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{campaigns, health};

/// Create the API router
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let state = Arc::new(state);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .with_state(state.clone());

    // Campaign routes
    let campaign_routes = Router::new()
        .route("/:campaign_id", get(campaigns::get_campaign))
        .route("/:campaign_id/send", post(campaigns::send_batch))
        .route("/:campaign_id/send-all", post(campaigns::send_all))
        .route("/:campaign_id/reset", post(campaigns::reset_campaign))
        .route("/:campaign_id/stop", post(campaigns::stop_campaign));

    // API v1 routes with authentication
    let api_v1 = Router::new()
        .nest("/campaigns", campaign_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins)),
        )
}

/// CORS for the configured origins. No origins means same-origin only.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_token, USER_ID_HEADER};
    use async_trait::async_trait;
    use axum::http::{HeaderName, StatusCode};
    use axum_test::TestServer;
    use outreach_core::personalize::{AiProvider, EmailGenerationInput, EmailGenerator, GeneratedEmail};
    use outreach_core::smtp::{MailTransport, OutgoingEmail, SmtpServerConfig, TlsMode};
    use outreach_core::{
        BatchOrchestrator, CampaignDriver, DriverSettings, GenerationError, OrchestratorSettings,
        TransportError,
    };
    use outreach_storage::models::{Campaign, CampaignRecipient, CampaignStatus, UserSettings};
    use outreach_storage::{MemoryStore, RecipientStore};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::time::Duration;
    use uuid::Uuid;

    struct CannedGenerator;

    #[async_trait]
    impl EmailGenerator for CannedGenerator {
        async fn generate(
            &self,
            _provider: &AiProvider,
            _input: &EmailGenerationInput,
        ) -> Result<GeneratedEmail, GenerationError> {
            Ok(GeneratedEmail {
                subject: "Quick question".to_string(),
                body: "Hi there".to_string(),
            })
        }
    }

    struct AcceptingTransport;

    #[async_trait]
    impl MailTransport for AcceptingTransport {
        async fn send(
            &self,
            _email: &OutgoingEmail,
            _server: &SmtpServerConfig,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct Harness {
        server: TestServer,
        store: Arc<MemoryStore>,
        campaign_id: Uuid,
        user_id: Uuid,
    }

    async fn harness(token_hashes: Vec<String>, smtp_password: Option<&str>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let campaign = Campaign::new(user_id, "API");
        let campaign_id = campaign.id;
        store.insert_campaign(campaign).await;
        store
            .insert_settings(UserSettings {
                user_id,
                smtp_host: Some("smtp.vendor.test".to_string()),
                smtp_username: Some("sales@vendor.test".to_string()),
                smtp_password: smtp_password.map(str::to_string),
                openai_api_key: Some("sk-test".to_string()),
                ..Default::default()
            })
            .await;
        for i in 0..2 {
            let mut r = CampaignRecipient::from_contact(
                campaign_id,
                Uuid::new_v4(),
                format!("lead{}@acme.test", i),
                None,
            );
            r.created_at = r.created_at - chrono::Duration::seconds(10 - i);
            store.insert_recipient(r).await;
        }

        let orchestrator = BatchOrchestrator::new(
            store.clone(),
            store.clone(),
            Arc::new(AcceptingTransport),
            Arc::new(CannedGenerator),
            OrchestratorSettings {
                batch_size: Some(25),
                progress_interval: 5,
                delay_after_success: Duration::ZERO,
                delay_after_failure: Duration::ZERO,
                tls: TlsMode::None,
            },
        );
        let driver = CampaignDriver::new(orchestrator.clone(), DriverSettings::default());
        let app = create_router(
            AppState {
                orchestrator,
                driver,
                db_pool: None,
                service_token_hashes: token_hashes,
            },
            &["https://app.example.com".to_string()],
        );

        Harness {
            server: TestServer::new(app).unwrap(),
            store,
            campaign_id,
            user_id,
        }
    }

    fn user_header(user_id: Uuid) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_str(&user_id.to_string()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let h = harness(Vec::new(), Some("s3cret")).await;

        let response = h.server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "healthy");

        h.server.get("/health/live").await.assert_status_ok();
        h.server.get("/health/ready").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_requires_user_header() {
        let h = harness(Vec::new(), Some("s3cret")).await;

        let response = h
            .server
            .get(&format!("/api/v1/campaigns/{}", h.campaign_id))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_service_token() {
        let h = harness(vec![hash_token("svc-token")], Some("s3cret")).await;
        let (name, value) = user_header(h.user_id);
        let path = format!("/api/v1/campaigns/{}", h.campaign_id);

        let response = h
            .server
            .get(&path)
            .add_header(name.clone(), value.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

        let response = h
            .server
            .get(&path)
            .add_header(name.clone(), value.clone())
            .add_header(
                HeaderName::from_static("authorization"),
                HeaderValue::from_static("Bearer wrong"),
            )
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

        let response = h
            .server
            .get(&path)
            .add_header(name, value)
            .add_header(
                HeaderName::from_static("authorization"),
                HeaderValue::from_static("Bearer svc-token"),
            )
            .await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_send_batch_then_conflict() {
        let h = harness(Vec::new(), Some("s3cret")).await;
        let (name, value) = user_header(h.user_id);
        let path = format!("/api/v1/campaigns/{}/send", h.campaign_id);

        let response = h
            .server
            .post(&path)
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let report = response.json::<Value>();
        assert_eq!(report["success"], true);
        assert_eq!(report["total"], 2);
        assert_eq!(report["sent"], 2);
        assert_eq!(report["failed"], 0);
        assert_eq!(report["has_more"], false);

        let response = h.server.post(&path).add_header(name, value).await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["error"], "already_completed");
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_not_found() {
        let h = harness(Vec::new(), Some("s3cret")).await;
        let (name, value) = user_header(h.user_id);

        let response = h
            .server
            .post(&format!("/api/v1/campaigns/{}/send", Uuid::new_v4()))
            .add_header(name, value)
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_configuration_lists_fields() {
        let h = harness(Vec::new(), None).await;
        let (name, value) = user_header(h.user_id);

        let response = h
            .server
            .post(&format!("/api/v1/campaigns/{}/send", h.campaign_id))
            .add_header(name, value)
            .await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.json::<Value>();
        assert_eq!(body["error"], "missing_configuration");
        assert_eq!(body["fields"], json!(["smtp_password"]));
    }

    #[tokio::test]
    async fn test_stop_reset_and_progress() {
        let h = harness(Vec::new(), Some("s3cret")).await;
        let (name, value) = user_header(h.user_id);
        let base = format!("/api/v1/campaigns/{}", h.campaign_id);

        h.server
            .post(&format!("{}/send", base))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();

        let response = h
            .server
            .post(&format!("{}/reset", base))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "scope": "all" }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["reset"], 2);

        let response = h
            .server
            .post(&format!("{}/stop", base))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "completed");

        let response = h.server.get(&base).add_header(name, value).await;
        response.assert_status_ok();
        let progress = response.json::<Value>();
        assert_eq!(progress["status"], "completed");
        assert_eq!(progress["emails_sent"], 0);
        assert_eq!(progress["recipients"]["pending"], 2);
    }

    #[tokio::test]
    async fn test_send_all_is_accepted_and_completes() {
        let h = harness(Vec::new(), Some("s3cret")).await;
        let (name, value) = user_header(h.user_id);

        let response = h
            .server
            .post(&format!("/api/v1/campaigns/{}/send-all", h.campaign_id))
            .add_header(name, value)
            .await;
        assert_eq!(response.status_code(), StatusCode::ACCEPTED);
        assert_eq!(response.json::<Value>()["status"], "accepted");

        let mut status = CampaignStatus::NotStarted;
        for _ in 0..100 {
            status = h.store.campaign_status(h.campaign_id).await.unwrap();
            if status == CampaignStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, CampaignStatus::Completed);
    }
}
