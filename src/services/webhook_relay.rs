use std::{
    error::Error as _,
    io,
    time::{Duration, Instant},
};

use reqwest::Client;
use serde_json::{json, Value};

use crate::{
    configuration::WebhookSettings,
    domain::{
        extracted_record::ExtractedRecord, search_kind::SearchKind, search_request::SearchQuery,
        site_profile::SiteProfile,
    },
    error::RelayError,
    services::envelope::{decode_body, normalize},
};

const ERROR_BODY_PREVIEW: usize = 200;
const INCOMPLETE_MESSAGE: &str = "connection closed before message completed";

#[derive(Debug)]
pub enum RelayOutcome {
    Enriched(Value),
    /// No webhook is configured for this kind.
    Skipped,
    /// The call failed. The caller still holds whatever it sent.
    Failed(RelayError),
}

/// Forwards searches to the external workflow and normalizes its answers.
pub struct WebhookRelay {
    client: Client,
    settings: WebhookSettings,
    deadline: Duration,
}

impl WebhookRelay {
    pub fn new(settings: WebhookSettings) -> Self {
        let deadline = Duration::from_secs(settings.timeout_secs);
        WebhookRelay {
            client: Client::new(),
            settings,
            deadline,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn endpoint(&self, kind: SearchKind) -> Option<&str> {
        match kind {
            SearchKind::Jobs => self.settings.jobs_url.as_deref(),
            SearchKind::Internships => self.settings.internships_url.as_deref(),
            SearchKind::Colleges => self.settings.colleges_url.as_deref(),
        }
    }

    pub async fn relay(
        &self,
        kind: SearchKind,
        query: &SearchQuery,
        records: &[ExtractedRecord],
    ) -> RelayOutcome {
        let Some(endpoint) = self.endpoint(kind) else {
            log::info!("[{}] No webhook configured, skipping relay", kind);
            return RelayOutcome::Skipped;
        };

        let payload = build_payload(kind, query, records);
        let started = Instant::now();

        match self.call(endpoint, &payload).await {
            Ok(value) => {
                log::info!(
                    "[{}] Webhook answered after {:.2}s",
                    kind,
                    started.elapsed().as_secs_f64()
                );
                RelayOutcome::Enriched(normalize(value))
            }
            Err(error) => {
                log::error!(
                    "[{}] Webhook failed after {:.2}s: {}",
                    kind,
                    started.elapsed().as_secs_f64(),
                    error
                );
                RelayOutcome::Failed(error)
            }
        }
    }

    /// POSTs the payload and reads the body, all under the relay deadline.
    async fn call(&self, endpoint: &str, payload: &Value) -> Result<Value, RelayError> {
        let exchange = async {
            let response = self
                .client
                .post(endpoint)
                .json(payload)
                .send()
                .await
                .map_err(classify)?;

            let status = response.status();
            let text = response.text().await.map_err(classify)?;
            log::info!("Webhook status {}, raw response length {}", status, text.len());

            if !status.is_success() {
                return Err(RelayError::Status {
                    status: status.as_u16(),
                    body: text.chars().take(ERROR_BODY_PREVIEW).collect(),
                });
            }

            decode_body(&text)
        };

        tokio::time::timeout(self.deadline, exchange)
            .await
            .map_err(|_| RelayError::Timeout(self.deadline))?
    }
}

fn classify(error: reqwest::Error) -> RelayError {
    if error.is_connect() {
        RelayError::Connect(format!("{:?}", error))
    } else if was_hung_up(&error) {
        RelayError::Reset(error.to_string())
    } else {
        RelayError::Http(error)
    }
}

/// The peer dropped an established connection: a reset socket, or a
/// response cut off before it was complete.
fn was_hung_up(error: &reqwest::Error) -> bool {
    std::iter::successors(error.source(), |e| (**e).source()).any(|cause| {
        let reset = cause.downcast_ref::<io::Error>().is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        });
        reset || cause.to_string().contains(INCOMPLETE_MESSAGE)
    })
}

pub fn build_payload(kind: SearchKind, query: &SearchQuery, records: &[ExtractedRecord]) -> Value {
    match SiteProfile::for_kind(kind) {
        Some(profile) if kind.pre_scrapes() => {
            let mut payload = json!({
                "role": query.role(),
                "city": query.city,
                "url": profile.target_url(query),
            });
            if !records.is_empty() {
                payload["scraped_data"] = json!(records);
            }
            payload
        }
        _ => json!({
            "city": query.city,
            "course": query.course(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::{net::TcpListener, time::Duration};

    use actix_web::{web, App, HttpResponse, HttpServer};
    use serde_json::{json, Value};
    use tokio::io::AsyncReadExt;

    use super::{build_payload, RelayOutcome, WebhookRelay};
    use crate::{
        configuration::WebhookSettings,
        domain::{
            extracted_record::ExtractedRecord, search_kind::SearchKind, search_request::SearchQuery,
        },
        error::RelayError,
    };

    /// Starts a webhook stand-in on a random port and returns its base URL.
    fn spawn_webhook() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();

        let server = HttpServer::new(|| {
            App::new()
                .route(
                    "/enveloped",
                    web::post().to(|| async {
                        HttpResponse::Ok().body(
                            r#"[{"output": "```json\n{\"jobs\": [{\"title\": \"SRE\"}], \"summary\": \"one match\"}\n```"}]"#,
                        )
                    }),
                )
                .route(
                    "/echo",
                    web::post().to(|body: web::Json<Value>| async move {
                        HttpResponse::Ok().json(body.into_inner())
                    }),
                )
                .route("/empty", web::post().to(|| async { HttpResponse::Ok().finish() }))
                .route(
                    "/broken",
                    web::post().to(|| async { HttpResponse::BadGateway().body("upstream down") }),
                )
                .route(
                    "/slow",
                    web::post().to(|| async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        HttpResponse::Ok().json(json!({"late": true}))
                    }),
                )
        })
        .listen(listener)
        .expect("Failed to listen")
        .run();
        tokio::spawn(server);

        format!("http://127.0.0.1:{}", port)
    }

    fn relay(base: &str, jobs: &str, colleges: &str) -> WebhookRelay {
        WebhookRelay::new(WebhookSettings {
            jobs_url: Some(format!("{}{}", base, jobs)),
            internships_url: None,
            colleges_url: Some(format!("{}{}", base, colleges)),
            timeout_secs: 600,
        })
    }

    fn records() -> Vec<ExtractedRecord> {
        vec![ExtractedRecord {
            title: "Backend Engineer".to_string(),
            organization: "Initech".to_string(),
            location: "Pune".to_string(),
            compensation: None,
            link: None,
            raw_text: "Backend Engineer | Initech | Pune | Full-time".to_string(),
        }]
    }

    fn job_query() -> SearchQuery {
        SearchQuery {
            role: Some("Backend Engineer".to_string()),
            city: "Pune".to_string(),
            course: None,
        }
    }

    fn college_query() -> SearchQuery {
        SearchQuery {
            role: None,
            city: "Pune".to_string(),
            course: Some("B.Tech".to_string()),
        }
    }

    #[tokio::test]
    async fn enveloped_jobs_response_is_normalized() {
        let base = spawn_webhook();

        let outcome = relay(&base, "/enveloped", "/echo")
            .relay(SearchKind::Jobs, &job_query(), &records())
            .await;

        match outcome {
            RelayOutcome::Enriched(value) => assert_eq!(
                value,
                json!({"results": [{"title": "SRE"}], "answer": "one match"})
            ),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn jobs_payload_carries_records_and_url() {
        let base = spawn_webhook();

        let outcome = relay(&base, "/echo", "/echo")
            .relay(SearchKind::Jobs, &job_query(), &records())
            .await;

        let RelayOutcome::Enriched(value) = outcome else {
            panic!("unexpected outcome: {:?}", outcome);
        };
        assert_eq!(value["role"], "Backend Engineer");
        assert_eq!(
            value["url"],
            "https://in.indeed.com/jobs?q=Backend+Engineer&l=Pune&fromage=1&radius=25"
        );
        assert_eq!(value["scraped_data"][0]["title"], "Backend Engineer");
    }

    #[tokio::test]
    async fn colleges_payload_is_query_only() {
        let base = spawn_webhook();

        let outcome = relay(&base, "/echo", "/echo")
            .relay(SearchKind::Colleges, &college_query(), &[])
            .await;

        let RelayOutcome::Enriched(value) = outcome else {
            panic!("unexpected outcome: {:?}", outcome);
        };
        assert_eq!(value, json!({"city": "Pune", "course": "B.Tech"}));
    }

    #[tokio::test]
    async fn slow_webhook_times_out() {
        let base = spawn_webhook();

        let outcome = relay(&base, "/slow", "/echo")
            .with_deadline(Duration::from_millis(200))
            .relay(SearchKind::Jobs, &job_query(), &records())
            .await;

        match outcome {
            RelayOutcome::Failed(error) => {
                assert!(matches!(error, RelayError::Timeout(_)));
                assert!(error
                    .user_message()
                    .starts_with("Request timed out after 200 milliseconds"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_body_and_bad_status_fail() {
        let base = spawn_webhook();

        let empty = relay(&base, "/empty", "/broken")
            .relay(SearchKind::Jobs, &job_query(), &records())
            .await;
        let broken = relay(&base, "/empty", "/broken")
            .relay(SearchKind::Colleges, &college_query(), &[])
            .await;

        assert!(matches!(empty, RelayOutcome::Failed(RelayError::EmptyBody)));
        match broken {
            RelayOutcome::Failed(RelayError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_webhook_is_a_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let outcome = relay(&format!("http://127.0.0.1:{}", port), "/x", "/x")
            .relay(SearchKind::Jobs, &job_query(), &records())
            .await;

        assert!(matches!(outcome, RelayOutcome::Failed(RelayError::Connect(_))));
    }

    #[tokio::test]
    async fn hang_up_after_accept_is_a_reset() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                drop(stream);
            }
        });

        let outcome = relay(&format!("http://127.0.0.1:{}", port), "/x", "/x")
            .relay(SearchKind::Jobs, &job_query(), &records())
            .await;

        match outcome {
            RelayOutcome::Failed(error @ RelayError::Reset(_)) => assert_eq!(
                error.user_message(),
                "Connection was reset by the server. The workflow may have crashed or timed out."
            ),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn kinds_without_endpoint_are_skipped() {
        let outcome = relay("http://127.0.0.1:1", "/x", "/x")
            .relay(SearchKind::Internships, &job_query(), &records())
            .await;

        assert!(matches!(outcome, RelayOutcome::Skipped));
    }

    #[test]
    fn empty_scrape_omits_scraped_data() {
        let payload = build_payload(SearchKind::Internships, &job_query(), &[]);

        assert!(payload.get("scraped_data").is_none());
        assert_eq!(
            payload["url"],
            "https://internshala.com/internships/backend-engineer-internship-in-pune/"
        );
    }
}
