use std::sync::OnceLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::time::Duration;

use crate::aggregator::AggregatorPatch;
use crate::config::get_backend_config;
use crate::error::PlanError;
use crate::plan::PlanDocument;

/// Seam over the REST backend so the cache and facade can run against an
/// in-memory fake in tests.
#[async_trait]
pub trait PlanBackend: Send + Sync {
    async fn plan_document(&self, plan_id: &str) -> Result<PlanDocument, PlanError>;

    async fn activity_time(&self, activity_id: &str, kind: &str) -> Result<u64, PlanError>;

    async fn subchapter_status(
        &self,
        user_id: &str,
        plan_id: &str,
        sub_chapter_id: &str,
    ) -> Result<AggregatorPatch, PlanError>;

    /// Add elapsed seconds to an activity's counter; returns the new total.
    async fn record_activity_time(
        &self,
        activity_id: &str,
        kind: &str,
        delta_secs: u64,
    ) -> Result<u64, PlanError>;
}

/// Reusable HTTP client singleton (created once, reused for all requests)
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn get_http_client() -> &'static Client {
    HTTP_CLIENT.get_or_init(|| {
        let timeout = get_backend_config().request_timeout_secs;
        Client::builder()
            .timeout(Duration::from_secs(timeout))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client")
    })
}

pub struct HttpBackend {
    base_url: String,
}

impl HttpBackend {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        HttpBackend {
            base_url: base_url.into(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(get_backend_config().base_url.clone())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = get_http_client()
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Backend returned {} for {}", response.status(), url);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response from {}", url))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = get_http_client()
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach backend at {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Backend returned {} for {}", response.status(), url);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response from {}", url))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlanResponse {
    plan_doc: PlanDocument,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TimeResponse {
    total_time: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeIncrementBody<'a> {
    activity_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    increment: u64,
}

fn require(value: &str, name: &'static str) -> Result<(), PlanError> {
    if value.trim().is_empty() {
        return Err(
            PlanError::new(format!("Missing required identifier: {}", name), "validate")
                .with_context("request short-circuited before any network call"),
        );
    }
    Ok(())
}

fn fetch_error(err: anyhow::Error, what: &str) -> PlanError {
    PlanError::new(format!("{:#}", err), "fetch").with_context(what.to_string())
}

#[async_trait]
impl PlanBackend for HttpBackend {
    async fn plan_document(&self, plan_id: &str) -> Result<PlanDocument, PlanError> {
        require(plan_id, "planId")?;
        let response: PlanResponse = self
            .get_json("/api/adaptive-plan", &[("planId", plan_id)])
            .await
            .map_err(|e| fetch_error(e, "adaptive-plan"))?;
        Ok(response.plan_doc)
    }

    async fn activity_time(&self, activity_id: &str, kind: &str) -> Result<u64, PlanError> {
        require(activity_id, "activityId")?;
        let response: TimeResponse = self
            .get_json(
                "/api/getActivityTime",
                &[("activityId", activity_id), ("type", kind)],
            )
            .await
            .map_err(|e| fetch_error(e, "getActivityTime"))?;
        Ok(response.total_time)
    }

    async fn subchapter_status(
        &self,
        user_id: &str,
        plan_id: &str,
        sub_chapter_id: &str,
    ) -> Result<AggregatorPatch, PlanError> {
        require(user_id, "userId")?;
        require(plan_id, "planId")?;
        require(sub_chapter_id, "subchapterId")?;
        self.get_json(
            "/subchapter-status",
            &[
                ("userId", user_id),
                ("planId", plan_id),
                ("subchapterId", sub_chapter_id),
            ],
        )
        .await
        .map_err(|e| fetch_error(e, "subchapter-status"))
    }

    async fn record_activity_time(
        &self,
        activity_id: &str,
        kind: &str,
        delta_secs: u64,
    ) -> Result<u64, PlanError> {
        require(activity_id, "activityId")?;
        let response: TimeResponse = self
            .post_json(
                "/api/incrementActivityTime",
                &TimeIncrementBody {
                    activity_id,
                    kind,
                    increment: delta_secs,
                },
            )
            .await
            .map_err(|e| fetch_error(e, "incrementActivityTime"))?;
        Ok(response.total_time)
    }
}
