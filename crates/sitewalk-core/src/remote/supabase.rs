//! Supabase (PostgREST) implementation of the remote adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RemoteAdapter, RemoteError, RemoteResult};
use crate::config::RemoteConfig;
use crate::models::{InspectionLog, Site};

const SITES_TABLE: &str = "sites";
const INSPECTIONS_TABLE: &str = "inspections";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Clone)]
pub struct SupabaseRemote {
    rest_url: String,
    anon_key: String,
    client: Client,
}

impl std::fmt::Debug for SupabaseRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseRemote")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct SiteRow<'a> {
    id: &'a str,
    data: &'a Site,
}

#[derive(Debug, Serialize)]
struct InspectionRow<'a> {
    id: &'a str,
    site_name: &'a str,
    inspector_name: &'a str,
    date: &'a str,
    data: &'a InspectionLog,
}

#[derive(Debug, Deserialize)]
struct SiteDataRow {
    data: Value,
}

impl SupabaseRemote {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url,
            anon_key,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Build a client from resolved configuration, `None` when the
    /// configuration does not carry usable credentials.
    pub fn from_config(config: &RemoteConfig) -> RemoteResult<Option<Self>> {
        let Some((url, anon_key)) = config.credentials() else {
            return Ok(None);
        };
        Self::new(url, anon_key, config.request_timeout()).map(Some)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn upsert_row<T: Serialize + Sync>(&self, table: &str, row: &T) -> RemoteResult<()> {
        let request = self.authorized(
            self.client
                .post(self.table_url(table))
                .query(&[("on_conflict", "id")])
                .header("Prefer", UPSERT_PREFERENCE)
                .json(row),
        );
        let response = request.send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteAdapter for SupabaseRemote {
    fn is_configured(&self) -> bool {
        true
    }

    async fn ping(&self) -> RemoteResult<()> {
        let request = self.authorized(
            self.client
                .get(self.table_url(SITES_TABLE))
                .query(&[("select", "id"), ("limit", "1")]),
        );
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn upsert_site(&self, site: &Site) -> RemoteResult<()> {
        let row = SiteRow {
            id: &site.id,
            data: site,
        };
        self.upsert_row(SITES_TABLE, &row).await
    }

    async fn delete_site(&self, site_id: &str) -> RemoteResult<()> {
        let url = format!(
            "{}?id=eq.{}",
            self.table_url(SITES_TABLE),
            urlencoding::encode(site_id)
        );
        let request = self.authorized(self.client.delete(url));
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn upsert_inspection(&self, log: &InspectionLog) -> RemoteResult<()> {
        let row = InspectionRow {
            id: &log.id,
            site_name: &log.site_name,
            inspector_name: &log.inspector_name,
            date: &log.date,
            data: log,
        };
        self.upsert_row(INSPECTIONS_TABLE, &row).await
    }

    async fn fetch_sites(&self) -> RemoteResult<Vec<Site>> {
        let request = self.authorized(
            self.client
                .get(self.table_url(SITES_TABLE))
                .query(&[("select", "data"), ("order", "created_at.asc")])
                .header("Accept", "application/json"),
        );
        let response = ensure_success(request.send().await?).await?;
        let rows = response.json::<Vec<SiteDataRow>>().await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Site>(row.data) {
                Ok(site) => Some(site),
                Err(error) => {
                    tracing::warn!("Ignoring unreadable remote site: {}", error);
                    None
                }
            })
            .collect())
    }
}

/// Derive the PostgREST base from a Supabase project URL.
pub fn normalize_rest_url(url: &str) -> RemoteResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

async fn ensure_success(response: Response) -> RemoteResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Api(parse_api_error(status, &body)))
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let detail = payload.details.or(payload.hint);
            return match detail {
                Some(detail) => format!(
                    "{}: {} ({})",
                    message.trim(),
                    detail.trim(),
                    status.as_u16()
                ),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = crate::util::compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
