use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::paths::{ApiPaths, template_segments};

const DEFAULT_BASE_URL: &str = "https://chatgpt.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_PREVIEW_CHARS: usize = 600;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    RateLimit,
    Server,
    Network,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
    pub paths: ApiPaths,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
            paths: ApiPaths::default(),
        }
    }
}

#[derive(Clone)]
pub struct ChatorgClient {
    http: Client,
    base_url: Url,
    token: String,
    paths: ApiPaths,
}

impl ChatorgClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_config(ClientConfig::new(token))
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_config(ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::new(token)
        })
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(Self {
            http: Client::builder().timeout(config.timeout).build()?,
            base_url,
            token: config.token,
            paths: config.paths,
        })
    }

    pub async fn list_items_page(&self, offset: u32, limit: u32) -> Result<RowPage, ApiError> {
        let mut url = self.endpoint(&self.paths.conversations, &[])?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string())
            .append_pair("order", "updated")
            .append_pair("is_archived", "false")
            .append_pair("is_starred", "false");
        self.get_json(url).await
    }

    pub async fn list_containers_page(
        &self,
        cursor: Option<&str>,
        items_per_container: u32,
    ) -> Result<ContainerPage, ApiError> {
        let mut url = self.endpoint(&self.paths.gizmos_sidebar, &[])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("conversations_per_gizmo", &items_per_container.to_string())
                .append_pair("owned_only", "true");
            if let Some(cursor) = cursor {
                query.append_pair("cursor", cursor);
            }
        }
        self.get_json(url).await
    }

    pub async fn list_container_items_page(
        &self,
        container_id: &str,
        cursor: Option<&str>,
    ) -> Result<RowPage, ApiError> {
        let mut url = self.endpoint(&self.paths.gizmo_conversations, &[("id", container_id)])?;
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair("cursor", cursor);
        }
        self.get_json(url).await
    }

    /// Soft delete: the conversation stays on the server with visibility off.
    pub async fn hide_item(&self, id: &str) -> Result<u16, ApiError> {
        let url = self.endpoint(&self.paths.conversation, &[("id", id)])?;
        self.send(Method::PATCH, url, Some(json!({ "is_visible": false })))
            .await
    }

    pub async fn move_item(&self, id: &str, container_id: &str) -> Result<u16, ApiError> {
        let url = self.endpoint(&self.paths.conversation, &[("id", id)])?;
        self.send(Method::PATCH, url, Some(json!({ "gizmo_id": container_id })))
            .await
    }

    pub async fn delete_container(&self, id: &str) -> Result<u16, ApiError> {
        let mut url = self.endpoint(&self.paths.gizmos_root, &[])?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push(id);
        self.send(Method::DELETE, url, None).await
    }

    /// Creates a private project. The echoed gizmo may lack an id; callers
    /// decide whether that counts as success.
    pub async fn create_container(&self, draft: &ContainerDraft) -> Result<GizmoInfo, ApiError> {
        let mut url = self.endpoint(&self.paths.gizmos_root, &[])?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .extend(["snorlax", "upsert"]);
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&upsert_payload(draft))
            .send()
            .await?;
        let upserted: UpsertResponse = Self::handle_response(response).await?;
        Ok(upserted
            .resource
            .and_then(|resource| resource.gizmo)
            .unwrap_or_default())
    }

    pub fn item_href(&self, id: &str) -> String {
        self.endpoint(&self.paths.ui_conversation, &[("id", id)])
            .map(String::from)
            .unwrap_or_else(|_| self.origin_root())
    }

    pub fn container_href(&self, short_url: Option<&str>) -> String {
        match short_url.map(str::trim).filter(|s| !s.is_empty()) {
            Some(short_url) => self
                .endpoint(&self.paths.ui_gizmo, &[("short_url", short_url)])
                .map(String::from)
                .unwrap_or_else(|_| self.origin_root()),
            None => self.origin_root(),
        }
    }

    fn origin_root(&self) -> String {
        let mut url = self.base_url.clone();
        url.set_path("/");
        url.set_query(None);
        url.into()
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, template: &str, params: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments.pop_if_empty();
            for segment in template_segments(template, params) {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<u16, ApiError> {
        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", self.auth_header_value());
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: reqwest::Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ApiError::Api {
            status,
            body: body.chars().take(BODY_PREVIEW_CHARS).collect(),
        }
    }
}

impl ApiError {
    /// HTTP status attached to the failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(status.as_u16()),
            ApiError::Request(err) => err.status().map(|status| status.as_u16()),
            ApiError::Url(_) => None,
        }
    }

    pub fn classification(&self) -> ApiErrorClass {
        match (self, self.status()) {
            (_, Some(status)) => classify_api_status(status),
            (ApiError::Url(_), None) => ApiErrorClass::Rejected,
            (_, None) => ApiErrorClass::Network,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self.classification(), ApiErrorClass::Rejected)
    }
}

fn classify_api_status(status: u16) -> ApiErrorClass {
    if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        ApiErrorClass::RateLimit
    } else if (500..=599).contains(&status) {
        ApiErrorClass::Server
    } else {
        ApiErrorClass::Rejected
    }
}

/// One page of conversation rows, as returned by both the flat listing and
/// the per-project listing.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RowPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<ItemRow>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ItemRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<Value>,
    #[serde(default)]
    pub update_time: Option<Value>,
}

impl ItemRow {
    /// Non-empty id, or `None` for rows that cannot be tracked.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn display_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => "Untitled".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ContainerPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<SidebarEntry>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SidebarEntry {
    #[serde(default)]
    pub gizmo: Option<SidebarGizmo>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SidebarGizmo {
    #[serde(default)]
    pub gizmo: Option<GizmoInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GizmoInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub display: Option<GizmoDisplay>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GizmoDisplay {
    #[serde(default)]
    pub name: Option<String>,
}

impl SidebarEntry {
    pub fn info(&self) -> Option<&GizmoInfo> {
        self.gizmo.as_ref()?.gizmo.as_ref()
    }
}

impl GizmoInfo {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn short_url(&self) -> Option<&str> {
        self.short_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Display name, then short url, then id.
    pub fn display_title(&self) -> String {
        let name = self
            .display
            .as_ref()
            .and_then(|display| display.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty());
        name.or_else(|| self.short_url())
            .or_else(|| self.id())
            .unwrap_or("Untitled")
            .to_string()
    }
}

/// Fields of a project to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDraft {
    pub name: String,
    pub description: String,
    pub prompt_starters: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpsertResponse {
    #[serde(default)]
    resource: Option<UpsertResource>,
}

#[derive(Debug, Default, Deserialize)]
struct UpsertResource {
    #[serde(default)]
    gizmo: Option<GizmoInfo>,
}

fn upsert_payload(draft: &ContainerDraft) -> Value {
    json!({
        "instructions": "",
        "display": {
            "name": draft.name.trim(),
            "description": draft.description,
            "prompt_starters": draft.prompt_starters,
        },
        "tools": [],
        "memory_scope": "unset",
        "files": [],
        "training_disabled": false,
        "sharing": [{
            "type": "private",
            "capabilities": {
                "can_read": true,
                "can_view_config": false,
                "can_write": false,
                "can_delete": false,
                "can_export": false,
                "can_share": false,
            },
        }],
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_follow_retry_table() {
        assert_eq!(classify_api_status(429), ApiErrorClass::RateLimit);
        assert_eq!(classify_api_status(500), ApiErrorClass::Server);
        assert_eq!(classify_api_status(503), ApiErrorClass::Server);
        assert_eq!(classify_api_status(599), ApiErrorClass::Server);
        assert_eq!(classify_api_status(403), ApiErrorClass::Rejected);
        assert_eq!(classify_api_status(404), ApiErrorClass::Rejected);
        assert_eq!(classify_api_status(408), ApiErrorClass::Rejected);
    }

    #[test]
    fn api_error_exposes_status() {
        let err = ApiError::Api {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.classification(), ApiErrorClass::RateLimit);
        assert!(err.is_retryable());
    }

    #[test]
    fn url_errors_are_not_retryable() {
        let err = ApiError::Url(url::ParseError::EmptyHost);
        assert_eq!(err.status(), None);
        assert_eq!(err.classification(), ApiErrorClass::Rejected);
    }

    #[test]
    fn gizmo_title_falls_back_through_short_url_and_id() {
        let named = GizmoInfo {
            id: Some("g-p-1".into()),
            short_url: Some("g-p-1-notes".into()),
            display: Some(GizmoDisplay {
                name: Some("  Notes ".into()),
            }),
        };
        assert_eq!(named.display_title(), "Notes");

        let unnamed = GizmoInfo {
            display: None,
            ..named.clone()
        };
        assert_eq!(unnamed.display_title(), "g-p-1-notes");

        let bare = GizmoInfo {
            id: Some("g-p-2".into()),
            ..GizmoInfo::default()
        };
        assert_eq!(bare.display_title(), "g-p-2");
    }

    #[test]
    fn row_page_tolerates_null_items() {
        let page: RowPage = serde_json::from_str(r#"{"items": null, "total": 3}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(3));
    }

    #[test]
    fn hrefs_use_ui_templates() {
        let client = ChatorgClient::with_base_url("https://chat.example", "t").unwrap();
        assert_eq!(client.item_href("abc"), "https://chat.example/c/abc");
        assert_eq!(
            client.container_href(Some("g-p-1-notes")),
            "https://chat.example/g/g-p-1-notes"
        );
        assert_eq!(client.container_href(None), "https://chat.example/");
        assert_eq!(client.container_href(Some("  ")), "https://chat.example/");
    }
}
