use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chatorg_core::{
    ApiError, ContainerDraft, ContainerPage, GizmoDisplay, GizmoInfo, ItemRow, RowPage,
    SidebarEntry, SidebarGizmo, StatusCode,
};
use serde_json::json;

use crate::progress::{ChannelSink, ProgressEvent};
use crate::remote::RemoteApi;

/// Scripted in-memory stand-in for the REST API.
///
/// Listing calls pop responses in order and answer with an empty page once
/// a script runs dry. Mutations answer 200 unless a status script exists for
/// the id; status `0` simulates a network failure. Project creation echoes
/// `g-new` unless a response was pushed.
#[derive(Default)]
pub(crate) struct FakeApi {
    item_pages: Mutex<VecDeque<Result<RowPage, ApiError>>>,
    container_pages: Mutex<VecDeque<Result<ContainerPage, ApiError>>>,
    container_items: Mutex<HashMap<String, VecDeque<Result<RowPage, ApiError>>>>,
    mutation_statuses: Mutex<HashMap<String, VecDeque<u16>>>,
    created: Mutex<VecDeque<Result<GizmoInfo, ApiError>>>,
    calls: Mutex<Vec<String>>,
    list_delay: Option<Duration>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub(crate) fn push_item_page(&self, page: Result<RowPage, ApiError>) {
        self.item_pages.lock().unwrap().push_back(page);
    }

    pub(crate) fn push_container_page(&self, page: Result<ContainerPage, ApiError>) {
        self.container_pages.lock().unwrap().push_back(page);
    }

    pub(crate) fn push_container_items(&self, container_id: &str, page: Result<RowPage, ApiError>) {
        self.container_items
            .lock()
            .unwrap()
            .entry(container_id.to_string())
            .or_default()
            .push_back(page);
    }

    pub(crate) fn script_statuses(&self, id: &str, statuses: &[u16]) {
        self.mutation_statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), statuses.iter().copied().collect());
    }

    pub(crate) fn push_created(&self, created: Result<GizmoInfo, ApiError>) {
        self.created.lock().unwrap().push_back(created);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self) {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn scripted_mutation(&self, id: &str) -> Result<u16, ApiError> {
        let status = self
            .mutation_statuses
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(200);
        match status {
            0 => Err(network_error()),
            200..=299 => Ok(status),
            _ => Err(http_error(status)),
        }
    }
}

impl RemoteApi for FakeApi {
    async fn list_items_page(&self, offset: u32, limit: u32) -> Result<RowPage, ApiError> {
        self.record(format!("items offset={offset} limit={limit}"));
        self.pause().await;
        self.item_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RowPage::default()))
    }

    async fn list_containers_page(
        &self,
        cursor: Option<&str>,
        items_per_container: u32,
    ) -> Result<ContainerPage, ApiError> {
        self.record(format!(
            "containers cursor={} per={items_per_container}",
            cursor.unwrap_or("-")
        ));
        self.pause().await;
        self.container_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ContainerPage::default()))
    }

    async fn list_container_items_page(
        &self,
        container_id: &str,
        cursor: Option<&str>,
    ) -> Result<RowPage, ApiError> {
        self.record(format!(
            "container {container_id} cursor={}",
            cursor.unwrap_or("-")
        ));
        self.pause().await;
        self.container_items
            .lock()
            .unwrap()
            .get_mut(container_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(RowPage::default()))
    }

    async fn hide_item(&self, id: &str) -> Result<u16, ApiError> {
        self.record(format!("hide {id}"));
        self.scripted_mutation(id)
    }

    async fn move_item(&self, id: &str, container_id: &str) -> Result<u16, ApiError> {
        self.record(format!("move {id} -> {container_id}"));
        self.scripted_mutation(id)
    }

    async fn delete_container(&self, id: &str) -> Result<u16, ApiError> {
        self.record(format!("delete-container {id}"));
        self.scripted_mutation(id)
    }

    async fn create_container(&self, draft: &ContainerDraft) -> Result<GizmoInfo, ApiError> {
        self.record(format!("create {}", draft.name));
        self.created
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(gizmo("g-new", Some("g-new-slug"))))
    }

    fn item_href(&self, id: &str) -> String {
        format!("https://chat.test/c/{id}")
    }

    fn container_href(&self, short_url: Option<&str>) -> String {
        match short_url {
            Some(short_url) => format!("https://chat.test/g/{short_url}"),
            None => "https://chat.test/".to_string(),
        }
    }
}

pub(crate) fn http_error(status: u16) -> ApiError {
    ApiError::Api {
        status: StatusCode::from_u16(status).unwrap(),
        body: format!("HTTP {status}"),
    }
}

/// A transport failure without any HTTP status.
pub(crate) fn network_error() -> ApiError {
    let err = reqwest::Client::new().get("http://").build().unwrap_err();
    ApiError::Request(err)
}

/// Row updated `secs` seconds after the epoch.
pub(crate) fn row(id: &str, secs: i64) -> ItemRow {
    ItemRow {
        id: Some(id.to_string()),
        title: Some(format!("Chat {id}")),
        create_time: None,
        update_time: Some(json!(secs)),
    }
}

pub(crate) fn untimed_row(id: &str) -> ItemRow {
    ItemRow {
        id: Some(id.to_string()),
        title: None,
        create_time: None,
        update_time: None,
    }
}

pub(crate) fn rows_page(rows: Vec<ItemRow>, cursor: Option<&str>) -> RowPage {
    RowPage {
        items: rows,
        cursor: cursor.map(str::to_string),
        total: None,
    }
}

pub(crate) fn gizmo(id: &str, short_url: Option<&str>) -> GizmoInfo {
    GizmoInfo {
        id: Some(id.to_string()),
        short_url: short_url.map(str::to_string),
        display: None,
    }
}

pub(crate) fn containers_page(ids: &[&str], cursor: Option<&str>) -> ContainerPage {
    ContainerPage {
        items: ids
            .iter()
            .map(|id| SidebarEntry {
                gizmo: Some(SidebarGizmo {
                    gizmo: Some(GizmoInfo {
                        id: Some(id.to_string()),
                        short_url: Some(format!("{id}-slug")),
                        display: Some(GizmoDisplay {
                            name: Some(format!("Project {id}")),
                        }),
                    }),
                }),
            })
            .collect(),
        cursor: cursor.map(str::to_string),
    }
}

pub(crate) fn channel_sink() -> (ChannelSink, tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (ChannelSink::new(tx), rx)
}

pub(crate) fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
