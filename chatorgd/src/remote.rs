use chatorg_core::{ApiError, ChatorgClient, ContainerDraft, ContainerPage, GizmoInfo, RowPage};

/// Remote operations the harvesters and the bulk mutator depend on.
///
/// Implemented by [`ChatorgClient`]; tests substitute scripted fakes.
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    async fn list_items_page(&self, offset: u32, limit: u32) -> Result<RowPage, ApiError>;

    async fn list_containers_page(
        &self,
        cursor: Option<&str>,
        items_per_container: u32,
    ) -> Result<ContainerPage, ApiError>;

    async fn list_container_items_page(
        &self,
        container_id: &str,
        cursor: Option<&str>,
    ) -> Result<RowPage, ApiError>;

    async fn hide_item(&self, id: &str) -> Result<u16, ApiError>;

    async fn move_item(&self, id: &str, container_id: &str) -> Result<u16, ApiError>;

    async fn delete_container(&self, id: &str) -> Result<u16, ApiError>;

    async fn create_container(&self, draft: &ContainerDraft) -> Result<GizmoInfo, ApiError>;

    fn item_href(&self, id: &str) -> String;

    fn container_href(&self, short_url: Option<&str>) -> String;
}

impl RemoteApi for ChatorgClient {
    async fn list_items_page(&self, offset: u32, limit: u32) -> Result<RowPage, ApiError> {
        ChatorgClient::list_items_page(self, offset, limit).await
    }

    async fn list_containers_page(
        &self,
        cursor: Option<&str>,
        items_per_container: u32,
    ) -> Result<ContainerPage, ApiError> {
        ChatorgClient::list_containers_page(self, cursor, items_per_container).await
    }

    async fn list_container_items_page(
        &self,
        container_id: &str,
        cursor: Option<&str>,
    ) -> Result<RowPage, ApiError> {
        ChatorgClient::list_container_items_page(self, container_id, cursor).await
    }

    async fn hide_item(&self, id: &str) -> Result<u16, ApiError> {
        ChatorgClient::hide_item(self, id).await
    }

    async fn move_item(&self, id: &str, container_id: &str) -> Result<u16, ApiError> {
        ChatorgClient::move_item(self, id, container_id).await
    }

    async fn delete_container(&self, id: &str) -> Result<u16, ApiError> {
        ChatorgClient::delete_container(self, id).await
    }

    async fn create_container(&self, draft: &ContainerDraft) -> Result<GizmoInfo, ApiError> {
        ChatorgClient::create_container(self, draft).await
    }

    fn item_href(&self, id: &str) -> String {
        ChatorgClient::item_href(self, id)
    }

    fn container_href(&self, short_url: Option<&str>) -> String {
        ChatorgClient::container_href(self, short_url)
    }
}
