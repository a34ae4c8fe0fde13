mod client;
mod paths;
pub mod time;

pub use client::{
    ApiError, ApiErrorClass, ChatorgClient, ClientConfig, ContainerDraft, ContainerPage,
    GizmoDisplay, GizmoInfo, ItemRow, RowPage, SidebarEntry, SidebarGizmo,
};
pub use paths::ApiPaths;
pub use reqwest::StatusCode;
