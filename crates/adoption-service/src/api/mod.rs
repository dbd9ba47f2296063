//! REST 接口层
//!
//! 基于 axum 暴露兑换、查询、成就对账接口，统一使用 `ApiResponse` 响应包装

pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

pub use response::ApiResponse;
pub use routes::app;
pub use state::AppState;
