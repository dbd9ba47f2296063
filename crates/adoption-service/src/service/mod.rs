//! 服务层
//!
//! 实现兑换与查询业务逻辑，协调兑换码目录、采样器和认养账本。
//!
//! ## 模块结构
//!
//! - `dto`: 数据传输对象定义
//! - `redemption_service`: 兑换服务（唯一的写路径）
//! - `query_service`: 查询服务（只读操作）

pub mod dto;
pub mod query_service;
pub mod redemption_service;

pub use dto::*;
pub use query_service::AdoptionQueryService;
pub use redemption_service::RedemptionService;
