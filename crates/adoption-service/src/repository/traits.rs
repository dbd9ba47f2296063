//! 仓储 Trait 定义
//!
//! 定义存储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AdoptionRecord, CodeLookup, ConsumeToken};

/// 兑换码目录接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeRegistry: Send + Sync {
    /// 查询兑换码状态（只读，无副作用）
    async fn lookup(&self, code: &str) -> Result<CodeLookup>;

    /// 原子消费兑换码
    ///
    /// 对同一规范化兑换码的并发调用中恰好一个成功，其余返回 `AlreadyRedeemed`；
    /// 未登记的兑换码返回 `InvalidCode`。
    async fn try_consume(&self, code: &str) -> Result<ConsumeToken>;

    /// 回滚一次消费
    ///
    /// 仅当兑换码仍由该凭证持有时生效，返回是否实际释放
    async fn release(&self, token: &ConsumeToken) -> Result<bool>;
}

/// 认养账本接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdoptionLedger: Send + Sync {
    /// 追加记录（保持插入顺序）
    async fn add(&self, record: &AdoptionRecord) -> Result<()>;

    /// 按插入顺序获取用户的全部记录，无记录时返回空列表
    async fn get(&self, owner_id: &str) -> Result<Vec<AdoptionRecord>>;

    /// 用户记录数
    async fn count(&self, owner_id: &str) -> Result<u64>;

    /// 按记录 ID 查找
    async fn find(&self, record_id: Uuid) -> Result<Option<AdoptionRecord>>;

    /// 按规范化兑换码查找其对应的记录
    async fn find_by_code(&self, code_key: &str) -> Result<Option<AdoptionRecord>>;
}

/// 由消费凭证构建认养记录（采样在这里发生）
pub type RecordBuilder = Box<dyn FnOnce(&ConsumeToken) -> Result<AdoptionRecord> + Send>;

/// 兑换落库接口
///
/// 把“消费兑换码”和“写入认养记录”作为一个整体提交：
/// 返回成功时两者都已生效；返回错误时兑换码保持未使用，
/// 或者该兑换码已经对应一条账本记录。
#[async_trait]
pub trait RedemptionStore: Send + Sync {
    async fn redeem(&self, code_key: &str, build: RecordBuilder) -> Result<AdoptionRecord>;
}
