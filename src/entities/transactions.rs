use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter, Set};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[sea_orm(string_value = "purchase")]
    Purchase,
    #[sea_orm(string_value = "redemption")]
    Redemption,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "event")]
    Event,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Purchase => write!(f, "purchase"),
            TransactionType::Redemption => write!(f, "redemption"),
            TransactionType::Transfer => write!(f, "transfer"),
            TransactionType::Adjustment => write!(f, "adjustment"),
            TransactionType::Event => write!(f, "event"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub spent: Option<f64>,
    pub redeemed: Option<i64>,
    pub related_id: Option<i64>,
    pub remark: String,
    pub suspicious: bool,
    pub created_by: i64,
    pub processed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// 当前计入余额的积分；被标记可疑的入账为 0
    pub fn balance_effect(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Purchase | TransactionType::Adjustment if self.suspicious => 0,
            TransactionType::Redemption => -self.redeemed.unwrap_or(0),
            _ => self.amount,
        }
    }
}

impl ActiveModel {
    /// 新流水的公共字段；spent / redeemed / related_id / processed_by 由调用方按类型补充
    pub fn entry(
        transaction_type: TransactionType,
        user_id: i64,
        amount: i64,
        created_by: i64,
        remark: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: Set(user_id),
            transaction_type: Set(transaction_type),
            amount: Set(amount),
            remark: Set(remark.to_string()),
            suspicious: Set(false),
            created_by: Set(created_by),
            created_at: Set(now),
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
