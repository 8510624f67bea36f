use crate::entities::TransactionType;
use crate::entities::transaction_entity as transactions;
use crate::error::{AppError, AppResult};
use crate::utils::PaginationParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: i64,
    /// 消费金额（货币单位，例如 20.0 = $20.00）
    pub spent: f64,
    #[serde(default)]
    pub promotion_ids: Vec<i64>,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub user_id: i64,
    pub amount: i64,
    /// 被调整的原始流水
    pub related_id: i64,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionRequest {
    pub amount: i64,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient_id: i64,
    pub amount: i64,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "target", content = "user_id")]
pub enum AwardTarget {
    Guest(i64),
    AllGuests,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAwardRequest {
    pub target: AwardTarget,
    pub amount: i64,
    #[serde(default)]
    pub remark: String,
}

/// 写入操作的返回结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: i64,
    pub transaction_type: TransactionType,
    pub user_id: i64,
    pub amount: i64,
    /// 仅消费：本次实际入账积分，被挂起时为 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earned: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed: Option<i64>,
    pub created_by: i64,
    pub remark: String,
}

impl From<&transactions::Model> for TransactionReceipt {
    fn from(tx: &transactions::Model) -> Self {
        Self {
            transaction_id: tx.id,
            transaction_type: tx.transaction_type,
            user_id: tx.user_id,
            amount: tx.amount,
            earned: None,
            spent: tx.spent,
            promotion_ids: None,
            related_id: tx.related_id,
            processed_by: tx.processed_by,
            redeemed: tx.redeemed,
            created_by: tx.created_by,
            remark: tx.remark.clone(),
        }
    }
}

/// 转账的两条镜像流水
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub sent: TransactionReceipt,
    pub received: TransactionReceipt,
}

/// 按类型区分的流水内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntry {
    Purchase {
        spent: f64,
        earned: i64,
        promotion_ids: Vec<i64>,
    },
    Redemption {
        amount: i64,
        processed_by: Option<i64>,
        redeemed: Option<i64>,
    },
    Transfer {
        amount: i64,
        counterparty_id: i64,
    },
    Adjustment {
        amount: i64,
        related_transaction_id: i64,
    },
    #[serde(rename = "event")]
    EventAward {
        amount: i64,
        event_id: i64,
    },
}

impl LedgerEntry {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            LedgerEntry::Purchase { .. } => TransactionType::Purchase,
            LedgerEntry::Redemption { .. } => TransactionType::Redemption,
            LedgerEntry::Transfer { .. } => TransactionType::Transfer,
            LedgerEntry::Adjustment { .. } => TransactionType::Adjustment,
            LedgerEntry::EventAward { .. } => TransactionType::Event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: i64,
    pub user_id: i64,
    pub created_by: i64,
    pub suspicious: bool,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

impl TransactionView {
    pub fn from_model(tx: transactions::Model, promotion_ids: Vec<i64>) -> AppResult<Self> {
        let related = |what: &str| {
            tx.related_id.ok_or_else(|| {
                AppError::InternalError(format!("Transaction {} is missing its {what}", tx.id))
            })
        };

        let entry = match tx.transaction_type {
            TransactionType::Purchase => LedgerEntry::Purchase {
                spent: tx.spent.unwrap_or_default(),
                earned: tx.amount,
                promotion_ids,
            },
            TransactionType::Redemption => LedgerEntry::Redemption {
                amount: tx.amount,
                processed_by: tx.processed_by,
                redeemed: tx.redeemed,
            },
            TransactionType::Transfer => LedgerEntry::Transfer {
                amount: tx.amount,
                counterparty_id: related("counterparty")?,
            },
            TransactionType::Adjustment => LedgerEntry::Adjustment {
                amount: tx.amount,
                related_transaction_id: related("related transaction")?,
            },
            TransactionType::Event => LedgerEntry::EventAward {
                amount: tx.amount,
                event_id: related("event")?,
            },
        };

        Ok(Self {
            id: tx.id,
            user_id: tx.user_id,
            created_by: tx.created_by,
            suspicious: tx.suspicious,
            remark: tx.remark,
            created_at: tx.created_at,
            entry,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountOperator {
    Gte,
    Lte,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQuery {
    pub user_id: Option<i64>,
    pub created_by: Option<i64>,
    pub transaction_type: Option<TransactionType>,
    pub suspicious: Option<bool>,
    pub promotion_id: Option<i64>,
    pub related_id: Option<i64>,
    /// 与 operator 同时提供时生效
    pub amount: Option<i64>,
    pub operator: Option<AmountOperator>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}
