//! 兑换两阶段流程：REQUESTED（processed_by 为空）→ PROCESSED。
//!
//! 申请时不预留积分，处理时在同一事务里重新校验余额并条件扣减。

use crate::entities::{TransactionType, transaction_entity as transactions};
use crate::error::{AppError, AppResult};
use crate::services::balance_store;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

pub async fn lock_transaction<C: ConnectionTrait>(
    db: &C,
    transaction_id: i64,
) -> AppResult<transactions::Model> {
    transactions::Entity::find_by_id(transaction_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {transaction_id} not found")))
}

/// 由 processor 完成兑换，返回更新后的流水
pub async fn process<C: ConnectionTrait>(
    db: &C,
    processor_id: i64,
    transaction_id: i64,
) -> AppResult<transactions::Model> {
    let tx = lock_transaction(db, transaction_id).await?;

    if tx.transaction_type != TransactionType::Redemption {
        return Err(AppError::ValidationError(format!(
            "Transaction {transaction_id} is not a redemption"
        )));
    }
    if tx.processed_by.is_some() {
        return Err(AppError::Conflict("Redemption already processed".to_string()));
    }

    // 只有第一个处理者能认领
    let claimed = transactions::Entity::update_many()
        .col_expr(transactions::Column::ProcessedBy, Expr::value(processor_id))
        .col_expr(transactions::Column::Redeemed, Expr::value(tx.amount))
        .filter(transactions::Column::Id.eq(transaction_id))
        .filter(transactions::Column::ProcessedBy.is_null())
        .exec(db)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(AppError::Conflict("Redemption already processed".to_string()));
    }

    balance_store::debit(db, tx.user_id, tx.amount).await?;

    Ok(transactions::Model {
        processed_by: Some(processor_id),
        redeemed: Some(tx.amount),
        ..tx
    })
}
