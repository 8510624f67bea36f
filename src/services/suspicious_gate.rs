//! 可疑标记的切换。标记时扣回入账，取消标记时补发；状态不变则什么都不做。

use crate::entities::{TransactionType, transaction_entity as transactions};
use crate::error::{AppError, AppResult};
use crate::services::{balance_store, redemption_workflow};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

pub async fn toggle<C: ConnectionTrait>(
    db: &C,
    transaction_id: i64,
    suspicious: bool,
) -> AppResult<transactions::Model> {
    let tx = redemption_workflow::lock_transaction(db, transaction_id).await?;

    if !matches!(
        tx.transaction_type,
        TransactionType::Purchase | TransactionType::Adjustment
    ) {
        return Err(AppError::ValidationError(format!(
            "Only purchase and adjustment transactions can be flagged, got {}",
            tx.transaction_type
        )));
    }
    if tx.suspicious == suspicious {
        return Ok(tx);
    }

    let flipped = transactions::Entity::update_many()
        .col_expr(transactions::Column::Suspicious, Expr::value(suspicious))
        .filter(transactions::Column::Id.eq(transaction_id))
        .filter(transactions::Column::Suspicious.eq(!suspicious))
        .exec(db)
        .await?;
    if flipped.rows_affected == 0 {
        // 已被并发请求切换过
        return redemption_workflow::lock_transaction(db, transaction_id).await;
    }

    let updated = transactions::Model {
        suspicious,
        ..tx.clone()
    };
    let delta = updated.balance_effect() - tx.balance_effect();
    balance_store::apply_delta(db, tx.user_id, delta).await?;

    Ok(updated)
}
