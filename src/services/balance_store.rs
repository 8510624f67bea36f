//! 会员积分余额的读写。所有扣减都是带条件的原子更新（`points >= amount`），
//! 调用方负责提供所在的事务。

use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

/// 读取用户并加行锁（SELECT ... FOR UPDATE），保证余额检查与后续写入一致
pub async fn lock_user<C: ConnectionTrait>(db: &C, user_id: i64) -> AppResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
}

pub async fn find_user<C: ConnectionTrait>(db: &C, user_id: i64) -> AppResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
}

pub async fn balance_of<C: ConnectionTrait>(db: &C, user_id: i64) -> AppResult<i64> {
    Ok(find_user(db, user_id).await?.points)
}

pub async fn credit<C: ConnectionTrait>(db: &C, user_id: i64, amount: i64) -> AppResult<()> {
    if amount < 0 {
        return Err(AppError::InternalError(format!(
            "Negative credit {amount} for user {user_id}"
        )));
    }

    let result = users::Entity::update_many()
        .col_expr(
            users::Column::Points,
            Expr::col(users::Column::Points).add(amount),
        )
        .filter(users::Column::Id.eq(user_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("User {user_id} not found")));
    }
    Ok(())
}

pub async fn debit<C: ConnectionTrait>(db: &C, user_id: i64, amount: i64) -> AppResult<()> {
    if amount < 0 {
        return Err(AppError::InternalError(format!(
            "Negative debit {amount} for user {user_id}"
        )));
    }

    // 条件扣减：余额不足时不更新任何行
    let result = users::Entity::update_many()
        .col_expr(
            users::Column::Points,
            Expr::col(users::Column::Points).sub(amount),
        )
        .filter(users::Column::Id.eq(user_id))
        .filter(users::Column::Points.gte(amount))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let exists = users::Entity::find_by_id(user_id).one(db).await?.is_some();
        return Err(if exists {
            AppError::Conflict("Insufficient point balance".to_string())
        } else {
            AppError::NotFound(format!("User {user_id} not found"))
        });
    }
    Ok(())
}

/// 正数入账，负数按条件扣减
pub async fn apply_delta<C: ConnectionTrait>(db: &C, user_id: i64, delta: i64) -> AppResult<()> {
    if delta >= 0 {
        credit(db, user_id, delta).await
    } else {
        let amount = delta
            .checked_neg()
            .ok_or_else(|| AppError::ValidationError(format!("Amount {delta} out of range")))?;
        debit(db, user_id, amount).await
    }
}
