//! 活动积分池。
//!
//! 发放把积分从 `points_remain` 等量移到 `points_awarded`，池总额只在经理调整时变化。
//! 所有对池的修改都是带条件的原子更新，调用方负责事务。

use crate::entities::{
    TransactionType, event_entity as events, event_guest_entity as guests,
    event_organizer_entity as organizers, transaction_entity as transactions,
};
use crate::error::{AppError, AppResult};
use crate::services::balance_store;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

pub async fn find_event<C: ConnectionTrait>(db: &C, event_id: i64) -> AppResult<events::Model> {
    events::Entity::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))
}

pub async fn lock_event<C: ConnectionTrait>(db: &C, event_id: i64) -> AppResult<events::Model> {
    events::Entity::find_by_id(event_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))
}

pub async fn is_guest<C: ConnectionTrait>(db: &C, event_id: i64, user_id: i64) -> AppResult<bool> {
    Ok(guests::Entity::find_by_id((event_id, user_id))
        .one(db)
        .await?
        .is_some())
}

pub async fn is_organizer<C: ConnectionTrait>(
    db: &C,
    event_id: i64,
    user_id: i64,
) -> AppResult<bool> {
    Ok(organizers::Entity::find_by_id((event_id, user_id))
        .one(db)
        .await?
        .is_some())
}

pub async fn guest_ids<C: ConnectionTrait>(db: &C, event_id: i64) -> AppResult<Vec<i64>> {
    Ok(guests::Entity::find()
        .filter(guests::Column::EventId.eq(event_id))
        .order_by_asc(guests::Column::UserId)
        .all(db)
        .await?
        .into_iter()
        .map(|g| g.user_id)
        .collect())
}

pub async fn organizer_ids<C: ConnectionTrait>(db: &C, event_id: i64) -> AppResult<Vec<i64>> {
    Ok(organizers::Entity::find()
        .filter(organizers::Column::EventId.eq(event_id))
        .order_by_asc(organizers::Column::UserId)
        .all(db)
        .await?
        .into_iter()
        .map(|o| o.user_id)
        .collect())
}

pub async fn guest_count<C: ConnectionTrait>(db: &C, event_id: i64) -> AppResult<u64> {
    Ok(guests::Entity::find()
        .filter(guests::Column::EventId.eq(event_id))
        .count(db)
        .await?)
}

/// remain -= amount, awarded += amount；剩余不足时不更新
async fn reserve<C: ConnectionTrait>(db: &C, event_id: i64, amount: i64) -> AppResult<()> {
    let result = events::Entity::update_many()
        .col_expr(
            events::Column::PointsRemain,
            Expr::col(events::Column::PointsRemain).sub(amount),
        )
        .col_expr(
            events::Column::PointsAwarded,
            Expr::col(events::Column::PointsAwarded).add(amount),
        )
        .filter(events::Column::Id.eq(event_id))
        .filter(events::Column::PointsRemain.gte(amount))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        find_event(db, event_id).await?;
        return Err(AppError::Conflict(
            "Not enough points remaining in event".to_string(),
        ));
    }
    Ok(())
}

async fn credit_guest<C: ConnectionTrait>(
    db: &C,
    event_id: i64,
    guest_id: i64,
    amount: i64,
    awarded_by: i64,
    remark: &str,
    now: DateTime<Utc>,
) -> AppResult<transactions::Model> {
    balance_store::credit(db, guest_id, amount).await?;

    let mut entry = transactions::ActiveModel::entry(
        TransactionType::Event,
        guest_id,
        amount,
        awarded_by,
        remark,
        now,
    );
    entry.related_id = Set(Some(event_id));
    Ok(entry.insert(db).await?)
}

fn ensure_positive(amount: i64) -> AppResult<()> {
    if amount <= 0 {
        return Err(AppError::ValidationError(
            "Award amount must be positive".to_string(),
        ));
    }
    Ok(())
}

pub async fn award_to_one<C: ConnectionTrait>(
    db: &C,
    event_id: i64,
    guest_id: i64,
    amount: i64,
    awarded_by: i64,
    remark: &str,
    now: DateTime<Utc>,
) -> AppResult<transactions::Model> {
    ensure_positive(amount)?;
    if !is_guest(db, event_id, guest_id).await? {
        return Err(AppError::ValidationError(format!(
            "User {guest_id} is not a guest of event {event_id}"
        )));
    }

    reserve(db, event_id, amount).await?;
    credit_guest(db, event_id, guest_id, amount, awarded_by, remark, now).await
}

/// 全体嘉宾发放，一次性扣减总额，要么全部成功要么全部失败
pub async fn award_to_all<C: ConnectionTrait>(
    db: &C,
    event_id: i64,
    amount_per_guest: i64,
    awarded_by: i64,
    remark: &str,
    now: DateTime<Utc>,
) -> AppResult<Vec<transactions::Model>> {
    ensure_positive(amount_per_guest)?;
    let guest_ids = guest_ids(db, event_id).await?;
    if guest_ids.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Event {event_id} has no guests"
        )));
    }

    let total = i64::try_from(guest_ids.len())
        .ok()
        .and_then(|count| amount_per_guest.checked_mul(count))
        .ok_or_else(|| AppError::ValidationError("Award total out of range".to_string()))?;
    reserve(db, event_id, total).await?;

    let mut awarded = Vec::with_capacity(guest_ids.len());
    for guest_id in guest_ids {
        awarded.push(
            credit_guest(db, event_id, guest_id, amount_per_guest, awarded_by, remark, now).await?,
        );
    }
    Ok(awarded)
}

/// 调整池总额，差额全部由 points_remain 承担
pub async fn resize<C: ConnectionTrait>(
    db: &C,
    event_id: i64,
    new_total: i64,
) -> AppResult<events::Model> {
    if new_total <= 0 {
        return Err(AppError::ValidationError(
            "Event points must be positive".to_string(),
        ));
    }

    // 以库中的 points_awarded 为准计算，不依赖先前读到的值
    let result = events::Entity::update_many()
        .col_expr(
            events::Column::PointsRemain,
            Expr::val(new_total).sub(Expr::col(events::Column::PointsAwarded)),
        )
        .filter(events::Column::Id.eq(event_id))
        .filter(events::Column::PointsAwarded.lte(new_total))
        .exec(db)
        .await?;

    let event = find_event(db, event_id).await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "Event points cannot be reduced below the {} already awarded",
            event.points_awarded
        )));
    }
    Ok(event)
}
