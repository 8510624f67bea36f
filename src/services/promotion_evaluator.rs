//! 消费积分计算与促销资格校验。
//!
//! 校验对整批促销 fail-fast：任一 id 不存在、不在生效期或一次性促销已被使用，
//! 整笔消费都会被拒绝。校验通过后，未达到 `min_spending` 的促销只是被静默排除，
//! 不是错误。本模块不做任何写入，由账本写入方在同一事务里提交。

use crate::entities::{promotion_entity as promotions, promotion_redemption_entity as redemptions};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    /// 基础积分 + 各促销奖励
    pub earned: i64,
    /// 实际生效的促销，保持请求顺序
    pub applied_promotion_ids: Vec<i64>,
    /// 需要记录使用的一次性促销
    pub one_time_to_consume: Vec<i64>,
}

pub fn base_points(spent: f64, base_rate: f64) -> AppResult<i64> {
    to_points((spent * base_rate).round())
}

/// `as i64` 会饱和截断，超出范围的积分必须拒绝
fn to_points(value: f64) -> AppResult<i64> {
    if !value.is_finite() || value < 0.0 || value >= i64::MAX as f64 {
        return Err(points_overflow());
    }
    Ok(value as i64)
}

fn points_overflow() -> AppError {
    AppError::ValidationError("Spent is too large to earn points".to_string())
}

/// 整批校验，返回按请求顺序排列的促销
pub fn validate_batch(
    requested: &[i64],
    found: &[promotions::Model],
    consumed: &HashSet<i64>,
    now: DateTime<Utc>,
) -> AppResult<Vec<promotions::Model>> {
    let mut seen = HashSet::with_capacity(requested.len());
    if !requested.iter().all(|id| seen.insert(*id)) {
        return Err(AppError::ValidationError(
            "Invalid promotion IDs".to_string(),
        ));
    }

    let by_id: HashMap<i64, &promotions::Model> = found.iter().map(|p| (p.id, p)).collect();
    let ordered = requested
        .iter()
        .map(|id| by_id.get(id).map(|p| (*p).clone()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| AppError::ValidationError("Invalid promotion IDs".to_string()))?;

    for promo in &ordered {
        if !promo.is_active(now) {
            return Err(AppError::ValidationError(format!(
                "Promotion {} is not active",
                promo.id
            )));
        }
        if promo.is_one_time() && consumed.contains(&promo.id) {
            return Err(AppError::Conflict(format!(
                "One-time promotion {} already used",
                promo.id
            )));
        }
    }

    Ok(ordered)
}

/// 各项奖励独立取整后相加
pub fn compute(
    spent: f64,
    base_rate: f64,
    promos: &[promotions::Model],
) -> AppResult<PromotionOutcome> {
    let mut earned = base_points(spent, base_rate)?;
    let mut applied_promotion_ids = Vec::new();
    let mut one_time_to_consume = Vec::new();

    for promo in promos {
        if let Some(min) = promo.min_spending
            && spent < min
        {
            continue;
        }
        applied_promotion_ids.push(promo.id);
        if promo.is_one_time() {
            one_time_to_consume.push(promo.id);
        }
        if let Some(rate) = promo.rate {
            let bonus = to_points((spent * rate).floor())?;
            earned = earned.checked_add(bonus).ok_or_else(points_overflow)?;
        }
        if let Some(points) = promo.points {
            earned = earned.checked_add(points).ok_or_else(points_overflow)?;
        }
    }

    Ok(PromotionOutcome {
        earned,
        applied_promotion_ids,
        one_time_to_consume,
    })
}

/// 加载候选促销与该用户的一次性使用记录，然后校验并计算
pub async fn evaluate<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    spent: f64,
    requested: &[i64],
    now: DateTime<Utc>,
    base_rate: f64,
) -> AppResult<PromotionOutcome> {
    if requested.is_empty() {
        return compute(spent, base_rate, &[]);
    }

    let found = promotions::Entity::find()
        .filter(promotions::Column::Id.is_in(requested.to_vec()))
        .all(db)
        .await?;

    let consumed: HashSet<i64> = redemptions::Entity::find()
        .filter(redemptions::Column::UserId.eq(user_id))
        .filter(redemptions::Column::PromotionId.is_in(requested.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.promotion_id)
        .collect();

    let ordered = validate_batch(requested, &found, &consumed, now)?;
    compute(spent, base_rate, &ordered)
}
