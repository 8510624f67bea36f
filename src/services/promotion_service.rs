use crate::entities::{
    Role, promotion_entity as promotions, promotion_redemption_entity as redemptions,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    Actor, CreatePromotionRequest, PromotionQuery, PromotionResponse, UpdatePromotionRequest,
};
use crate::services::authorization::{Permission, authorize};
use crate::utils::{PaginatedResponse, SharedClock};
use chrono::{DateTime, Utc};
use log::info;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

/// 促销管理：开始前可修改或删除，开始后只读
#[derive(Clone)]
pub struct PromotionService {
    pool: DatabaseConnection,
    clock: SharedClock,
}

/// 合并后的促销字段，用于统一校验
struct PromotionFields<'a> {
    name: &'a str,
    description: &'a str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    min_spending: Option<f64>,
    rate: Option<f64>,
    points: Option<i64>,
}

impl PromotionFields<'_> {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Description is required".to_string(),
            ));
        }
        if self.end_time <= self.start_time {
            return Err(AppError::ValidationError(
                "End time must be after start time".to_string(),
            ));
        }
        if let Some(min) = self.min_spending
            && !(min.is_finite() && min > 0.0)
        {
            return Err(AppError::ValidationError(
                "Minimum spending must be a positive number".to_string(),
            ));
        }
        if let Some(rate) = self.rate
            && !(rate.is_finite() && rate > 0.0)
        {
            return Err(AppError::ValidationError(
                "Rate must be a positive number".to_string(),
            ));
        }
        if let Some(points) = self.points
            && points < 0
        {
            return Err(AppError::ValidationError(
                "Points must be a non-negative integer".to_string(),
            ));
        }
        Ok(())
    }
}

impl PromotionService {
    pub fn new(pool: DatabaseConnection, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    pub async fn create_promotion(
        &self,
        actor: &Actor,
        request: CreatePromotionRequest,
    ) -> AppResult<PromotionResponse> {
        authorize(actor, Permission::ManagePromotions)?;
        let now = self.clock.now();

        PromotionFields {
            name: &request.name,
            description: &request.description,
            start_time: request.start_time,
            end_time: request.end_time,
            min_spending: request.min_spending,
            rate: request.rate,
            points: request.points,
        }
        .validate()?;
        if request.start_time <= now {
            return Err(AppError::ValidationError(
                "Start time must be in the future".to_string(),
            ));
        }

        let model = promotions::ActiveModel {
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            promotion_type: Set(request.promotion_type),
            start_time: Set(request.start_time),
            end_time: Set(request.end_time),
            min_spending: Set(request.min_spending),
            rate: Set(request.rate),
            points: Set(request.points),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        info!("promotion {} created by {}", model.id, actor.user_id);
        Ok(model.into())
    }

    pub async fn update_promotion(
        &self,
        actor: &Actor,
        promotion_id: i64,
        request: UpdatePromotionRequest,
    ) -> AppResult<PromotionResponse> {
        authorize(actor, Permission::ManagePromotions)?;
        if request.is_empty() {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }
        let now = self.clock.now();

        let existing = self.find(promotion_id).await?;
        if existing.has_started(now) {
            return Err(AppError::StateError(
                "Cannot update a promotion after it has started".to_string(),
            ));
        }

        let name = request.name.clone().unwrap_or_else(|| existing.name.clone());
        let description = request
            .description
            .clone()
            .unwrap_or_else(|| existing.description.clone());
        let start_time = request.start_time.unwrap_or(existing.start_time);
        let end_time = request.end_time.unwrap_or(existing.end_time);
        let min_spending = request.min_spending.unwrap_or(existing.min_spending);
        let rate = request.rate.unwrap_or(existing.rate);
        let points = request.points.unwrap_or(existing.points);

        PromotionFields {
            name: &name,
            description: &description,
            start_time,
            end_time,
            min_spending,
            rate,
            points,
        }
        .validate()?;
        if request.start_time.is_some() && start_time <= now {
            return Err(AppError::ValidationError(
                "Start time must be in the future".to_string(),
            ));
        }

        let promotion_type = request.promotion_type.unwrap_or(existing.promotion_type);
        let mut active = existing.into_active_model();
        active.name = Set(name.trim().to_string());
        active.description = Set(description);
        active.promotion_type = Set(promotion_type);
        active.start_time = Set(start_time);
        active.end_time = Set(end_time);
        active.min_spending = Set(min_spending);
        active.rate = Set(rate);
        active.points = Set(points);
        let model = active.update(&self.pool).await?;

        info!("promotion {} updated by {}", model.id, actor.user_id);
        Ok(model.into())
    }

    pub async fn delete_promotion(&self, actor: &Actor, promotion_id: i64) -> AppResult<()> {
        authorize(actor, Permission::ManagePromotions)?;
        let now = self.clock.now();

        let existing = self.find(promotion_id).await?;
        if existing.has_started(now) {
            return Err(AppError::StateError(
                "Cannot delete a promotion after it has started".to_string(),
            ));
        }
        existing.delete(&self.pool).await?;

        info!("promotion {} deleted by {}", promotion_id, actor.user_id);
        Ok(())
    }

    /// 普通会员只能看到生效中的促销，且不返回开始时间
    pub async fn get_promotion(
        &self,
        actor: &Actor,
        promotion_id: i64,
    ) -> AppResult<PromotionResponse> {
        authorize(actor, Permission::ViewPromotions)?;
        let promotion = self.find(promotion_id).await?;

        if actor.has_clearance(Role::Manager) {
            return Ok(promotion.into());
        }
        if !promotion.is_active(self.clock.now()) {
            return Err(AppError::NotFound(format!(
                "Promotion {promotion_id} not found"
            )));
        }
        Ok(PromotionResponse {
            start_time: None,
            ..promotion.into()
        })
    }

    /// 普通会员：仅生效中的促销，且排除自己已用过的一次性促销
    pub async fn list_promotions(
        &self,
        actor: &Actor,
        query: PromotionQuery,
    ) -> AppResult<PaginatedResponse<PromotionResponse>> {
        authorize(actor, Permission::ViewPromotions)?;
        let is_manager = actor.has_clearance(Role::Manager);

        let mut select = promotions::Entity::find();
        if let Some(name) = query.name.as_deref() {
            select = select.filter(promotions::Column::Name.contains(name));
        }
        if let Some(promotion_type) = query.promotion_type {
            select = select.filter(promotions::Column::PromotionType.eq(promotion_type));
        }
        if !is_manager {
            let now = self.clock.now();
            select = select
                .filter(promotions::Column::StartTime.lte(now))
                .filter(promotions::Column::EndTime.gt(now))
                .filter(
                    promotions::Column::Id.not_in_subquery(
                        Query::select()
                            .column(redemptions::Column::PromotionId)
                            .from(redemptions::Entity)
                            .and_where(redemptions::Column::UserId.eq(actor.user_id))
                            .to_owned(),
                    ),
                );
        }

        let params = query.pagination;
        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_asc(promotions::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|p| {
                let response = PromotionResponse::from(p);
                if is_manager {
                    response
                } else {
                    PromotionResponse {
                        start_time: None,
                        ..response
                    }
                }
            })
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    async fn find(&self, promotion_id: i64) -> AppResult<promotions::Model> {
        promotions::Entity::find_by_id(promotion_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Promotion {promotion_id} not found")))
    }
}
