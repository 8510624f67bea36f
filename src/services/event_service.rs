use crate::entities::{
    Role, event_entity as events, event_guest_entity as guests,
    event_organizer_entity as organizers,
};
use crate::error::{AppError, AppResult};
use crate::models::{Actor, CreateEventRequest, EventPool, EventResponse, UpdateEventRequest};
use crate::services::authorization::{Permission, authorize};
use crate::services::{balance_store, event_pool};
use crate::utils::SharedClock;
use log::info;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    ModelTrait, Set, TransactionTrait,
};

/// 活动及其嘉宾、组织者名单。积分发放走 LedgerService。
#[derive(Clone)]
pub struct EventService {
    pool: DatabaseConnection,
    clock: SharedClock,
}

impl EventService {
    pub fn new(pool: DatabaseConnection, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    pub async fn create_event(
        &self,
        actor: &Actor,
        request: CreateEventRequest,
    ) -> AppResult<EventResponse> {
        authorize(actor, Permission::ManageEvents)?;
        let now = self.clock.now();

        for (field, value) in [
            ("Name", &request.name),
            ("Description", &request.description),
            ("Location", &request.location),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::ValidationError(format!("{field} is required")));
            }
        }
        if request.start_time < now {
            return Err(AppError::ValidationError(
                "Start time cannot be in the past".to_string(),
            ));
        }
        if request.end_time <= request.start_time {
            return Err(AppError::ValidationError(
                "End time must be after start time".to_string(),
            ));
        }
        validate_capacity(request.capacity)?;
        if request.points <= 0 {
            return Err(AppError::ValidationError(
                "Event points must be positive".to_string(),
            ));
        }

        let event = events::ActiveModel {
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            location: Set(request.location),
            start_time: Set(request.start_time),
            end_time: Set(request.end_time),
            capacity: Set(request.capacity),
            points_remain: Set(request.points),
            points_awarded: Set(0),
            published: Set(false),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        info!(
            "event {} created by {} with {} points",
            event.id, actor.user_id, event.points_remain
        );
        Ok(EventResponse::new(event, Vec::new(), Vec::new()))
    }

    /// 未发布的活动只对经理和组织者可见
    pub async fn get_event(&self, actor: &Actor, event_id: i64) -> AppResult<EventResponse> {
        let event = event_pool::find_event(&self.pool, event_id).await?;
        let organizer_ids = event_pool::organizer_ids(&self.pool, event_id).await?;

        if !event.published
            && !actor.has_clearance(Role::Manager)
            && !organizer_ids.contains(&actor.user_id)
        {
            return Err(AppError::NotFound(format!("Event {event_id} not found")));
        }

        let guest_ids = event_pool::guest_ids(&self.pool, event_id).await?;
        Ok(EventResponse::new(event, guest_ids, organizer_ids))
    }

    /// 开始后只能改结束时间，结束后全部锁定
    pub async fn update_event(
        &self,
        actor: &Actor,
        event_id: i64,
        request: UpdateEventRequest,
    ) -> AppResult<EventResponse> {
        authorize(actor, Permission::ManageEvents)?;
        if request.is_empty() {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }
        let now = self.clock.now();

        let txn = self.pool.begin().await?;
        let event = event_pool::lock_event(&txn, event_id).await?;

        let touches_started_fields = request.name.is_some()
            || request.description.is_some()
            || request.location.is_some()
            || request.start_time.is_some()
            || request.capacity.is_some();
        if event.has_started(now) && touches_started_fields {
            return Err(AppError::StateError(
                "Cannot update event details after it has started".to_string(),
            ));
        }
        if event.has_ended(now) && request.end_time.is_some() {
            return Err(AppError::StateError(
                "Cannot update end time after the event has ended".to_string(),
            ));
        }

        if let Some(start_time) = request.start_time
            && start_time < now
        {
            return Err(AppError::ValidationError(
                "Start time cannot be in the past".to_string(),
            ));
        }
        if let Some(end_time) = request.end_time
            && end_time < now
        {
            return Err(AppError::ValidationError(
                "End time cannot be in the past".to_string(),
            ));
        }
        let start_time = request.start_time.unwrap_or(event.start_time);
        let end_time = request.end_time.unwrap_or(event.end_time);
        if end_time <= start_time {
            return Err(AppError::ValidationError(
                "End time must be after start time".to_string(),
            ));
        }

        for value in [&request.name, &request.description, &request.location]
            .into_iter()
            .flatten()
        {
            if value.trim().is_empty() {
                return Err(AppError::ValidationError(
                    "Fields cannot be empty".to_string(),
                ));
            }
        }

        if let Some(capacity) = request.capacity {
            validate_capacity(capacity)?;
            if let Some(limit) = capacity {
                let guests = event_pool::guest_count(&txn, event_id).await?;
                if u64::try_from(limit).unwrap_or(0) < guests {
                    return Err(AppError::Conflict(format!(
                        "Capacity {limit} is below the current {guests} guests"
                    )));
                }
            }
        }

        let mut active = event.into_active_model();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(location) = request.location {
            active.location = Set(location);
        }
        active.start_time = Set(start_time);
        active.end_time = Set(end_time);
        if let Some(capacity) = request.capacity {
            active.capacity = Set(capacity);
        }
        let event = active.update(&txn).await?;

        let guest_ids = event_pool::guest_ids(&txn, event_id).await?;
        let organizer_ids = event_pool::organizer_ids(&txn, event_id).await?;
        txn.commit().await?;

        info!("event {} updated by {}", event_id, actor.user_id);
        Ok(EventResponse::new(event, guest_ids, organizer_ids))
    }

    pub async fn publish_event(&self, actor: &Actor, event_id: i64) -> AppResult<EventResponse> {
        authorize(actor, Permission::ManageEvents)?;

        let txn = self.pool.begin().await?;
        let event = event_pool::lock_event(&txn, event_id).await?;
        let event = if event.published {
            event
        } else {
            let mut active = event.into_active_model();
            active.published = Set(true);
            active.update(&txn).await?
        };
        let response = member_response(&txn, event).await?;
        txn.commit().await?;

        info!("event {} published by {}", event_id, actor.user_id);
        Ok(response)
    }

    /// 经理调整积分池总额
    pub async fn resize_pool(
        &self,
        actor: &Actor,
        event_id: i64,
        new_total: i64,
    ) -> AppResult<EventPool> {
        authorize(actor, Permission::ResizeEventPool)?;

        let txn = self.pool.begin().await?;
        let event = event_pool::resize(&txn, event_id, new_total).await?;
        txn.commit().await?;

        info!(
            "event {} pool resized to {} (awarded {})",
            event_id, new_total, event.points_awarded
        );
        Ok(EventPool::from(&event))
    }

    pub async fn add_guest(
        &self,
        actor: &Actor,
        event_id: i64,
        user_id: i64,
    ) -> AppResult<EventResponse> {
        let now = self.clock.now();
        let txn = self.pool.begin().await?;

        let event = event_pool::lock_event(&txn, event_id).await?;
        let is_organizer = event_pool::is_organizer(&txn, event_id, actor.user_id).await?;
        authorize(actor, Permission::AddEventGuest { is_organizer })?;

        balance_store::find_user(&txn, user_id).await?;
        if event.has_ended(now) {
            return Err(AppError::StateError("Event has already ended".to_string()));
        }
        if event_pool::is_organizer(&txn, event_id, user_id).await? {
            return Err(AppError::ValidationError(format!(
                "User {user_id} is an organizer of event {event_id}"
            )));
        }
        if event_pool::is_guest(&txn, event_id, user_id).await? {
            return Err(AppError::Conflict(format!(
                "User {user_id} is already a guest of event {event_id}"
            )));
        }
        if let Some(capacity) = event.capacity {
            let guests = event_pool::guest_count(&txn, event_id).await?;
            if guests >= u64::try_from(capacity).unwrap_or(0) {
                return Err(AppError::Conflict("Event is full".to_string()));
            }
        }

        guests::Entity::insert(guests::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            created_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "User is already a guest of this event"))?;

        let response = member_response(&txn, event).await?;
        txn.commit().await?;

        info!("user {} added as guest of event {}", user_id, event_id);
        Ok(response)
    }

    pub async fn remove_guest(&self, actor: &Actor, event_id: i64, user_id: i64) -> AppResult<()> {
        authorize(actor, Permission::RemoveEventGuest)?;

        let txn = self.pool.begin().await?;
        event_pool::lock_event(&txn, event_id).await?;
        let guest = guests::Entity::find_by_id((event_id, user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("User {user_id} is not a guest of event {event_id}"))
            })?;
        guest.delete(&txn).await?;
        txn.commit().await?;

        info!("user {} removed from guests of event {}", user_id, event_id);
        Ok(())
    }

    pub async fn add_organizer(
        &self,
        actor: &Actor,
        event_id: i64,
        user_id: i64,
    ) -> AppResult<EventResponse> {
        authorize(actor, Permission::ManageEventOrganizers)?;
        let now = self.clock.now();

        let txn = self.pool.begin().await?;
        let event = event_pool::lock_event(&txn, event_id).await?;
        balance_store::find_user(&txn, user_id).await?;

        if event.has_ended(now) {
            return Err(AppError::StateError("Event has already ended".to_string()));
        }
        if event_pool::is_guest(&txn, event_id, user_id).await? {
            return Err(AppError::ValidationError(format!(
                "User {user_id} is a guest of event {event_id}"
            )));
        }
        if event_pool::is_organizer(&txn, event_id, user_id).await? {
            return Err(AppError::Conflict(format!(
                "User {user_id} is already an organizer of event {event_id}"
            )));
        }

        organizers::Entity::insert(organizers::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            created_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await
        .map_err(|e| {
            AppError::on_unique_violation(e, "User is already an organizer of this event")
        })?;

        let response = member_response(&txn, event).await?;
        txn.commit().await?;

        info!("user {} added as organizer of event {}", user_id, event_id);
        Ok(response)
    }

    pub async fn remove_organizer(
        &self,
        actor: &Actor,
        event_id: i64,
        user_id: i64,
    ) -> AppResult<()> {
        authorize(actor, Permission::ManageEventOrganizers)?;

        let txn = self.pool.begin().await?;
        event_pool::lock_event(&txn, event_id).await?;
        let organizer = organizers::Entity::find_by_id((event_id, user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "User {user_id} is not an organizer of event {event_id}"
                ))
            })?;
        organizer.delete(&txn).await?;
        txn.commit().await?;

        info!("user {} removed from organizers of event {}", user_id, event_id);
        Ok(())
    }
}

fn validate_capacity(capacity: Option<i32>) -> AppResult<()> {
    match capacity {
        Some(limit) if limit <= 0 => Err(AppError::ValidationError(
            "Capacity must be a positive integer".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn member_response<C: ConnectionTrait>(
    db: &C,
    event: events::Model,
) -> AppResult<EventResponse> {
    let guest_ids = event_pool::guest_ids(db, event.id).await?;
    let organizer_ids = event_pool::organizer_ids(db, event.id).await?;
    Ok(EventResponse::new(event, guest_ids, organizer_ids))
}
