use crate::entities::event_entity as events;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    /// 积分池总额
    pub points: i64,
}

/// capacity 的 Some(None) 表示取消人数限制
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub capacity: Option<Option<i32>>,
}

impl UpdateEventRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.capacity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points_remain: i64,
    pub points_awarded: i64,
    pub total_points: i64,
    pub published: bool,
    pub guest_ids: Vec<i64>,
    pub organizer_ids: Vec<i64>,
}

impl EventResponse {
    pub fn new(event: events::Model, guest_ids: Vec<i64>, organizer_ids: Vec<i64>) -> Self {
        Self {
            id: event.id,
            total_points: event.total_points(),
            name: event.name,
            description: event.description,
            location: event.location,
            start_time: event.start_time,
            end_time: event.end_time,
            capacity: event.capacity,
            points_remain: event.points_remain,
            points_awarded: event.points_awarded,
            published: event.published,
            guest_ids,
            organizer_ids,
        }
    }
}

/// 积分池快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPool {
    pub event_id: i64,
    pub points_remain: i64,
    pub points_awarded: i64,
}

impl EventPool {
    pub fn total(&self) -> i64 {
        self.points_remain + self.points_awarded
    }
}

impl From<&events::Model> for EventPool {
    fn from(event: &events::Model) -> Self {
        Self {
            event_id: event.id,
            points_remain: event.points_remain,
            points_awarded: event.points_awarded,
        }
    }
}
