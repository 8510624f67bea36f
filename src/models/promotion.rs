use crate::entities::PromotionType;
use crate::entities::promotion_entity as promotions;
use crate::utils::PaginationParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePromotionRequest {
    pub name: String,
    pub description: String,
    pub promotion_type: PromotionType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

/// 外层 None 表示不修改；min_spending / rate / points 的 Some(None) 表示清空
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePromotionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub promotion_type: Option<PromotionType>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub min_spending: Option<Option<f64>>,
    pub rate: Option<Option<f64>>,
    pub points: Option<Option<i64>>,
}

impl UpdatePromotionRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.promotion_type.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.min_spending.is_none()
            && self.rate.is_none()
            && self.points.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromotionQuery {
    pub name: Option<String>,
    pub promotion_type: Option<PromotionType>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub promotion_type: PromotionType,
    /// 仅管理员可见
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

impl From<promotions::Model> for PromotionResponse {
    fn from(p: promotions::Model) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            promotion_type: p.promotion_type,
            start_time: Some(p.start_time),
            end_time: p.end_time,
            min_spending: p.min_spending,
            rate: p.rate,
            points: p.points,
        }
    }
}
