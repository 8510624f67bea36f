#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use loyalty_ledger::config::LedgerConfig;
use loyalty_ledger::entities::{
    PromotionType, Role, promotion_entity as promotions, user_entity as users,
};
use loyalty_ledger::models::{Actor, CreateEventRequest};
use loyalty_ledger::services::{EventService, LedgerService, PromotionService};
use loyalty_ledger::utils::{Clock, ManualClock, SharedClock};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

pub struct TestContext {
    pub db: DatabaseConnection,
    pub clock: ManualClock,
    pub ledger: LedgerService,
    pub promotions: PromotionService,
    pub events: EventService,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// 单连接的内存 SQLite，迁移使用真实的 migration crate
pub async fn setup() -> TestContext {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let clock = ManualClock::new(start_time());
    let shared: SharedClock = Arc::new(clock.clone());

    TestContext {
        ledger: LedgerService::new(db.clone(), LedgerConfig::default(), shared.clone()),
        promotions: PromotionService::new(db.clone(), shared.clone()),
        events: EventService::new(db.clone(), shared),
        db,
        clock,
    }
}

impl TestContext {
    pub async fn user(&self, utorid: &str, role: Role, points: i64) -> users::Model {
        users::ActiveModel {
            utorid: Set(utorid.to_string()),
            name: Set(utorid.to_uppercase()),
            role: Set(role),
            points: Set(points),
            verified: Set(true),
            suspicious: Set(false),
            created_at: Set(self.clock.now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }

    pub async fn flag_user(&self, user: &users::Model, suspicious: bool, verified: bool) {
        let mut active: users::ActiveModel = user.clone().into();
        active.suspicious = Set(suspicious);
        active.verified = Set(verified);
        active.update(&self.db).await.unwrap();
    }

    pub async fn points(&self, user_id: i64) -> i64 {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
            .points
    }

    /// 直接写入一个已生效的促销，绕过“开始时间必须在未来”的校验
    pub async fn active_promotion(
        &self,
        promotion_type: PromotionType,
        min_spending: Option<f64>,
        rate: Option<f64>,
        points: Option<i64>,
    ) -> promotions::Model {
        let now = self.clock.now();
        promotions::ActiveModel {
            name: Set("Seeded".to_string()),
            description: Set("seeded promotion".to_string()),
            promotion_type: Set(promotion_type),
            start_time: Set(now - Duration::days(1)),
            end_time: Set(now + Duration::days(7)),
            min_spending: Set(min_spending),
            rate: Set(rate),
            points: Set(points),
            created_at: Set(now - Duration::days(2)),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }

    /// 创建一小时后开始、持续一天的活动
    pub async fn event(&self, manager: &Actor, points: i64) -> i64 {
        let now = self.clock.now();
        self.events
            .create_event(
                manager,
                CreateEventRequest {
                    name: "Spring Social".to_string(),
                    description: "Term kickoff".to_string(),
                    location: "BA 1160".to_string(),
                    start_time: now + Duration::hours(1),
                    end_time: now + Duration::days(1),
                    capacity: None,
                    points,
                },
            )
            .await
            .unwrap()
            .id
    }
}

pub fn actor(user: &users::Model) -> Actor {
    Actor::new(user.id, user.role)
}
