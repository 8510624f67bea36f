mod common;

use chrono::Duration;
use common::{actor, setup};
use loyalty_ledger::AppError;
use loyalty_ledger::entities::{PromotionType, Role};
use loyalty_ledger::models::{
    CreatePromotionRequest, PromotionQuery, PurchaseRequest, UpdatePromotionRequest,
};
use loyalty_ledger::utils::Clock;

fn weekend_bonus(ctx: &common::TestContext) -> CreatePromotionRequest {
    let now = ctx.clock.now();
    CreatePromotionRequest {
        name: "Weekend bonus".to_string(),
        description: "Extra points on weekends".to_string(),
        promotion_type: PromotionType::Automatic,
        start_time: now + Duration::hours(1),
        end_time: now + Duration::days(2),
        min_spending: Some(10.0),
        rate: Some(0.25),
        points: None,
    }
}

#[tokio::test]
async fn test_create_promotion_validation() {
    let ctx = setup().await;
    let manager = actor(&ctx.user("manager1", Role::Manager, 0).await);
    let cashier = actor(&ctx.user("cashier1", Role::Cashier, 0).await);

    let created = ctx
        .promotions
        .create_promotion(&manager, weekend_bonus(&ctx))
        .await
        .unwrap();
    assert_eq!(created.name, "Weekend bonus");
    assert!(created.start_time.is_some());

    let err = ctx
        .promotions
        .create_promotion(&cashier, weekend_bonus(&ctx))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let now = ctx.clock.now();
    let invalid = [
        CreatePromotionRequest {
            start_time: now - Duration::minutes(1),
            ..weekend_bonus(&ctx)
        },
        CreatePromotionRequest {
            end_time: now + Duration::minutes(30),
            ..weekend_bonus(&ctx)
        },
        CreatePromotionRequest {
            rate: Some(0.0),
            ..weekend_bonus(&ctx)
        },
        CreatePromotionRequest {
            min_spending: Some(-1.0),
            ..weekend_bonus(&ctx)
        },
        CreatePromotionRequest {
            points: Some(-5),
            ..weekend_bonus(&ctx)
        },
        CreatePromotionRequest {
            name: "  ".to_string(),
            ..weekend_bonus(&ctx)
        },
    ];
    for request in invalid {
        let err = ctx
            .promotions
            .create_promotion(&manager, request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}

#[tokio::test]
async fn test_promotion_is_frozen_once_started() {
    let ctx = setup().await;
    let manager = actor(&ctx.user("manager1", Role::Manager, 0).await);
    let created = ctx
        .promotions
        .create_promotion(&manager, weekend_bonus(&ctx))
        .await
        .unwrap();

    let err = ctx
        .promotions
        .update_promotion(&manager, created.id, UpdatePromotionRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let updated = ctx
        .promotions
        .update_promotion(
            &manager,
            created.id,
            UpdatePromotionRequest {
                rate: Some(None),
                points: Some(Some(20)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.rate, None);
    assert_eq!(updated.points, Some(20));
    assert_eq!(updated.min_spending, Some(10.0));

    ctx.clock.advance(Duration::hours(2));

    let err = ctx
        .promotions
        .update_promotion(
            &manager,
            created.id,
            UpdatePromotionRequest {
                points: Some(Some(30)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StateError(_)));

    let err = ctx
        .promotions
        .delete_promotion(&manager, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StateError(_)));
}

#[tokio::test]
async fn test_delete_before_start() {
    let ctx = setup().await;
    let manager = actor(&ctx.user("manager1", Role::Manager, 0).await);
    let created = ctx
        .promotions
        .create_promotion(&manager, weekend_bonus(&ctx))
        .await
        .unwrap();

    ctx.promotions
        .delete_promotion(&manager, created.id)
        .await
        .unwrap();
    let err = ctx
        .promotions
        .get_promotion(&manager, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_regular_users_see_only_usable_promotions() {
    let ctx = setup().await;
    let manager = actor(&ctx.user("manager1", Role::Manager, 0).await);
    let cashier = actor(&ctx.user("cashier1", Role::Cashier, 0).await);
    let member_model = ctx.user("member01", Role::Regular, 0).await;
    let member = actor(&member_model);

    let upcoming = ctx
        .promotions
        .create_promotion(&manager, weekend_bonus(&ctx))
        .await
        .unwrap();
    let automatic = ctx
        .active_promotion(PromotionType::Automatic, None, Some(0.1), None)
        .await;
    let one_time = ctx
        .active_promotion(PromotionType::OneTime, None, None, Some(25))
        .await;

    let all = ctx
        .promotions
        .list_promotions(&manager, PromotionQuery::default())
        .await
        .unwrap();
    assert_eq!(all.pagination.total, 3);

    let visible = ctx
        .promotions
        .list_promotions(&member, PromotionQuery::default())
        .await
        .unwrap();
    let ids: Vec<i64> = visible.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![automatic.id, one_time.id]);
    assert!(visible.items.iter().all(|p| p.start_time.is_none()));

    let err = ctx
        .promotions
        .get_promotion(&member, upcoming.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    ctx.ledger
        .record_purchase(
            &cashier,
            PurchaseRequest {
                user_id: member_model.id,
                spent: 10.0,
                promotion_ids: vec![one_time.id],
                remark: String::new(),
            },
        )
        .await
        .unwrap();

    let visible = ctx
        .promotions
        .list_promotions(
            &member,
            PromotionQuery {
                promotion_type: Some(PromotionType::OneTime),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(visible.pagination.total, 0);
}
