mod common;

use common::{actor, setup};
use loyalty_ledger::AppError;
use loyalty_ledger::entities::{
    PromotionType, Role, TransactionType, promotion_redemption_entity as redemptions,
    transaction_entity as transactions,
};
use loyalty_ledger::models::{LedgerEntry, PurchaseRequest, TransactionQuery};
use sea_orm::{EntityTrait, PaginatorTrait};

fn purchase(user_id: i64, spent: f64, promotion_ids: Vec<i64>) -> PurchaseRequest {
    PurchaseRequest {
        user_id,
        spent,
        promotion_ids,
        remark: String::new(),
    }
}

#[tokio::test]
async fn test_purchase_earns_base_rate() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;

    let receipt = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 20.0, vec![]))
        .await
        .unwrap();

    assert_eq!(receipt.transaction_type, TransactionType::Purchase);
    assert_eq!(receipt.earned, Some(80));
    assert_eq!(receipt.amount, 80);
    assert_eq!(receipt.spent, Some(20.0));
    assert_eq!(receipt.promotion_ids, Some(vec![]));
    assert_eq!(receipt.created_by, cashier.id);
    assert_eq!(ctx.points(member.id).await, 80);
}

#[tokio::test]
async fn test_purchase_with_automatic_rate_promotion() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;
    let promo = ctx
        .active_promotion(PromotionType::Automatic, Some(10.0), Some(0.25), None)
        .await;

    let receipt = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 20.0, vec![promo.id]))
        .await
        .unwrap();

    assert_eq!(receipt.earned, Some(85));
    assert_eq!(receipt.promotion_ids, Some(vec![promo.id]));
    assert_eq!(ctx.points(member.id).await, 85);

    let view = ctx
        .ledger
        .get_transaction(
            &actor(&ctx.user("manager1", Role::Manager, 0).await),
            receipt.transaction_id,
        )
        .await
        .unwrap();
    assert_eq!(
        view.entry,
        LedgerEntry::Purchase {
            spent: 20.0,
            earned: 85,
            promotion_ids: vec![promo.id],
        }
    );
}

#[tokio::test]
async fn test_min_spending_excludes_promotion_silently() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;
    let promo = ctx
        .active_promotion(PromotionType::OneTime, Some(50.0), None, Some(100))
        .await;

    let receipt = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 20.0, vec![promo.id]))
        .await
        .unwrap();

    assert_eq!(receipt.earned, Some(80));
    assert_eq!(receipt.promotion_ids, Some(vec![]));
    // 未生效的一次性促销不算使用过
    assert_eq!(redemptions::Entity::find().count(&ctx.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_one_time_promotion_is_consumed_once() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;
    let promo = ctx
        .active_promotion(PromotionType::OneTime, None, None, Some(50))
        .await;

    let first = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 10.0, vec![promo.id]))
        .await
        .unwrap();
    assert_eq!(first.earned, Some(90));

    let err = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 10.0, vec![promo.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(ctx.points(member.id).await, 90);
    assert_eq!(transactions::Entity::find().count(&ctx.db).await.unwrap(), 1);

    // 其他会员不受影响
    let other = ctx.user("member02", Role::Regular, 0).await;
    let receipt = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(other.id, 10.0, vec![promo.id]))
        .await
        .unwrap();
    assert_eq!(receipt.earned, Some(90));
}

#[tokio::test]
async fn test_invalid_promotion_rejects_whole_purchase() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;
    let promo = ctx
        .active_promotion(PromotionType::Automatic, None, Some(0.5), None)
        .await;

    let err = ctx
        .ledger
        .record_purchase(
            &actor(&cashier),
            purchase(member.id, 20.0, vec![promo.id, promo.id + 100]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = ctx
        .ledger
        .record_purchase(
            &actor(&cashier),
            purchase(member.id, 20.0, vec![promo.id, promo.id]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    assert_eq!(ctx.points(member.id).await, 0);
    assert_eq!(transactions::Entity::find().count(&ctx.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_expired_promotion_is_rejected() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;
    let promo = ctx
        .active_promotion(PromotionType::Automatic, None, None, Some(5))
        .await;

    ctx.clock.advance(chrono::Duration::days(8));

    let err = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 20.0, vec![promo.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(ctx.points(member.id).await, 0);
}

#[tokio::test]
async fn test_suspicious_cashier_purchase_is_held_until_cleared() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let manager = ctx.user("manager1", Role::Manager, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;
    ctx.flag_user(&cashier, true, true).await;

    let receipt = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 10.0, vec![]))
        .await
        .unwrap();
    assert_eq!(receipt.earned, Some(0));
    assert_eq!(receipt.amount, 40);
    assert_eq!(ctx.points(member.id).await, 0);

    let view = ctx
        .ledger
        .toggle_suspicious(&actor(&manager), receipt.transaction_id, false)
        .await
        .unwrap();
    assert!(!view.suspicious);
    assert_eq!(ctx.points(member.id).await, 40);
}

#[tokio::test]
async fn test_purchase_requires_cashier_and_positive_spend() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;

    let err = ctx
        .ledger
        .record_purchase(&actor(&member), purchase(member.id, 20.0, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    for spent in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        let err = ctx
            .ledger
            .record_purchase(&actor(&cashier), purchase(member.id, spent, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    let err = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id + 100, 20.0, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_list_transactions_filters_by_promotion() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let manager = ctx.user("manager1", Role::Manager, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;
    let promo = ctx
        .active_promotion(PromotionType::Automatic, None, None, Some(3))
        .await;

    ctx.ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 5.0, vec![promo.id]))
        .await
        .unwrap();
    ctx.ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 5.0, vec![]))
        .await
        .unwrap();

    let page = ctx
        .ledger
        .list_transactions(
            &actor(&manager),
            TransactionQuery {
                promotion_id: Some(promo.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.items[0].entry.transaction_type(), TransactionType::Purchase);

    let mine = ctx
        .ledger
        .list_user_transactions(&actor(&member), TransactionQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.pagination.total, 2);

    let err = ctx
        .ledger
        .list_transactions(&actor(&member), TransactionQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_oversized_spend_is_rejected_without_writes() {
    let ctx = setup().await;
    let cashier = ctx.user("cashier1", Role::Cashier, 0).await;
    let member = ctx.user("member01", Role::Regular, 0).await;
    let bonus = ctx
        .active_promotion(PromotionType::OneTime, None, Some(0.5), Some(10))
        .await;

    let err = ctx
        .ledger
        .record_purchase(&actor(&cashier), purchase(member.id, 1e19, vec![bonus.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    assert_eq!(ctx.points(member.id).await, 0);
    assert_eq!(transactions::Entity::find().count(&ctx.db).await.unwrap(), 0);
    assert_eq!(redemptions::Entity::find().count(&ctx.db).await.unwrap(), 0);
}
