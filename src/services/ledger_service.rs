use crate::config::LedgerConfig;
use crate::entities::{
    TransactionType, promotion_redemption_entity as redemptions,
    transaction_entity as transactions, transaction_promotion_entity as tx_promotions,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    Actor, AdjustmentRequest, AmountOperator, AwardTarget, EventAwardRequest, PurchaseRequest,
    RedemptionRequest, TransactionQuery, TransactionReceipt, TransactionView, TransferReceipt,
    TransferRequest,
};
use crate::services::authorization::{Permission, authorize};
use crate::services::{
    balance_store, event_pool, promotion_evaluator, redemption_workflow, suspicious_gate,
    transfer_engine,
};
use crate::utils::{PaginatedResponse, SharedClock};
use log::info;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;

/// 积分账本的唯一写入口。每个写操作是一个数据库事务：
/// 提交前任何一步失败，事务被丢弃，已做的修改全部回滚。
#[derive(Clone)]
pub struct LedgerService {
    pool: DatabaseConnection,
    config: LedgerConfig,
    clock: SharedClock,
}

impl LedgerService {
    pub fn new(pool: DatabaseConnection, config: LedgerConfig, clock: SharedClock) -> Self {
        Self {
            pool,
            config,
            clock,
        }
    }

    /// 记录消费并按基础倍率与促销计算积分
    ///
    /// 逻辑:
    /// 1. 锁定会员行，校验整批促销
    /// 2. 写入流水、促销关联与一次性促销使用记录
    /// 3. 收银员被标记可疑时流水照常写入但不入账（earned 返回 0）
    pub async fn record_purchase(
        &self,
        actor: &Actor,
        request: PurchaseRequest,
    ) -> AppResult<TransactionReceipt> {
        authorize(actor, Permission::RecordPurchase)?;
        if !request.spent.is_finite() || request.spent <= 0.0 {
            return Err(AppError::ValidationError(
                "Spent must be a positive number".to_string(),
            ));
        }
        let now = self.clock.now();

        let txn = self.pool.begin().await?;

        let customer = balance_store::lock_user(&txn, request.user_id).await?;
        let creator = balance_store::find_user(&txn, actor.user_id).await?;

        let outcome = promotion_evaluator::evaluate(
            &txn,
            customer.id,
            request.spent,
            &request.promotion_ids,
            now,
            self.config.base_rate,
        )
        .await?;

        let held = creator.suspicious;
        let mut entry = transactions::ActiveModel::entry(
            TransactionType::Purchase,
            customer.id,
            outcome.earned,
            actor.user_id,
            &request.remark,
            now,
        );
        entry.spent = Set(Some(request.spent));
        entry.suspicious = Set(held);
        let tx = entry.insert(&txn).await?;

        if !outcome.applied_promotion_ids.is_empty() {
            tx_promotions::Entity::insert_many(outcome.applied_promotion_ids.iter().map(|id| {
                tx_promotions::ActiveModel {
                    transaction_id: Set(tx.id),
                    promotion_id: Set(*id),
                }
            }))
            .exec_without_returning(&txn)
            .await?;
        }

        for promotion_id in &outcome.one_time_to_consume {
            redemptions::Entity::insert(redemptions::ActiveModel {
                promotion_id: Set(*promotion_id),
                user_id: Set(customer.id),
                transaction_id: Set(tx.id),
                created_at: Set(now),
            })
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::on_unique_violation(e, "One-time promotion already used"))?;
        }

        if !held {
            balance_store::credit(&txn, customer.id, outcome.earned).await?;
        }

        txn.commit().await?;

        info!(
            "purchase recorded: tx={} user={} spent={} earned={} held={}",
            tx.id, customer.id, request.spent, outcome.earned, held
        );

        Ok(TransactionReceipt {
            earned: Some(if held { 0 } else { outcome.earned }),
            promotion_ids: Some(outcome.applied_promotion_ids),
            ..TransactionReceipt::from(&tx)
        })
    }

    /// 经理调整积分，无论操作者是否可疑都立即生效
    pub async fn record_adjustment(
        &self,
        actor: &Actor,
        request: AdjustmentRequest,
    ) -> AppResult<TransactionReceipt> {
        authorize(actor, Permission::RecordAdjustment)?;
        if request.amount == 0 {
            return Err(AppError::ValidationError(
                "Adjustment amount must be non-zero".to_string(),
            ));
        }
        let now = self.clock.now();

        let txn = self.pool.begin().await?;

        balance_store::lock_user(&txn, request.user_id).await?;
        transactions::Entity::find_by_id(request.related_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Transaction {} not found", request.related_id))
            })?;

        balance_store::apply_delta(&txn, request.user_id, request.amount).await?;

        let mut entry = transactions::ActiveModel::entry(
            TransactionType::Adjustment,
            request.user_id,
            request.amount,
            actor.user_id,
            &request.remark,
            now,
        );
        entry.related_id = Set(Some(request.related_id));
        let tx = entry.insert(&txn).await?;

        txn.commit().await?;

        info!(
            "adjustment recorded: tx={} user={} amount={} related={}",
            tx.id, tx.user_id, tx.amount, request.related_id
        );
        Ok(TransactionReceipt::from(&tx))
    }

    /// 会员发起兑换申请，余额在处理时才扣减
    pub async fn record_redemption_request(
        &self,
        actor: &Actor,
        request: RedemptionRequest,
    ) -> AppResult<TransactionReceipt> {
        authorize(actor, Permission::RequestRedemption)?;
        if request.amount <= 0 {
            return Err(AppError::ValidationError(
                "Redemption amount must be positive".to_string(),
            ));
        }
        let now = self.clock.now();

        let txn = self.pool.begin().await?;

        let user = balance_store::lock_user(&txn, actor.user_id).await?;
        if !user.verified {
            return Err(AppError::PermissionDenied(
                "User must be verified to redeem points".to_string(),
            ));
        }
        if user.points < request.amount {
            return Err(AppError::Conflict("Insufficient point balance".to_string()));
        }

        let tx = transactions::ActiveModel::entry(
            TransactionType::Redemption,
            user.id,
            request.amount,
            user.id,
            &request.remark,
            now,
        )
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            "redemption requested: tx={} user={} amount={}",
            tx.id, tx.user_id, tx.amount
        );
        Ok(TransactionReceipt::from(&tx))
    }

    pub async fn process_redemption(
        &self,
        actor: &Actor,
        transaction_id: i64,
    ) -> AppResult<TransactionReceipt> {
        authorize(actor, Permission::ProcessRedemption)?;

        let txn = self.pool.begin().await?;
        let tx = redemption_workflow::process(&txn, actor.user_id, transaction_id).await?;
        txn.commit().await?;

        info!(
            "redemption processed: tx={} user={} amount={} by={}",
            tx.id, tx.user_id, tx.amount, actor.user_id
        );
        Ok(TransactionReceipt::from(&tx))
    }

    pub async fn transfer(
        &self,
        actor: &Actor,
        request: TransferRequest,
    ) -> AppResult<TransferReceipt> {
        authorize(actor, Permission::TransferPoints)?;
        let now = self.clock.now();

        let txn = self.pool.begin().await?;
        let (sent, received) = transfer_engine::transfer(&txn, actor.user_id, &request, now).await?;
        txn.commit().await?;

        info!(
            "transfer recorded: from={} to={} amount={}",
            sent.user_id, received.user_id, received.amount
        );
        Ok(TransferReceipt {
            sent: TransactionReceipt::from(&sent),
            received: TransactionReceipt::from(&received),
        })
    }

    /// 活动积分发放，活动组织者或经理以上
    pub async fn award_event_points(
        &self,
        actor: &Actor,
        event_id: i64,
        request: EventAwardRequest,
    ) -> AppResult<Vec<TransactionReceipt>> {
        let now = self.clock.now();

        let txn = self.pool.begin().await?;

        // 鉴权先于活动查询；组织者记录只存在于已有活动上
        let is_organizer = event_pool::is_organizer(&txn, event_id, actor.user_id).await?;
        authorize(actor, Permission::AwardEventPoints { is_organizer })?;
        event_pool::lock_event(&txn, event_id).await?;

        let awarded = match request.target {
            AwardTarget::Guest(guest_id) => vec![
                event_pool::award_to_one(
                    &txn,
                    event_id,
                    guest_id,
                    request.amount,
                    actor.user_id,
                    &request.remark,
                    now,
                )
                .await?,
            ],
            AwardTarget::AllGuests => {
                event_pool::award_to_all(
                    &txn,
                    event_id,
                    request.amount,
                    actor.user_id,
                    &request.remark,
                    now,
                )
                .await?
            }
        };

        txn.commit().await?;

        info!(
            "event points awarded: event={} guests={} amount_each={}",
            event_id,
            awarded.len(),
            request.amount
        );
        Ok(awarded.iter().map(TransactionReceipt::from).collect())
    }

    pub async fn toggle_suspicious(
        &self,
        actor: &Actor,
        transaction_id: i64,
        suspicious: bool,
    ) -> AppResult<TransactionView> {
        authorize(actor, Permission::FlagTransaction)?;

        let txn = self.pool.begin().await?;
        let tx = suspicious_gate::toggle(&txn, transaction_id, suspicious).await?;
        let promotion_ids = promotion_ids_for(&txn, &[tx.id])
            .await?
            .remove(&tx.id)
            .unwrap_or_default();
        txn.commit().await?;

        info!(
            "transaction {} suspicious={} by={}",
            tx.id, tx.suspicious, actor.user_id
        );
        TransactionView::from_model(tx, promotion_ids)
    }

    pub async fn get_transaction(
        &self,
        actor: &Actor,
        transaction_id: i64,
    ) -> AppResult<TransactionView> {
        authorize(actor, Permission::ViewAllTransactions)?;

        let tx = transactions::Entity::find_by_id(transaction_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {transaction_id} not found")))?;
        let promotion_ids = promotion_ids_for(&self.pool, &[tx.id])
            .await?
            .remove(&tx.id)
            .unwrap_or_default();
        TransactionView::from_model(tx, promotion_ids)
    }

    pub async fn list_transactions(
        &self,
        actor: &Actor,
        query: TransactionQuery,
    ) -> AppResult<PaginatedResponse<TransactionView>> {
        authorize(actor, Permission::ViewAllTransactions)?;
        self.query_transactions(query).await
    }

    /// 仅返回本人的流水，忽略请求中的 user_id
    pub async fn list_user_transactions(
        &self,
        actor: &Actor,
        query: TransactionQuery,
    ) -> AppResult<PaginatedResponse<TransactionView>> {
        self.query_transactions(TransactionQuery {
            user_id: Some(actor.user_id),
            ..query
        })
        .await
    }

    /// 本人或经理以上可查询
    pub async fn balance_of(&self, actor: &Actor, user_id: i64) -> AppResult<i64> {
        if actor.user_id != user_id {
            authorize(actor, Permission::ViewAllTransactions)?;
        }
        balance_store::balance_of(&self.pool, user_id).await
    }

    async fn query_transactions(
        &self,
        query: TransactionQuery,
    ) -> AppResult<PaginatedResponse<TransactionView>> {
        let mut select = transactions::Entity::find();

        if let Some(user_id) = query.user_id {
            select = select.filter(transactions::Column::UserId.eq(user_id));
        }
        if let Some(created_by) = query.created_by {
            select = select.filter(transactions::Column::CreatedBy.eq(created_by));
        }
        if let Some(transaction_type) = query.transaction_type {
            select = select.filter(transactions::Column::TransactionType.eq(transaction_type));
        }
        if let Some(suspicious) = query.suspicious {
            select = select.filter(transactions::Column::Suspicious.eq(suspicious));
        }
        if let Some(related_id) = query.related_id {
            select = select.filter(transactions::Column::RelatedId.eq(related_id));
        }
        if let Some(promotion_id) = query.promotion_id {
            select = select.filter(
                transactions::Column::Id.in_subquery(
                    Query::select()
                        .column(tx_promotions::Column::TransactionId)
                        .from(tx_promotions::Entity)
                        .and_where(tx_promotions::Column::PromotionId.eq(promotion_id))
                        .to_owned(),
                ),
            );
        }
        if let (Some(amount), Some(operator)) = (query.amount, query.operator) {
            select = select.filter(match operator {
                AmountOperator::Gte => transactions::Column::Amount.gte(amount),
                AmountOperator::Lte => transactions::Column::Amount.lte(amount),
            });
        }

        let params = query.pagination;
        let total = select.clone().count(&self.pool).await?;

        let models = select
            .order_by_asc(transactions::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        let ids: Vec<i64> = models.iter().map(|tx| tx.id).collect();
        let mut promotion_ids = promotion_ids_for(&self.pool, &ids).await?;

        let items = models
            .into_iter()
            .map(|tx| {
                let applied = promotion_ids.remove(&tx.id).unwrap_or_default();
                TransactionView::from_model(tx, applied)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(items, &params, total))
    }
}

/// 批量读取流水关联的促销 id
async fn promotion_ids_for<C: ConnectionTrait>(
    db: &C,
    transaction_ids: &[i64],
) -> AppResult<HashMap<i64, Vec<i64>>> {
    if transaction_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let links = tx_promotions::Entity::find()
        .filter(tx_promotions::Column::TransactionId.is_in(transaction_ids.to_vec()))
        .order_by_asc(tx_promotions::Column::PromotionId)
        .all(db)
        .await?;

    let mut grouped: HashMap<i64, Vec<i64>> = HashMap::new();
    for link in links {
        grouped
            .entry(link.transaction_id)
            .or_default()
            .push(link.promotion_id);
    }
    Ok(grouped)
}
