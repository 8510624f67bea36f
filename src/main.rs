use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use loyalty_ledger::{
    config::Config,
    database::{create_pool, run_migrations},
    services::{EventService, LedgerService, PromotionService},
    utils::{SharedClock, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml()?;

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;

    // 运行数据库迁移
    run_migrations(&pool).await?;

    // 创建服务，由宿主 HTTP 层持有
    let clock: SharedClock = Arc::new(SystemClock);
    let _ledger = LedgerService::new(pool.clone(), config.ledger.clone(), clock.clone());
    let _promotions = PromotionService::new(pool.clone(), clock.clone());
    let _events = EventService::new(pool.clone(), clock);

    log::info!(
        "Loyalty ledger ready (base rate {} points per unit)",
        config.ledger.base_rate
    );

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    Ok(())
}
