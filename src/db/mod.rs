use std::path::Path;

use log::info;
use sqlx::{SqlitePool, sqlite::*};

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

pub async fn init_db(filename: impl AsRef<Path>) -> Result<Database, sqlx::Error> {
    let filename = filename.as_ref();
    info!("初始化数据库连接: {}", filename.display());

    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .filename(filename)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    migrate(&pool).await?;

    Ok(pool)
}

/// 打开一个内存数据库，主要用于测试
pub async fn init_memory_db() -> Result<Database, sqlx::Error> {
    // 内存数据库只在单个连接内可见
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(SqliteConnectOptions::new().in_memory(true))
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &Database) -> Result<(), sqlx::Error> {
    info!("检查数据库迁移");
    sqlx::migrate!().run(pool).await?;
    Ok(())
}
