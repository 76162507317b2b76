//! Embedded PostgreSQL schema
//!
//! DDL lives next to the code that queries it; [`ensure_schema`] is run
//! once at startup and every statement is idempotent.

use sqlx::PgPool;

pub const USERS_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS users_tb (
        user_id     BIGSERIAL PRIMARY KEY,
        handle      TEXT NOT NULL UNIQUE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const BALANCES_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS balances_tb (
        user_id     BIGINT NOT NULL,
        context     TEXT NOT NULL,
        available   BIGINT NOT NULL DEFAULT 0 CHECK (available >= 0),
        locked      BIGINT NOT NULL DEFAULT 0 CHECK (locked >= 0),
        PRIMARY KEY (user_id, context)
    )
"#;

pub const ADS_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS ads_tb (
        id               UUID PRIMARY KEY,
        owner_id         BIGINT NOT NULL,
        direction        TEXT NOT NULL,
        country          TEXT NOT NULL,
        total_amount     BIGINT NOT NULL CHECK (total_amount >= 0),
        remaining_amount BIGINT NOT NULL CHECK (remaining_amount >= 0),
        min_amount       BIGINT NOT NULL,
        max_amount       BIGINT NOT NULL,
        unit_price       NUMERIC(18, 2) NOT NULL,
        methods          TEXT NOT NULL,
        terms            TEXT,
        created_at       TIMESTAMPTZ NOT NULL,
        expires_at       TIMESTAMPTZ NOT NULL,
        status           TEXT NOT NULL,
        CHECK (remaining_amount <= total_amount)
    )
"#;

pub const ADS_LISTING_IDX: &str = r#"
    CREATE INDEX IF NOT EXISTS ads_listing_idx
    ON ads_tb (direction, status, expires_at, created_at DESC)
"#;

pub const TRADES_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS trades_tb (
        id          TEXT PRIMARY KEY,
        ad_id       UUID NOT NULL,
        buyer_id    BIGINT NOT NULL,
        seller_id   BIGINT NOT NULL,
        amount      BIGINT NOT NULL CHECK (amount > 0),
        total_price NUMERIC(18, 2) NOT NULL,
        method      TEXT,
        status      TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL
    )
"#;

pub const TRADES_PARTY_IDX: &str = r#"
    CREATE INDEX IF NOT EXISTS trades_party_idx ON trades_tb (buyer_id, seller_id)
"#;

pub const MINING_COOLDOWNS_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS mining_cooldowns_tb (
        user_id          BIGINT PRIMARY KEY,
        last_claim_at    TIMESTAMPTZ NOT NULL,
        next_eligible_at TIMESTAMPTZ NOT NULL
    )
"#;

pub const REWARD_CONFIG_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS reward_config_tb (
        id            SMALLINT PRIMARY KEY CHECK (id = 1),
        reward_amount BIGINT NOT NULL CHECK (reward_amount > 0)
    )
"#;

pub const RATINGS_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS ratings_tb (
        id            BIGSERIAL PRIMARY KEY,
        rated_user_id BIGINT NOT NULL,
        rating        DOUBLE PRECISION NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const COUNTRY_RATES_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS country_rates_tb (
        id          BIGSERIAL PRIMARY KEY,
        country     TEXT NOT NULL,
        currency    TEXT NOT NULL,
        price       NUMERIC(18, 2) NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL
    )
"#;

pub const SUPPLY_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS supply_tb (
        id        SMALLINT PRIMARY KEY CHECK (id = 1),
        remaining BIGINT NOT NULL CHECK (remaining >= 0)
    )
"#;

pub const TRANSFERS_TB: &str = r#"
    CREATE TABLE IF NOT EXISTS transfers_tb (
        id           TEXT PRIMARY KEY,
        token        TEXT UNIQUE,
        sender_id    BIGINT NOT NULL,
        recipient_id BIGINT NOT NULL,
        amount       BIGINT NOT NULL CHECK (amount > 0),
        created_at   TIMESTAMPTZ NOT NULL
    )
"#;

/// Create all tables and indexes if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for ddl in [
        USERS_TB,
        BALANCES_TB,
        ADS_TB,
        ADS_LISTING_IDX,
        TRADES_TB,
        TRADES_PARTY_IDX,
        MINING_COOLDOWNS_TB,
        REWARD_CONFIG_TB,
        RATINGS_TB,
        COUNTRY_RATES_TB,
        SUPPLY_TB,
        TRANSFERS_TB,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::info!("ledger schema ensured");
    Ok(())
}
