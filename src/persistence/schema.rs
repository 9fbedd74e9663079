//! PostgreSQL journal schema bootstrap.

use anyhow::Result;
use sqlx::PgPool;

/// Initialize the journal schema. Idempotent; safe to run on every start.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing PostgreSQL journal schema...");

    for (name, ddl) in [
        ("wallets_tb", CREATE_WALLETS_TABLE),
        ("transactions_tb", CREATE_TRANSACTIONS_TABLE),
        ("ledger_entries_tb", CREATE_LEDGER_ENTRIES_TABLE),
        ("transactions_tb_wallet_idx", CREATE_TXN_WALLET_INDEX),
        ("transactions_tb_ext_ref_idx", CREATE_TXN_EXT_REF_INDEX),
        ("ledger_entries_tb_txn_idx", CREATE_ENTRY_TXN_INDEX),
        ("wallets_tb_owner_idx", CREATE_WALLET_OWNER_INDEX),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", name, e))?;
    }

    tracing::info!("PostgreSQL journal schema initialized");
    Ok(())
}

const CREATE_WALLETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS wallets_tb (
    wallet_id   BIGINT PRIMARY KEY,
    owner_id    BIGINT NOT NULL,
    public_tag  TEXT NOT NULL,
    currency    TEXT NOT NULL,
    balance     BIGINT NOT NULL,
    status      SMALLINT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions_tb (
    txn_id            UUID PRIMARY KEY,
    wallet_id         BIGINT NOT NULL,
    txn_type          SMALLINT NOT NULL,
    status            SMALLINT NOT NULL,
    amount            BIGINT NOT NULL,
    external_provider TEXT,
    external_ref      TEXT,
    idempotency_key   TEXT,
    reversal_of       UUID,
    memo              TEXT,
    created_at        TIMESTAMPTZ NOT NULL,
    updated_at        TIMESTAMPTZ NOT NULL
)
"#;

// Append-only: entry rows are only ever inserted, never updated or deleted.
const CREATE_LEDGER_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries_tb (
    entry_id      BIGINT PRIMARY KEY,
    txn_id        UUID NOT NULL,
    wallet_id     BIGINT,
    account       TEXT NOT NULL,
    side          SMALLINT NOT NULL,
    amount        BIGINT NOT NULL,
    balance_after BIGINT,
    created_at    TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_TXN_WALLET_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS transactions_tb_wallet_idx
    ON transactions_tb (wallet_id, created_at DESC)
"#;

const CREATE_TXN_EXT_REF_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS transactions_tb_ext_ref_idx
    ON transactions_tb (external_ref) WHERE external_ref IS NOT NULL
"#;

const CREATE_ENTRY_TXN_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS ledger_entries_tb_txn_idx
    ON ledger_entries_tb (txn_id)
"#;

const CREATE_WALLET_OWNER_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS wallets_tb_owner_idx
    ON wallets_tb (owner_id)
"#;
