use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{
    PgConnection, PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    CashAccount, Client, Config, Error, LedgerEntry, MonthWindow, Order, OrderPlan,
    StockMovement, StoreAdapter, Strain,
};

/// PostgreSQL adapter.
///
/// Range reads hit two tables:
/// ```sql
/// CREATE TABLE ledger_entries (
///     id UUID PRIMARY KEY,
///     kind TEXT NOT NULL,
///     amount NUMERIC NOT NULL,
///     occurred_at TIMESTAMPTZ NOT NULL,
///     note TEXT,
///     account_id UUID NOT NULL REFERENCES cash_accounts(id)
/// );
///
/// CREATE TABLE orders (
///     id UUID PRIMARY KEY,
///     placed_at TIMESTAMPTZ NOT NULL,
///     client_id UUID REFERENCES clients(id),
///     total_amount NUMERIC NOT NULL,
///     billed_grams NUMERIC,
///     actual_grams NUMERIC,
///     ...
/// );
/// ```
/// `init_schema` creates these along with `cash_accounts`, `clients`,
/// `strains` and `stock_movements`.
///
/// Rows that fail to decode on range reads are logged and skipped. Multi-row
/// writes run in one transaction and lock the rows they change.
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
}

fn storage(err: sqlx::Error) -> Error {
    Error::Storage(err.to_string())
}

fn decode(err: sqlx::Error) -> Error {
    Error::Decode(err.to_string())
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| Error::Config("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(storage)?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<(), Error> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cash_accounts (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                balance NUMERIC NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id UUID PRIMARY KEY,
                kind TEXT NOT NULL,
                amount NUMERIC NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                note TEXT,
                account_id UUID NOT NULL REFERENCES cash_accounts(id)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_ledger_entries_occurred_at
            ON ledger_entries(occurred_at)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                id UUID PRIMARY KEY,
                full_name TEXT NOT NULL,
                purchase_count INTEGER NOT NULL DEFAULT 0,
                total_grams NUMERIC NOT NULL DEFAULT 0,
                total_spent NUMERIC NOT NULL DEFAULT 0,
                last_purchase TIMESTAMPTZ,
                last_trial TIMESTAMPTZ
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS strains (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                grams_in_stock NUMERIC NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                number TEXT NOT NULL,
                placed_at TIMESTAMPTZ NOT NULL,
                client_id UUID REFERENCES clients(id),
                strain_id UUID REFERENCES strains(id),
                total_amount NUMERIC NOT NULL,
                billed_grams NUMERIC,
                actual_grams NUMERIC,
                price_per_gram NUMERIC,
                payment_method TEXT NOT NULL,
                account_id UUID REFERENCES cash_accounts(id)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_orders_placed_at
            ON orders(placed_at)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_movements (
                id UUID PRIMARY KEY,
                strain_id UUID NOT NULL REFERENCES strains(id),
                kind TEXT NOT NULL CHECK (kind IN ('inflow', 'outflow')),
                grams NUMERIC NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                note TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        Ok(())
    }
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, Error> {
    let kind: String = row.try_get("kind").map_err(decode)?;

    Ok(LedgerEntry {
        id: row.try_get("id").map_err(decode)?,
        kind: kind.parse()?,
        amount: row.try_get("amount").map_err(decode)?,
        timestamp: row.try_get("occurred_at").map_err(decode)?,
        note: row.try_get("note").map_err(decode)?,
        account_id: row.try_get("account_id").map_err(decode)?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, Error> {
    Ok(Order {
        id: row.try_get("id").map_err(decode)?,
        number: row.try_get("number").map_err(decode)?,
        timestamp: row.try_get("placed_at").map_err(decode)?,
        client_id: row.try_get("client_id").map_err(decode)?,
        strain_id: row.try_get("strain_id").map_err(decode)?,
        total_amount: row.try_get("total_amount").map_err(decode)?,
        billed_grams: row.try_get("billed_grams").map_err(decode)?,
        actual_grams: row.try_get("actual_grams").map_err(decode)?,
        price_per_gram: row.try_get("price_per_gram").map_err(decode)?,
        payment_method: row.try_get("payment_method").map_err(decode)?,
        account_id: row.try_get("account_id").map_err(decode)?,
    })
}

fn client_from_row(row: &PgRow) -> Result<Client, Error> {
    Ok(Client {
        id: row.try_get("id").map_err(decode)?,
        full_name: row.try_get("full_name").map_err(decode)?,
        purchase_count: row.try_get::<i32, _>("purchase_count").map_err(decode)?.max(0) as u32,
        total_grams: row.try_get("total_grams").map_err(decode)?,
        total_spent: row.try_get("total_spent").map_err(decode)?,
        last_purchase: row.try_get("last_purchase").map_err(decode)?,
        last_trial: row.try_get("last_trial").map_err(decode)?,
    })
}

fn account_from_row(row: &PgRow) -> Result<CashAccount, Error> {
    Ok(CashAccount {
        id: row.try_get("id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        balance: row.try_get("balance").map_err(decode)?,
    })
}

fn strain_from_row(row: &PgRow) -> Result<Strain, Error> {
    Ok(Strain {
        id: row.try_get("id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        grams_in_stock: row.try_get("grams_in_stock").map_err(decode)?,
    })
}

fn decode_valid<T>(rows: Vec<PgRow>, table: &'static str, f: fn(&PgRow) -> Result<T, Error>) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match f(row) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(table, error = %err, "skipping undecodable row");
                None
            }
        })
        .collect()
}

async fn insert_entry_on(conn: &mut PgConnection, entry: &LedgerEntry) -> Result<(), Error> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (id, kind, amount, occurred_at, note, account_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.id)
    .bind(entry.kind.as_str())
    .bind(entry.amount)
    .bind(entry.timestamp)
    .bind(&entry.note)
    .bind(entry.account_id)
    .execute(&mut *conn)
    .await
    .map_err(storage)?;

    Ok(())
}

async fn insert_order_on(conn: &mut PgConnection, order: &Order) -> Result<(), Error> {
    sqlx::query(&format!(
        "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(&order.number)
    .bind(order.timestamp)
    .bind(order.client_id)
    .bind(order.strain_id)
    .bind(order.total_amount)
    .bind(order.billed_grams)
    .bind(order.actual_grams)
    .bind(order.price_per_gram)
    .bind(&order.payment_method)
    .bind(order.account_id)
    .execute(&mut *conn)
    .await
    .map_err(storage)?;

    Ok(())
}

async fn insert_movement_on(conn: &mut PgConnection, movement: &StockMovement) -> Result<(), Error> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, strain_id, kind, grams, occurred_at, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(movement.id)
    .bind(movement.strain_id)
    .bind(movement.kind.as_str())
    .bind(movement.grams)
    .bind(movement.at)
    .bind(&movement.note)
    .execute(&mut *conn)
    .await
    .map_err(storage)?;

    Ok(())
}

/// Move an account's balance by `delta` under a row lock.
async fn credit_account_on(
    conn: &mut PgConnection,
    id: Uuid,
    delta: Decimal,
) -> Result<CashAccount, Error> {
    let row = sqlx::query("SELECT id, name, balance FROM cash_accounts WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?
        .ok_or_else(|| Error::NotFound(format!("account {}", id)))?;

    let mut account = account_from_row(&row)?;
    account.balance = account
        .balance
        .checked_add(delta)
        .ok_or(Error::InvalidAmount)?;

    sqlx::query("UPDATE cash_accounts SET balance = $2 WHERE id = $1")
        .bind(id)
        .bind(account.balance)
        .execute(&mut *conn)
        .await
        .map_err(storage)?;

    Ok(account)
}

/// Apply `movement` to its strain's stock under a row lock.
async fn move_stock_on(conn: &mut PgConnection, movement: &StockMovement) -> Result<Strain, Error> {
    let row = sqlx::query("SELECT id, name, grams_in_stock FROM strains WHERE id = $1 FOR UPDATE")
        .bind(movement.strain_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?
        .ok_or_else(|| Error::NotFound(format!("strain {}", movement.strain_id)))?;

    let mut strain = strain_from_row(&row)?;
    strain.grams_in_stock = strain.stock_after(movement)?;

    sqlx::query("UPDATE strains SET grams_in_stock = $2 WHERE id = $1")
        .bind(strain.id)
        .bind(strain.grams_in_stock)
        .execute(&mut *conn)
        .await
        .map_err(storage)?;

    Ok(strain)
}

const ENTRY_COLUMNS: &str = "id, kind, amount, occurred_at, note, account_id";
const ORDER_COLUMNS: &str = "id, number, placed_at, client_id, strain_id, total_amount, \
    billed_grams, actual_grams, price_per_gram, payment_method, account_id";

#[async_trait]
impl StoreAdapter for PostgresAdapter {
    async fn entries_in(&self, window: &MonthWindow) -> Result<Vec<LedgerEntry>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ledger_entries WHERE occurred_at >= $1 AND occurred_at <= $2",
            ENTRY_COLUMNS
        ))
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(decode_valid(rows, "ledger_entries", entry_from_row))
    }

    async fn orders_in(&self, window: &MonthWindow) -> Result<Vec<Order>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE placed_at >= $1 AND placed_at <= $2",
            ORDER_COLUMNS
        ))
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(decode_valid(rows, "orders", order_from_row))
    }

    async fn recent_entries(&self, limit: u32) -> Result<Vec<LedgerEntry>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ledger_entries ORDER BY occurred_at DESC LIMIT $1",
            ENTRY_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(decode_valid(rows, "ledger_entries", entry_from_row))
    }

    async fn recent_orders(&self, limit: u32) -> Result<Vec<Order>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders ORDER BY placed_at DESC LIMIT $1",
            ORDER_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(decode_valid(rows, "orders", order_from_row))
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, Error> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, purchase_count, total_grams, total_spent, last_purchase, last_trial
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(client_from_row).transpose()
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<CashAccount>, Error> {
        let row = sqlx::query("SELECT id, name, balance FROM cash_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<CashAccount>, Error> {
        // Byte order, matching the memory adapter.
        let rows = sqlx::query(
            r#"SELECT id, name, balance FROM cash_accounts ORDER BY name COLLATE "C""#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(account_from_row).collect()
    }

    async fn get_strain(&self, id: Uuid) -> Result<Option<Strain>, Error> {
        let row = sqlx::query("SELECT id, name, grams_in_stock FROM strains WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(strain_from_row).transpose()
    }

    async fn insert_entry(&self, entry: LedgerEntry) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        insert_entry_on(&mut conn, &entry).await
    }

    async fn insert_order(&self, order: Order) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        insert_order_on(&mut conn, &order).await
    }

    async fn create_client(&self, client: Client) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, full_name, purchase_count, total_grams, total_spent, last_purchase, last_trial)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(client.id)
        .bind(client.full_name)
        .bind(client.purchase_count as i32)
        .bind(client.total_grams)
        .bind(client.total_spent)
        .bind(client.last_purchase)
        .bind(client.last_trial)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn create_account(&self, account: CashAccount) -> Result<(), Error> {
        sqlx::query("INSERT INTO cash_accounts (id, name, balance) VALUES ($1, $2, $3)")
            .bind(account.id)
            .bind(account.name)
            .bind(account.balance)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    async fn create_strain(&self, strain: Strain) -> Result<(), Error> {
        sqlx::query("INSERT INTO strains (id, name, grams_in_stock) VALUES ($1, $2, $3)")
            .bind(strain.id)
            .bind(strain.name)
            .bind(strain.grams_in_stock)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    async fn record_movement(
        &self,
        entry: LedgerEntry,
        delta: Decimal,
    ) -> Result<CashAccount, Error> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let account = credit_account_on(&mut tx, entry.account_id, delta).await?;
        insert_entry_on(&mut tx, &entry).await?;

        tx.commit().await.map_err(storage)?;
        Ok(account)
    }

    async fn record_order(&self, plan: OrderPlan) -> Result<(), Error> {
        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await.map_err(storage)?;

        move_stock_on(&mut tx, &plan.movement).await?;

        let row = sqlx::query(
            r#"
            SELECT id, full_name, purchase_count, total_grams, total_spent, last_purchase, last_trial
            FROM clients
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(plan.client_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?
        .ok_or_else(|| Error::NotFound(format!("client {}", plan.client_id)))?;

        let mut client = client_from_row(&row)?;
        plan.client_update.apply(&mut client)?;

        sqlx::query(
            r#"
            UPDATE clients
            SET purchase_count = $2, total_grams = $3, total_spent = $4,
                last_purchase = $5, last_trial = $6
            WHERE id = $1
            "#,
        )
        .bind(client.id)
        .bind(client.purchase_count as i32)
        .bind(client.total_grams)
        .bind(client.total_spent)
        .bind(client.last_purchase)
        .bind(client.last_trial)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        if let Some(entry) = &plan.income {
            credit_account_on(&mut tx, entry.account_id, entry.amount).await?;
        }

        insert_order_on(&mut tx, &plan.order).await?;
        if let Some(entry) = &plan.income {
            insert_entry_on(&mut tx, entry).await?;
        }
        insert_movement_on(&mut tx, &plan.movement).await?;

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn record_stock_movement(&self, movement: StockMovement) -> Result<Strain, Error> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let strain = move_stock_on(&mut tx, &movement).await?;
        insert_movement_on(&mut tx, &movement).await?;

        tx.commit().await.map_err(storage)?;
        Ok(strain)
    }
}
