use crate::error::RepositoryError;
use crate::models::{TickerDetailsUpdate, TickerUpsert};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Rows per multi-row INSERT (7 binds each)
const UPSERT_CHUNK: usize = 1000;

/// Repository for the ticker directory
pub struct TickerRepository {
    pool: PgPool,
}

impl TickerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a bare row for `symbol` if none exists. Returns true when a row was created.
    pub async fn ensure_exists(&self, symbol: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO tickers (symbol, active)
            VALUES ($1, TRUE)
            ON CONFLICT (symbol) DO NOTHING
            "#,
        )
        .bind(symbol)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Create or update directory fields for a batch of tickers in one transaction
    pub async fn upsert_batch(&self, tickers: &[TickerUpsert]) -> Result<u64, RepositoryError> {
        if tickers.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for chunk in tickers.chunks(UPSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO tickers (symbol, name, market, exchange, ticker_type, currency, active) ",
            );
            builder.push_values(chunk, |mut row, ticker| {
                row.push_bind(&ticker.symbol)
                    .push_bind(&ticker.name)
                    .push_bind(&ticker.market)
                    .push_bind(&ticker.exchange)
                    .push_bind(&ticker.ticker_type)
                    .push_bind(&ticker.currency)
                    .push_bind(ticker.active);
            });
            builder.push(
                r#"
                ON CONFLICT (symbol) DO UPDATE SET
                    name = EXCLUDED.name,
                    market = EXCLUDED.market,
                    exchange = EXCLUDED.exchange,
                    ticker_type = EXCLUDED.ticker_type,
                    currency = EXCLUDED.currency,
                    active = EXCLUDED.active,
                    updated_at = NOW()
                "#,
            );

            affected += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        Ok(affected)
    }

    /// Symbols never enriched. Never-attempted symbols come first, then the least
    /// recently attempted, so a symbol the provider keeps missing cannot starve the rest.
    pub async fn symbols_missing_details(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<String>, RepositoryError> {
        let symbols = sqlx::query_scalar::<_, String>(
            r#"
            SELECT symbol
            FROM tickers
            WHERE details_updated_at IS NULL
            ORDER BY details_attempted_at NULLS FIRST, symbol
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(symbols)
    }

    /// Write fundamentals and stamp `details_updated_at` for a batch, in one transaction
    pub async fn apply_details_batch(
        &self,
        updates: &[TickerDetailsUpdate],
    ) -> Result<u64, RepositoryError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE tickers SET
                    name = COALESCE($2, name),
                    market_cap = $3,
                    shares_outstanding = $4,
                    weighted_shares_outstanding = $5,
                    total_employees = $6,
                    description = $7,
                    homepage_url = $8,
                    list_date = $9,
                    primary_exchange = $10,
                    cik = $11,
                    sic_code = $12,
                    sic_description = $13,
                    details_updated_at = NOW(),
                    details_attempted_at = NOW(),
                    updated_at = NOW()
                WHERE symbol = $1
                "#,
            )
            .bind(&update.symbol)
            .bind(&update.name)
            .bind(update.market_cap)
            .bind(update.shares_outstanding)
            .bind(update.weighted_shares_outstanding)
            .bind(update.total_employees)
            .bind(&update.description)
            .bind(&update.homepage_url)
            .bind(update.list_date)
            .bind(&update.primary_exchange)
            .bind(&update.cik)
            .bind(&update.sic_code)
            .bind(&update.sic_description)
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        tx.commit().await?;

        Ok(affected)
    }

    /// Stamp an enrichment attempt that produced no details
    pub async fn mark_details_attempted(&self, symbols: &[String]) -> Result<u64, RepositoryError> {
        if symbols.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE tickers SET details_attempted_at = NOW()
            WHERE symbol = ANY($1) AND details_updated_at IS NULL
            "#,
        )
        .bind(symbols)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
