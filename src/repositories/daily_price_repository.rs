use crate::error::RepositoryError;
use crate::models::NewDailyPrice;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Rows per multi-row INSERT (9 binds each)
const INSERT_CHUNK: usize = 1000;

/// Repository for daily OHLCV rows
pub struct DailyPriceRepository {
    pool: PgPool,
}

impl DailyPriceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Distinct trade dates already stored within `[from, to]`
    pub async fn existing_dates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, RepositoryError> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT DISTINCT trade_date
            FROM daily_prices
            WHERE trade_date >= $1 AND trade_date <= $2
            ORDER BY trade_date
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(dates)
    }

    /// Upsert a batch of bars in a single transaction.
    ///
    /// A (symbol, trade_date) pair must appear at most once per batch.
    pub async fn upsert_batch(&self, prices: &[NewDailyPrice]) -> Result<u64, RepositoryError> {
        if prices.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for chunk in prices.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO daily_prices (symbol, trade_date, open, high, low, close, volume, vwap, transactions) ",
            );
            builder.push_values(chunk, |mut row, price| {
                row.push_bind(&price.symbol)
                    .push_bind(price.trade_date)
                    .push_bind(price.open)
                    .push_bind(price.high)
                    .push_bind(price.low)
                    .push_bind(price.close)
                    .push_bind(price.volume)
                    .push_bind(price.vwap)
                    .push_bind(price.transactions);
            });
            builder.push(
                r#"
                ON CONFLICT (symbol, trade_date) DO UPDATE SET
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume,
                    vwap = EXCLUDED.vwap,
                    transactions = EXCLUDED.transactions
                "#,
            );

            affected += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        Ok(affected)
    }
}
