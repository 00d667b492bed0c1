//! Repository for dividends and stock splits

use crate::error::RepositoryError;
use crate::models::{NewDividend, NewStockSplit};
use sqlx::{PgPool, Postgres, QueryBuilder};

const INSERT_CHUNK: usize = 1000;

pub struct CorporateActionRepository {
    pool: PgPool,
}

impl CorporateActionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append dividends in one transaction. The table has no uniqueness constraint.
    pub async fn insert_dividends(&self, dividends: &[NewDividend]) -> Result<u64, RepositoryError> {
        if dividends.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in dividends.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"INSERT INTO dividends
                    (symbol, cash_amount, currency, declaration_date, ex_dividend_date,
                     frequency, pay_date, record_date, dividend_type) "#,
            );
            builder.push_values(chunk, |mut row, dividend| {
                row.push_bind(&dividend.symbol)
                    .push_bind(dividend.cash_amount)
                    .push_bind(&dividend.currency)
                    .push_bind(dividend.declaration_date)
                    .push_bind(dividend.ex_dividend_date)
                    .push_bind(dividend.frequency)
                    .push_bind(dividend.pay_date)
                    .push_bind(dividend.record_date)
                    .push_bind(&dividend.dividend_type);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        Ok(inserted)
    }

    /// Insert splits in one transaction, skipping (symbol, execution_date) pairs already stored
    pub async fn insert_splits(&self, splits: &[NewStockSplit]) -> Result<u64, RepositoryError> {
        if splits.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in splits.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO stock_splits (symbol, execution_date, split_from, split_to) ",
            );
            builder.push_values(chunk, |mut row, split| {
                row.push_bind(&split.symbol)
                    .push_bind(split.execution_date)
                    .push_bind(split.split_from)
                    .push_bind(split.split_to);
            });
            builder.push(" ON CONFLICT (symbol, execution_date) DO NOTHING");

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        Ok(inserted)
    }
}
