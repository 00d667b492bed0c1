use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cash dividend. No uniqueness is enforced on stored rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Dividend {
    pub id: i64,
    pub symbol: String,
    pub cash_amount: f64,
    pub currency: Option<String>,
    pub declaration_date: Option<NaiveDate>,
    pub ex_dividend_date: NaiveDate,
    pub frequency: Option<i32>,
    pub pay_date: Option<NaiveDate>,
    pub record_date: Option<NaiveDate>,
    pub dividend_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDividend {
    pub symbol: String,
    pub cash_amount: f64,
    pub currency: Option<String>,
    pub declaration_date: Option<NaiveDate>,
    pub ex_dividend_date: NaiveDate,
    pub frequency: Option<i32>,
    pub pay_date: Option<NaiveDate>,
    pub record_date: Option<NaiveDate>,
    pub dividend_type: Option<String>,
}

/// Stock split, unique per (symbol, execution_date)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockSplit {
    pub id: i64,
    pub symbol: String,
    pub execution_date: NaiveDate,
    pub split_from: f64,
    pub split_to: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStockSplit {
    pub symbol: String,
    pub execution_date: NaiveDate,
    pub split_from: f64,
    pub split_to: f64,
}

impl NewStockSplit {
    pub fn key(&self) -> (String, NaiveDate) {
        (self.symbol.clone(), self.execution_date)
    }
}
