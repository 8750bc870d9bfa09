//! Row types of the canonical stores and their Arrow layouts.
//!
//! Every record type owns its schema and the two conversions to and from a
//! [`RecordBatch`]; the jobs only ever move whole batches through parquet.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use chrono::NaiveDate;
use options_ingestor::io::columnar::{
    date_at, naive_to_date32, opt_f64, opt_i64, string_at, typed_column,
};

use crate::canonical::OptionType;
use crate::error::{StoreError, StoreResult};

/// One canonicalized option row of the consolidated store.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalOptionRecord {
    /// Trading date of the snapshot.
    pub date: NaiveDate,
    /// Underlying with any marker removed; also the store partition key.
    pub underlying_symbol: String,
    /// Raw contract code.
    pub option_code: String,
    /// Ticker the contract is filed under.
    pub option_symbol: String,
    /// Expiration date.
    pub expiration_date: NaiveDate,
    /// Call or put.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: f64,
    /// Open interest.
    pub open_interest: i64,
    /// Session volume.
    pub volume: i64,
    /// Delta.
    pub delta: Option<f64>,
    /// Gamma.
    pub gamma: Option<f64>,
    /// Vega.
    pub vega: Option<f64>,
    /// Theta.
    pub theta: Option<f64>,
    /// Rho.
    pub rho: Option<f64>,
    /// Theoretical value.
    pub theo: Option<f64>,
    /// Implied volatility.
    pub iv: Option<f64>,
    /// Best bid.
    pub bid: Option<f64>,
    /// Best ask.
    pub ask: Option<f64>,
    /// Session open.
    pub open: Option<f64>,
    /// Session high.
    pub high: Option<f64>,
}

const GREEK_COLUMNS: [&str; 11] = [
    "delta", "gamma", "vega", "theta", "rho", "theo", "iv", "bid", "ask", "open", "high",
];

/// Schema of the consolidated option store.
pub fn canonical_schema() -> SchemaRef {
    let mut fields = vec![
        Field::new("date", DataType::Date32, false),
        Field::new("underlying_symbol", DataType::Utf8, false),
        Field::new("option_code", DataType::Utf8, false),
        Field::new("option_symbol", DataType::Utf8, false),
        Field::new("expiration_date", DataType::Date32, false),
        Field::new("option_type", DataType::Utf8, false),
        Field::new("strike", DataType::Float64, false),
        Field::new("open_interest", DataType::Int64, false),
        Field::new("volume", DataType::Int64, false),
    ];
    fields.extend(
        GREEK_COLUMNS
            .iter()
            .map(|n| Field::new(*n, DataType::Float64, true)),
    );
    Arc::new(Schema::new(fields))
}

fn dates(values: impl Iterator<Item = NaiveDate>) -> ArrayRef {
    Arc::new(Date32Array::from_iter_values(values.map(naive_to_date32)))
}

fn option_type_at(array: &StringArray, i: usize) -> StoreResult<OptionType> {
    let raw = string_at(array, "option_type", i)?;
    OptionType::from_code(&raw).ok_or_else(|| {
        StoreError::Ingest(options_ingestor::Error::InvalidValue {
            column: "option_type".into(),
            row: i,
            message: format!("`{raw}` is neither C nor P"),
        })
    })
}

/// Builds a batch in [`canonical_schema`] layout.
pub fn canonical_to_batch(rows: &[CanonicalOptionRecord]) -> StoreResult<RecordBatch> {
    let f = |get: fn(&CanonicalOptionRecord) -> Option<f64>| -> ArrayRef {
        Arc::new(rows.iter().map(get).collect::<Float64Array>())
    };

    let arrays: Vec<ArrayRef> = vec![
        dates(rows.iter().map(|r| r.date)),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.underlying_symbol.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.option_code.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.option_symbol.as_str()))),
        dates(rows.iter().map(|r| r.expiration_date)),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.option_type.as_str()))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.strike))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.open_interest))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.volume))),
        f(|r| r.delta),
        f(|r| r.gamma),
        f(|r| r.vega),
        f(|r| r.theta),
        f(|r| r.rho),
        f(|r| r.theo),
        f(|r| r.iv),
        f(|r| r.bid),
        f(|r| r.ask),
        f(|r| r.open),
        f(|r| r.high),
    ];

    Ok(RecordBatch::try_new(canonical_schema(), arrays)?)
}

/// Reads canonical rows back from a batch.
pub fn batch_to_canonical(batch: &RecordBatch) -> StoreResult<Vec<CanonicalOptionRecord>> {
    let date = typed_column::<Date32Array>(batch, "date")?;
    let underlying = typed_column::<StringArray>(batch, "underlying_symbol")?;
    let code = typed_column::<StringArray>(batch, "option_code")?;
    let symbol = typed_column::<StringArray>(batch, "option_symbol")?;
    let expiration = typed_column::<Date32Array>(batch, "expiration_date")?;
    let option_type = typed_column::<StringArray>(batch, "option_type")?;
    let strike = typed_column::<Float64Array>(batch, "strike")?;
    let oi = typed_column::<Int64Array>(batch, "open_interest")?;
    let volume = typed_column::<Int64Array>(batch, "volume")?;
    let g = GREEK_COLUMNS
        .iter()
        .map(|n| typed_column::<Float64Array>(batch, n))
        .collect::<Result<Vec<_>, _>>()?;

    (0..batch.num_rows())
        .map(|i| {
            Ok(CanonicalOptionRecord {
                date: date_at(date, "date", i)?,
                underlying_symbol: string_at(underlying, "underlying_symbol", i)?,
                option_code: string_at(code, "option_code", i)?,
                option_symbol: string_at(symbol, "option_symbol", i)?,
                expiration_date: date_at(expiration, "expiration_date", i)?,
                option_type: option_type_at(option_type, i)?,
                strike: opt_f64(strike, i).unwrap_or_default(),
                open_interest: opt_i64(oi, i).unwrap_or(0),
                volume: opt_i64(volume, i).unwrap_or(0),
                delta: opt_f64(g[0], i),
                gamma: opt_f64(g[1], i),
                vega: opt_f64(g[2], i),
                theta: opt_f64(g[3], i),
                rho: opt_f64(g[4], i),
                theo: opt_f64(g[5], i),
                iv: opt_f64(g[6], i),
                bid: opt_f64(g[7], i),
                ask: opt_f64(g[8], i),
                open: opt_f64(g[9], i),
                high: opt_f64(g[10], i),
            })
        })
        .collect()
}

/// Daily OHLC of one underlying.
///
/// Equality and hashing compare every field, floats bit for bit, so the
/// record can serve as a set key for the dedup merge.
#[derive(Debug, Clone)]
pub struct OhlcRecord {
    /// Trading date.
    pub date: NaiveDate,
    /// Underlying with any marker removed.
    pub symbol: String,
    /// Session open.
    pub open: Option<f64>,
    /// Session high.
    pub high: Option<f64>,
    /// Session low.
    pub low: Option<f64>,
    /// Session close.
    pub close: Option<f64>,
    /// Previous session close.
    pub prev_close: Option<f64>,
    /// Session volume.
    pub volume: Option<f64>,
}

impl OhlcRecord {
    fn prices(&self) -> [Option<u64>; 6] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.prev_close,
            self.volume,
        ]
        .map(|v| v.map(f64::to_bits))
    }
}

impl PartialEq for OhlcRecord {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.symbol == other.symbol && self.prices() == other.prices()
    }
}

impl Eq for OhlcRecord {}

impl Hash for OhlcRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.date.hash(state);
        self.symbol.hash(state);
        self.prices().hash(state);
    }
}

const OHLC_PRICES: [&str; 6] = ["open", "high", "low", "close", "prev_close", "volume"];

/// Schema of the canonical OHLC store.
pub fn ohlc_schema() -> SchemaRef {
    let mut fields = vec![
        Field::new("date", DataType::Date32, false),
        Field::new("symbol", DataType::Utf8, false),
    ];
    fields.extend(
        OHLC_PRICES
            .iter()
            .map(|n| Field::new(*n, DataType::Float64, true)),
    );
    Arc::new(Schema::new(fields))
}

/// Builds a batch in [`ohlc_schema`] layout.
pub fn ohlc_to_batch(rows: &[OhlcRecord]) -> StoreResult<RecordBatch> {
    let f = |get: fn(&OhlcRecord) -> Option<f64>| -> ArrayRef {
        Arc::new(rows.iter().map(get).collect::<Float64Array>())
    };
    let arrays: Vec<ArrayRef> = vec![
        dates(rows.iter().map(|r| r.date)),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.symbol.as_str()))),
        f(|r| r.open),
        f(|r| r.high),
        f(|r| r.low),
        f(|r| r.close),
        f(|r| r.prev_close),
        f(|r| r.volume),
    ];
    Ok(RecordBatch::try_new(ohlc_schema(), arrays)?)
}

/// Reads OHLC rows back from a batch.
pub fn batch_to_ohlc(batch: &RecordBatch) -> StoreResult<Vec<OhlcRecord>> {
    let date = typed_column::<Date32Array>(batch, "date")?;
    let symbol = typed_column::<StringArray>(batch, "symbol")?;
    let p = OHLC_PRICES
        .iter()
        .map(|n| typed_column::<Float64Array>(batch, n))
        .collect::<Result<Vec<_>, _>>()?;

    (0..batch.num_rows())
        .map(|i| {
            Ok(OhlcRecord {
                date: date_at(date, "date", i)?,
                symbol: string_at(symbol, "symbol", i)?,
                open: opt_f64(p[0], i),
                high: opt_f64(p[1], i),
                low: opt_f64(p[2], i),
                close: opt_f64(p[3], i),
                prev_close: opt_f64(p[4], i),
                volume: opt_f64(p[5], i),
            })
        })
        .collect()
}

/// One scored day-over-day open interest change.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRecord {
    /// Trading date.
    pub date: NaiveDate,
    /// Raw contract code.
    pub option_code: String,
    /// Ticker the contract is filed under.
    pub option_symbol: String,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Days to expiration from `date`.
    pub dte: i64,
    /// Call or put.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: f64,
    /// Open interest on `date`.
    pub open_interest: i64,
    /// Volume on `date`.
    pub volume: i64,
    /// Open interest on the previous observed date.
    pub prev_open_interest: i64,
    /// `open_interest - prev_open_interest`.
    pub oi_change: i64,
    /// `open_interest / prev_open_interest`.
    pub oi_ratio: f64,
    /// `round(oi_change * ln(open_interest + 1))`.
    pub anomaly_score: f64,
}

/// Schema of the anomaly output.
pub fn anomaly_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("option_code", DataType::Utf8, false),
        Field::new("option_symbol", DataType::Utf8, false),
        Field::new("expiration", DataType::Date32, false),
        Field::new("dte", DataType::Int64, false),
        Field::new("option_type", DataType::Utf8, false),
        Field::new("strike", DataType::Float64, false),
        Field::new("open_interest", DataType::Int64, false),
        Field::new("volume", DataType::Int64, false),
        Field::new("prev_open_interest", DataType::Int64, false),
        Field::new("oi_change", DataType::Int64, false),
        Field::new("oi_ratio", DataType::Float64, false),
        Field::new("anomaly_score", DataType::Float64, false),
    ]))
}

/// Builds a batch in [`anomaly_schema`] layout.
pub fn anomalies_to_batch(rows: &[AnomalyRecord]) -> StoreResult<RecordBatch> {
    let arrays: Vec<ArrayRef> = vec![
        dates(rows.iter().map(|r| r.date)),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.option_code.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.option_symbol.as_str()))),
        dates(rows.iter().map(|r| r.expiration)),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.dte))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.option_type.as_str()))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.strike))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.open_interest))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.volume))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.prev_open_interest))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.oi_change))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.oi_ratio))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.anomaly_score))),
    ];
    Ok(RecordBatch::try_new(anomaly_schema(), arrays)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn bar(close: f64) -> OhlcRecord {
        OhlcRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            symbol: "SPX".into(),
            open: Some(5000.0),
            high: Some(5100.0),
            low: Some(4990.0),
            close: Some(close),
            prev_close: Some(4995.0),
            volume: None,
        }
    }

    #[test]
    fn ohlc_identity_is_the_full_tuple() {
        let set: HashSet<OhlcRecord> = [bar(5050.0), bar(5050.0), bar(5051.0)].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_ne!(bar(5050.0), OhlcRecord { volume: Some(0.0), ..bar(5050.0) });
    }

    #[test]
    fn canonical_batch_rejects_unknown_option_type() {
        let row = CanonicalOptionRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            underlying_symbol: "AAPL".into(),
            option_code: "AAPL240621C00150000".into(),
            option_symbol: "AAPL".into(),
            expiration_date: NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
            option_type: OptionType::Call,
            strike: 150.0,
            open_interest: 10,
            volume: 1,
            delta: None,
            gamma: None,
            vega: None,
            theta: None,
            rho: None,
            theo: None,
            iv: None,
            bid: None,
            ask: None,
            open: None,
            high: None,
        };
        let batch = canonical_to_batch(std::slice::from_ref(&row)).unwrap();
        assert_eq!(batch_to_canonical(&batch).unwrap(), vec![row]);

        let mut columns = batch.columns().to_vec();
        columns[5] = Arc::new(StringArray::from(vec!["X"]));
        let batch = RecordBatch::try_new(canonical_schema(), columns).unwrap();
        let err = batch_to_canonical(&batch).unwrap_err();
        assert!(err.to_string().contains("neither C nor P"));
    }
}
