//! Arrow schemas of the raw fetch outputs and conversions to and from the
//! in-memory models.
//!
//! The store crate reads the same files, so the column helpers here
//! ([`typed_column`], [`opt_f64`], the date conversions) are public.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::Error;
use crate::models::quote::{OptionQuote, StockSnapshot};

/// Timezone stamped on every timestamp column.
pub const UTC: &str = "UTC";

pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into()))
}

const QUOTE_FLOATS: [&str; 11] = [
    "delta", "gamma", "vega", "theta", "rho", "theo", "open", "high", "iv", "bid", "ask",
];

/// Schema of `options_data.parquet` and the raw `w2` partitions.
pub fn option_quote_schema() -> SchemaRef {
    let mut fields = vec![
        Field::new("timestamp", timestamp_type(), false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("option", DataType::Utf8, false),
        Field::new("open_interest", DataType::Int64, false),
        Field::new("volume", DataType::Int64, false),
    ];
    fields.extend(
        QUOTE_FLOATS
            .iter()
            .map(|n| Field::new(*n, DataType::Float64, true)),
    );
    Arc::new(Schema::new(fields))
}

const STOCK_FLOATS: [&str; 10] = [
    "current_price",
    "open",
    "high",
    "low",
    "close",
    "prev_day_close",
    "volume",
    "price_change",
    "price_change_percent",
    "iv30",
];

/// Schema of `stock_data.parquet` and the raw `ohlc` partitions.
pub fn stock_snapshot_schema() -> SchemaRef {
    let mut fields = vec![
        Field::new("timestamp", timestamp_type(), false),
        Field::new("symbol", DataType::Utf8, false),
    ];
    fields.extend(
        STOCK_FLOATS
            .iter()
            .map(|n| Field::new(*n, DataType::Float64, true)),
    );
    Arc::new(Schema::new(fields))
}

fn timestamps(values: impl IntoIterator<Item = DateTime<Utc>>) -> ArrayRef {
    let micros: Vec<i64> = values.into_iter().map(|t| t.timestamp_micros()).collect();
    Arc::new(TimestampMicrosecondArray::from(micros).with_timezone(UTC))
}

pub fn quotes_to_batch(quotes: &[OptionQuote]) -> Result<RecordBatch, Error> {
    let f = |get: fn(&OptionQuote) -> Option<f64>| -> ArrayRef {
        Arc::new(quotes.iter().map(get).collect::<Float64Array>())
    };

    let arrays: Vec<ArrayRef> = vec![
        timestamps(quotes.iter().map(|q| q.timestamp)),
        Arc::new(StringArray::from_iter_values(quotes.iter().map(|q| q.symbol.as_str()))),
        Arc::new(StringArray::from_iter_values(quotes.iter().map(|q| q.option.as_str()))),
        Arc::new(Int64Array::from_iter_values(quotes.iter().map(|q| q.open_interest))),
        Arc::new(Int64Array::from_iter_values(quotes.iter().map(|q| q.volume))),
        f(|q| q.delta),
        f(|q| q.gamma),
        f(|q| q.vega),
        f(|q| q.theta),
        f(|q| q.rho),
        f(|q| q.theo),
        f(|q| q.open),
        f(|q| q.high),
        f(|q| q.iv),
        f(|q| q.bid),
        f(|q| q.ask),
    ];

    Ok(RecordBatch::try_new(option_quote_schema(), arrays)?)
}

pub fn batch_to_quotes(batch: &RecordBatch) -> Result<Vec<OptionQuote>, Error> {
    let ts = typed_column::<TimestampMicrosecondArray>(batch, "timestamp")?;
    let symbol = typed_column::<StringArray>(batch, "symbol")?;
    let option = typed_column::<StringArray>(batch, "option")?;
    let oi = typed_column::<Int64Array>(batch, "open_interest")?;
    let volume = typed_column::<Int64Array>(batch, "volume")?;
    let delta = typed_column::<Float64Array>(batch, "delta")?;
    let gamma = typed_column::<Float64Array>(batch, "gamma")?;
    let vega = typed_column::<Float64Array>(batch, "vega")?;
    let theta = typed_column::<Float64Array>(batch, "theta")?;
    let rho = typed_column::<Float64Array>(batch, "rho")?;
    let theo = typed_column::<Float64Array>(batch, "theo")?;
    let open = typed_column::<Float64Array>(batch, "open")?;
    let high = typed_column::<Float64Array>(batch, "high")?;
    let iv = typed_column::<Float64Array>(batch, "iv")?;
    let bid = typed_column::<Float64Array>(batch, "bid")?;
    let ask = typed_column::<Float64Array>(batch, "ask")?;

    (0..batch.num_rows())
        .map(|i| {
            Ok(OptionQuote {
                timestamp: timestamp_at(ts, "timestamp", i)?,
                symbol: string_at(symbol, "symbol", i)?,
                option: string_at(option, "option", i)?,
                open_interest: opt_i64(oi, i).unwrap_or(0),
                volume: opt_i64(volume, i).unwrap_or(0),
                delta: opt_f64(delta, i),
                gamma: opt_f64(gamma, i),
                vega: opt_f64(vega, i),
                theta: opt_f64(theta, i),
                rho: opt_f64(rho, i),
                theo: opt_f64(theo, i),
                open: opt_f64(open, i),
                high: opt_f64(high, i),
                iv: opt_f64(iv, i),
                bid: opt_f64(bid, i),
                ask: opt_f64(ask, i),
            })
        })
        .collect()
}

pub fn snapshots_to_batch(stocks: &[StockSnapshot]) -> Result<RecordBatch, Error> {
    let f = |get: fn(&StockSnapshot) -> Option<f64>| -> ArrayRef {
        Arc::new(stocks.iter().map(get).collect::<Float64Array>())
    };

    let arrays: Vec<ArrayRef> = vec![
        timestamps(stocks.iter().map(|s| s.timestamp)),
        Arc::new(StringArray::from_iter_values(stocks.iter().map(|s| s.symbol.as_str()))),
        f(|s| s.current_price),
        f(|s| s.open),
        f(|s| s.high),
        f(|s| s.low),
        f(|s| s.close),
        f(|s| s.prev_day_close),
        f(|s| s.volume),
        f(|s| s.price_change),
        f(|s| s.price_change_percent),
        f(|s| s.iv30),
    ];

    Ok(RecordBatch::try_new(stock_snapshot_schema(), arrays)?)
}

pub fn batch_to_snapshots(batch: &RecordBatch) -> Result<Vec<StockSnapshot>, Error> {
    let ts = typed_column::<TimestampMicrosecondArray>(batch, "timestamp")?;
    let symbol = typed_column::<StringArray>(batch, "symbol")?;
    let cols = STOCK_FLOATS
        .iter()
        .map(|name| typed_column::<Float64Array>(batch, name))
        .collect::<Result<Vec<_>, _>>()?;
    let [current_price, open, high, low, close, prev_day_close, volume, change, change_pct, iv30] =
        cols[..]
    else {
        return Err(Error::MissingColumn("stock snapshot columns".into()));
    };

    (0..batch.num_rows())
        .map(|i| {
            Ok(StockSnapshot {
                timestamp: timestamp_at(ts, "timestamp", i)?,
                symbol: string_at(symbol, "symbol", i)?,
                current_price: opt_f64(current_price, i),
                open: opt_f64(open, i),
                high: opt_f64(high, i),
                low: opt_f64(low, i),
                close: opt_f64(close, i),
                prev_day_close: opt_f64(prev_day_close, i),
                volume: opt_f64(volume, i),
                price_change: opt_f64(change, i),
                price_change_percent: opt_f64(change_pct, i),
                iv30: opt_f64(iv30, i),
            })
        })
        .collect()
}

/// Looks up a column by name and downcasts it.
pub fn typed_column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a T, Error> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| Error::MissingColumn(name.to_string()))?;
    column
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::ColumnType {
            column: name.to_string(),
            found: column.data_type().clone(),
            expected: std::any::type_name::<T>(),
        })
}

pub fn opt_f64(array: &Float64Array, i: usize) -> Option<f64> {
    array.is_valid(i).then(|| array.value(i))
}

pub fn opt_i64(array: &Int64Array, i: usize) -> Option<i64> {
    array.is_valid(i).then(|| array.value(i))
}

pub fn string_at(array: &StringArray, column: &str, i: usize) -> Result<String, Error> {
    if array.is_null(i) {
        return Err(null_value(column, i));
    }
    Ok(array.value(i).to_string())
}

pub fn timestamp_at(
    array: &TimestampMicrosecondArray,
    column: &str,
    i: usize,
) -> Result<DateTime<Utc>, Error> {
    if array.is_null(i) {
        return Err(null_value(column, i));
    }
    DateTime::from_timestamp_micros(array.value(i)).ok_or_else(|| Error::InvalidValue {
        column: column.to_string(),
        row: i,
        message: format!("timestamp {} out of range", array.value(i)),
    })
}

pub fn date_at(array: &Date32Array, column: &str, i: usize) -> Result<NaiveDate, Error> {
    if array.is_null(i) {
        return Err(null_value(column, i));
    }
    date32_to_naive(array.value(i)).ok_or_else(|| Error::InvalidValue {
        column: column.to_string(),
        row: i,
        message: format!("day {} out of range", array.value(i)),
    })
}

fn null_value(column: &str, row: usize) -> Error {
    Error::InvalidValue {
        column: column.to_string(),
        row,
        message: "unexpected null".to_string(),
    }
}

/// Days since the Unix epoch, as stored in `Date32`.
pub fn naive_to_date32(date: NaiveDate) -> i32 {
    (date - DateTime::UNIX_EPOCH.date_naive()).num_days() as i32
}

pub fn date32_to_naive(days: i32) -> Option<NaiveDate> {
    DateTime::UNIX_EPOCH
        .date_naive()
        .checked_add_signed(chrono::TimeDelta::days(i64::from(days)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quote(option: &str, oi: i64) -> OptionQuote {
        OptionQuote {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 20, 15, 0).unwrap(),
            symbol: "AAPL".into(),
            option: option.into(),
            open_interest: oi,
            volume: 7,
            delta: Some(0.5),
            gamma: None,
            vega: Some(0.1),
            theta: Some(-0.02),
            rho: None,
            theo: Some(3.2),
            open: None,
            high: None,
            iv: Some(0.31),
            bid: Some(3.1),
            ask: Some(3.3),
        }
    }

    #[test]
    fn quotes_survive_arrow_conversion() {
        let quotes = vec![quote("AAPL240621C00150000", 100), quote("AAPL240621P00150000", 0)];
        let batch = quotes_to_batch(&quotes).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).data_type(), &timestamp_type());
        assert_eq!(batch_to_quotes(&batch).unwrap(), quotes);
    }

    #[test]
    fn missing_and_mistyped_columns_are_reported() {
        let batch = quotes_to_batch(&[quote("X240621C00001000", 1)]).unwrap();
        assert!(matches!(
            typed_column::<Float64Array>(&batch, "nope"),
            Err(Error::MissingColumn(_))
        ));
        assert!(matches!(
            typed_column::<Float64Array>(&batch, "symbol"),
            Err(Error::ColumnType { .. })
        ));
    }

    #[test]
    fn date32_epoch_offsets() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(naive_to_date32(d), 19723);
        assert_eq!(date32_to_naive(19723), Some(d));
        assert_eq!(date32_to_naive(0), NaiveDate::from_ymd_opt(1970, 1, 1));
    }
}
