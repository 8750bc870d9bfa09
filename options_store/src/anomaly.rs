//! Day-over-day open interest anomaly scoring.
//!
//! For every contract, rows are visited in date order carrying the previous
//! open interest. A row is scored when a previous row exists with positive
//! open interest:
//!
//! ```text
//! oi_change     = oi - prev
//! oi_ratio      = oi / prev
//! anomaly_score = round(oi_change * ln(oi + 1))
//! ```
//!
//! Expired rows (`dte < 0`) are dropped before the look-back, so they neither
//! score nor serve as anyone's previous value.

use std::collections::BTreeMap;
use std::path::Path;

use options_ingestor::io::parquet_file::{Codec, list_parquet_files, read_parquet, write_parquet};
use tracing::info;

use crate::error::StoreResult;
use crate::records::{
    AnomalyRecord, CanonicalOptionRecord, anomalies_to_batch, batch_to_canonical,
};

/// Days from `record.date` to expiration.
pub fn days_to_expiration(record: &CanonicalOptionRecord) -> i64 {
    (record.expiration_date - record.date).num_days()
}

/// Scores `records` and returns them ordered by date, option symbol,
/// expiration and option type.
pub fn score(records: Vec<CanonicalOptionRecord>) -> Vec<AnomalyRecord> {
    let mut by_contract: BTreeMap<String, Vec<CanonicalOptionRecord>> = BTreeMap::new();
    for r in records {
        if days_to_expiration(&r) >= 0 {
            by_contract.entry(r.option_code.clone()).or_default().push(r);
        }
    }

    let mut out = Vec::new();
    for rows in by_contract.values_mut() {
        rows.sort_by_key(|r| r.date);
        for pair in rows.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if prev.open_interest <= 0 {
                continue;
            }
            let change = cur.open_interest - prev.open_interest;
            out.push(AnomalyRecord {
                date: cur.date,
                option_code: cur.option_code.clone(),
                option_symbol: cur.option_symbol.clone(),
                expiration: cur.expiration_date,
                dte: days_to_expiration(cur),
                option_type: cur.option_type,
                strike: cur.strike,
                open_interest: cur.open_interest,
                volume: cur.volume,
                prev_open_interest: prev.open_interest,
                oi_change: change,
                oi_ratio: cur.open_interest as f64 / prev.open_interest as f64,
                anomaly_score: (change as f64 * ((cur.open_interest + 1) as f64).ln()).round(),
            });
        }
    }

    out.sort_by(|a, b| {
        (a.date, &a.option_symbol, a.expiration, a.option_type)
            .cmp(&(b.date, &b.option_symbol, b.expiration, b.option_type))
    });
    out
}

/// Reads every canonical row under `store_root`.
pub fn load_store(store_root: &Path) -> StoreResult<Vec<CanonicalOptionRecord>> {
    let mut rows = Vec::new();
    for file in list_parquet_files(store_root)? {
        rows.extend(batch_to_canonical(&read_parquet(&file)?)?);
    }
    Ok(rows)
}

/// Scores the whole store and writes the result as a ZSTD parquet file.
/// Returns the number of scored rows.
pub fn score_store(store_root: &Path, output: &Path) -> StoreResult<usize> {
    let records = load_store(store_root)?;
    let input = records.len();
    let scored = score(records);
    write_parquet(output, &anomalies_to_batch(&scored)?, Codec::Zstd)?;
    info!(input, scored = scored.len(), path = %output.display(), "wrote anomaly scores");
    Ok(scored.len())
}
