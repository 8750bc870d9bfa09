mod common;

use arrow::array::{Array, Float64Array, StringArray};
use common::*;
use options_ingestor::io::parquet_file::read_parquet;
use options_ingestor::models::exception_symbols::ExceptionSymbolSet;
use options_store::anomaly::score_store;
use options_store::consolidate::ConsolidationWriter;
use parquet::basic::Compression;
use parquet::file::reader::{FileReader, SerializedFileReader};

#[test]
fn scores_consolidated_store_end_to_end() {
    let r = roots();
    let w2 = r.data.join("w2");
    let code = "AAPL240621C00150000";
    for (date, oi) in [("2024-03-01", 100), ("2024-03-02", 140), ("2024-03-03", 90)] {
        write_raw_options(
            &w2,
            date,
            "release",
            &[
                quote(date, "AAPL", code, oi),
                quote(date, "MSFT", "MSFT240621P00400000", 10),
            ],
        );
    }
    // Already expired on its snapshot date.
    write_raw_options(
        &w2,
        "2024-03-04",
        "release",
        &[quote("2024-03-04", "AAPL", "AAPL240301C00150000", 5)],
    );

    ConsolidationWriter::new(&r.data, &r.work, 10, ExceptionSymbolSet::default())
        .run()
        .unwrap();
    let output = r.work.join("anomaly.parquet");
    let scored = score_store(&r.work.join("w2-output"), &output).unwrap();
    assert_eq!(scored, 4);

    let batch = read_parquet(&output).unwrap();
    let symbols = batch
        .column_by_name("option_symbol")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    let order: Vec<_> = (0..symbols.len()).map(|i| symbols.value(i)).collect();
    assert_eq!(order, vec!["AAPL", "MSFT", "AAPL", "MSFT"]);

    let ratio = batch
        .column_by_name("oi_ratio")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    let score = batch
        .column_by_name("anomaly_score")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert!((ratio.value(0) - 1.4).abs() < 1e-12);
    assert_eq!(score.value(0), (40.0 * 141f64.ln()).round());
    assert!((ratio.value(2) - 90.0 / 140.0).abs() < 1e-12);
    assert_eq!(score.value(2), (-50.0 * 91f64.ln()).round());
    assert_eq!(ratio.value(1), 1.0);
    assert_eq!(score.value(1), 0.0);

    let reader = SerializedFileReader::new(std::fs::File::open(&output).unwrap()).unwrap();
    let codec = reader.metadata().row_group(0).column(0).compression();
    assert!(matches!(codec, Compression::ZSTD(_)), "{codec:?}");
}
