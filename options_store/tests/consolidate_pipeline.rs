mod common;

use common::*;
use options_ingestor::io::parquet_file::{list_parquet_files, read_parquet};
use options_ingestor::models::exception_symbols::ExceptionSymbolSet;
use options_store::StoreError;
use options_store::canonical::OptionType;
use options_store::checkpoint::CheckpointTracker;
use options_store::consolidate::ConsolidationWriter;
use options_store::records::batch_to_canonical;

fn seed(data: &std::path::Path) {
    let w2 = data.join("w2");
    write_raw_options(
        &w2,
        "2024-03-01",
        "release_a",
        &[
            quote("2024-03-01", "AAPL", "AAPL240621C00150000", 100),
            quote("2024-03-01", "_SPX", "SPXW240607P05012500", 40),
        ],
    );
    write_raw_options(
        &w2,
        "2024-03-02",
        "release_b",
        &[quote("2024-03-02", "AAPL", "AAPL240621C00150000", 140)],
    );
    write_raw_options(
        &w2,
        "2024-03-03",
        "release_c",
        &[quote("2024-03-03", "AAPL", "AAPL240621C00150000", 90)],
    );
}

#[test]
fn consolidates_in_date_order_up_to_the_limit() {
    let r = roots();
    seed(&r.data);

    let writer = ConsolidationWriter::new(&r.data, &r.work, 2, ExceptionSymbolSet::new(["SPX"]));
    let report = writer.run().unwrap();

    assert_eq!(report.dates, vec!["2024-03-01", "2024-03-02"]);
    assert_eq!(report.rows_written, 3);
    assert_eq!(report.files_written.len(), 3);
    assert_eq!(report.mirrored, 3);
    assert_eq!(report.checkpoint, "2024-03-02");

    let aapl = r.work.join("w2-output/symbol=AAPL");
    let names = file_names(&aapl);
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("data_2024-03-01_"));
    assert!(names[1].starts_with("data_2024-03-02_"));

    let spx = list_parquet_files(&r.work.join("w2-output/symbol=SPX")).unwrap();
    let rows = batch_to_canonical(&read_parquet(&spx[0]).unwrap()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].option_symbol, "SPX");
    assert_eq!(rows[0].underlying_symbol, "SPX");
    assert_eq!(rows[0].option_type, OptionType::Put);
    assert_eq!(rows[0].strike, 5012.5);

    let flat = file_names(&r.work.join("w2-flat"));
    assert_eq!(flat.len(), 3);
    assert!(flat.iter().any(|n| n.starts_with("SPX_data_2024-03-01_")));
    assert!(flat.iter().filter(|n| n.starts_with("AAPL_data_")).count() == 2);

    let committed = CheckpointTracker::load(&r.work).unwrap();
    assert_eq!(committed.current().last_date, "2024-03-02");
}

#[test]
fn next_run_resumes_after_committed_checkpoint() {
    let r = roots();
    seed(&r.data);
    let writer = ConsolidationWriter::new(&r.data, &r.work, 2, ExceptionSymbolSet::default());
    writer.run().unwrap();

    // The release step publishes the work checkpoint back to the source root.
    std::fs::copy(r.work.join("config.json"), r.data.join("config.json")).unwrap();
    let report = writer.run().unwrap();
    assert_eq!(report.dates, vec!["2024-03-03"]);
    assert_eq!(report.checkpoint, "2024-03-03");
    assert_eq!(report.mirrored, 1);

    let aapl = file_names(&r.work.join("w2-output/symbol=AAPL"));
    assert_eq!(aapl.len(), 3);
}

#[test]
fn nothing_new_still_commits_checkpoint() {
    let r = roots();
    seed(&r.data);
    std::fs::write(r.data.join("config.json"), r#"{"lastDate":"2024-03-03"}"#).unwrap();

    let report = ConsolidationWriter::new(&r.data, &r.work, 5, ExceptionSymbolSet::default())
        .run()
        .unwrap();
    assert!(report.dates.is_empty());
    assert!(!r.work.join("w2-output").exists());
    insta::assert_snapshot!(report.to_string(), @"No new dates to consolidate (checkpoint 2024-03-03)");
    assert_eq!(
        CheckpointTracker::load(&r.work).unwrap().current().last_date,
        "2024-03-03"
    );
}

#[test]
fn record_date_follows_the_partition() {
    let r = roots();
    // A snapshot taken late on 03-01 but filed under the 03-02 partition.
    write_raw_options(
        &r.data.join("w2"),
        "2024-03-02",
        "late",
        &[quote("2024-03-01", "AAPL", "AAPL240621C00150000", 100)],
    );

    let report = ConsolidationWriter::new(&r.data, &r.work, 5, ExceptionSymbolSet::default())
        .run()
        .unwrap();
    assert_eq!(report.checkpoint, "2024-03-02");

    let rows = batch_to_canonical(&read_parquet(&report.files_written[0]).unwrap()).unwrap();
    assert_eq!(rows[0].date, day("2024-03-02"));
}

#[test]
fn malformed_code_aborts_before_writing_the_date() {
    let r = roots();
    write_raw_options(
        &r.data.join("w2"),
        "2024-03-01",
        "bad",
        &[
            quote("2024-03-01", "AAPL", "AAPL240621C00150000", 1),
            quote("2024-03-01", "AAPL", "AAPL2406X", 1),
        ],
    );

    let err = ConsolidationWriter::new(&r.data, &r.work, 5, ExceptionSymbolSet::default())
        .run()
        .unwrap_err();
    assert!(matches!(err, StoreError::MalformedContractCode { ref code, .. } if code == "AAPL2406X"));
    assert!(!r.work.join("w2-output").exists());
    assert!(!r.work.join("config.json").exists());
}

#[test]
fn missing_raw_root_is_reported() {
    let r = roots();
    let err = ConsolidationWriter::new(&r.data, &r.work, 5, ExceptionSymbolSet::default())
        .run()
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"), "{err}");
}
