mod test_utils;

use bigdecimal::BigDecimal;
use dbrelay::{DbValue, RelayResult, RemoteDriver, WireFormat};
use log::info;
use std::str::FromStr;

// cargo test --test test_025_decimals -- --nocapture
#[test]
fn test_025_decimals() -> RelayResult<()> {
    let _log_handle = test_utils::init_logger();
    let server = test_utils::start_server();

    for format in test_utils::both_formats() {
        info!("=== run typed-value tests with {format:?} ===");
        let driver = test_utils::driver_for(&server, format);
        decimals_round_trip_exactly(&driver, format)?;
        binary_reads_back_as_string(&driver, format)?;
        unicode_passes_through(&driver)?;
    }
    Ok(())
}

// 12345.67890 with scale 5 must come back as the exact string, trailing zero
// included, and as the numerically equal decimal.
fn decimals_round_trip_exactly(driver: &RemoteDriver, format: WireFormat) -> RelayResult<()> {
    let connection = driver.connect()?;
    let table = format!("decimals_{}", suffix(format));
    connection.query(format!(
        "create table {table} (f1 varchar(100), f2 decimal(10,5))"
    ))?;

    let insert = connection.prepare(format!("insert into {table} (f1, f2) values (?, ?)"), -1)?;
    let expected = BigDecimal::from_str("12345.67890").unwrap();
    insert.execute(&[
        DbValue::String("12345.67890".to_string()),
        DbValue::Decimal(expected.clone()),
    ])?;
    insert.close()?;

    let row = connection
        .query(format!("select f1, f2 from {table}"))?
        .single_row()?;
    if let (DbValue::String(f1), DbValue::Decimal(f2)) = (&row[0], &row[1]) {
        assert_eq!(f2.to_string(), *f1);
        assert_eq!(f2.to_string(), "12345.67890");
        assert_eq!(*f2, expected);
    } else {
        panic!("Unexpected value type");
    }

    connection.query(format!("drop table {table}"))?;
    connection.close()
}

// The four bytes 61 73 64 66, read as a string, are `asdf`.
fn binary_reads_back_as_string(driver: &RemoteDriver, format: WireFormat) -> RelayResult<()> {
    let connection = driver.connect()?;
    let table = format!("blobs_{}", suffix(format));
    connection.query(format!("create table {table} (b varbinary(16))"))?;

    let insert = connection.prepare(format!("insert into {table} (b) values (?)"), -1)?;
    insert.execute(&[DbValue::Bytes(vec![0x61, 0x73, 0x64, 0x66])])?;
    insert.close()?;

    let row = connection
        .query(format!("select b from {table}"))?
        .single_row()?;
    assert_eq!(row[0], DbValue::Bytes(vec![0x61, 0x73, 0x64, 0x66]));
    assert_eq!(row[0].try_as_str()?, "asdf");

    connection.query(format!("drop table {table}"))?;
    connection.close()
}

fn unicode_passes_through(driver: &RemoteDriver) -> RelayResult<()> {
    let connection = driver.connect()?;
    for text in ["您好", "こんにちは", "안녕하세요"] {
        let row = connection
            .query(format!("select '{text}' as greeting"))?
            .single_row()?;
        assert_eq!(row[0].try_as_str()?, text);
    }
    connection.close()
}

fn suffix(format: WireFormat) -> &'static str {
    match format {
        WireFormat::Textual => "textual",
        WireFormat::Binary => "binary",
    }
}
