mod test_utils;

use dbrelay::{DbValue, RelayResult, WireFormat};
use log::info;

// cargo test --test test_040_transactions -- --nocapture
//
// The classic auto-commit scenario: two committed updates survive, the third
// update pair is rolled back, leaving stock=5 and units_sold=5.
#[test]
fn test_040_transactions() -> RelayResult<()> {
    let _log_handle = test_utils::init_logger();

    for format in test_utils::both_formats() {
        info!("=== run transaction tests with {format:?} ===");
        // a fresh engine per serialization keeps the fixtures independent
        let server = test_utils::start_server();
        let driver = test_utils::driver_for(&server, format);
        let connection = driver.connect()?;

        connection.query("create table products (id int, stock int)")?;
        connection.query("create table sales (id int, units_sold int)")?;
        connection.query("insert into products (id, stock) values (1, 0)")?;
        connection.query("insert into sales (id, units_sold) values (1, 0)")?;

        connection.set_auto_commit(false)?;

        connection.query("update products set stock = stock + 10")?;
        connection.commit()?;

        connection.query("update products set stock = stock - 5")?;
        connection.query("update sales set units_sold = units_sold + 5")?;
        connection.commit()?;

        connection.query("update products set stock = stock - 10")?;
        connection.query("update sales set units_sold = units_sold + 10")?;
        connection.rollback()?;

        let stock = connection.query("select stock from products")?.single_row()?;
        assert_eq!(stock[0], DbValue::Int(5));
        let units = connection.query("select units_sold from sales")?.single_row()?;
        assert_eq!(units[0], DbValue::Int(5));

        connection.close()?;
    }
    Ok(())
}

// The dirty bit must not reach the engine before the next data-plane
// operation, observed through the store's diagnostic interface.
#[test]
fn test_040_dirty_bit_is_lazy() -> RelayResult<()> {
    let server = test_utils::start_server();
    let driver = test_utils::driver_for(&server, WireFormat::Textual);
    let connection = driver.connect()?;
    connection.query("select 'warm-up'")?;

    // a client-side property change alone leaves the server view untouched
    connection.set_read_only(true)?;
    connection.set_auto_commit(false)?;
    let diagnostics = server.store().diagnostics()?;
    assert_eq!(diagnostics.connections.len(), 1);
    assert!(!diagnostics.connections[0].dirty);
    assert_eq!(diagnostics.connections[0].props.read_only, None);

    // the next data-plane operation carries and clears it
    connection.query("select 'data-plane'")?;
    let diagnostics = server.store().diagnostics()?;
    assert!(!diagnostics.connections[0].dirty);
    assert_eq!(diagnostics.connections[0].props.read_only, Some(true));
    assert_eq!(diagnostics.connections[0].props.auto_commit, Some(false));

    connection.close()
}
