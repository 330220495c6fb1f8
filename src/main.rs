// src/main.rs

use log::info;

use rowcoro::coro::{kill_on, kill_switch};
use rowcoro::rows::iterate_rows;
use rowcoro::rows::memory::VecRows;
use rowcoro::rows::value::{ColumnValue, RowData};

fn main() {
    env_logger::init();

    let rows = match VecRows::new([
        RowData(vec![ColumnValue::Integer(13), ColumnValue::Text("foo".into())]),
        RowData(vec![ColumnValue::Integer(42), ColumnValue::Text("bar".into())]),
    ]) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Tie the producer's lifetime to this scope: if we bail out early the
    // switch drops and the rows still get released.
    let (_switch, signal) = kill_switch();

    let mut next_row = match iterate_rows(rows, vec![kill_on(signal)]) {
        Ok(next_row) => next_row,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut row = None;
    let mut err = None;
    while next_row.next_row(&mut row, Some(&mut err)) {
        let Some(data) = row.take() else { continue };
        match (data.get(0).and_then(ColumnValue::as_integer), data.get(1).and_then(ColumnValue::as_text)) {
            (Some(id), Some(name)) => println!("ID: {} Name: {}", id, name),
            _ => {
                eprintln!("Error: unexpected row shape {:?}", data);
                return;
            }
        }
    }
    if let Some(e) = err {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    info!("done");
}
