#![allow(dead_code)]

use rand::Rng;
use std::io::{Error, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const HEADER: &str = "type,order,garment,service,payment,amount,quantity,method,name,reason,force";

/// Writes the header plus `rows` into a temporary CSV file.
pub fn commands_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Opens one order with a single service worth `price` for every payment,
/// charges each payment in full, then fires `refunds` random refund attempts.
///
/// Refund amounts are drawn so that many of them overshoot what is left.
pub fn generate_refund_workload(
    path: &Path,
    payments: u32,
    refunds: usize,
    price_cents: i64,
) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    wtr.write_record(HEADER.split(','))?;
    wtr.write_record(["open_order", "1", "", "", "", "", "", "", "Load Test"])?;
    wtr.write_record(["add_garment", "1", "1"])?;

    let price = format_cents(price_cents);
    for id in 1..=payments {
        let id = id.to_string();
        wtr.write_record(["add_service", "1", "1", id.as_str(), "", price.as_str(), "1", "", "alteration"])?;
    }
    for id in 1..=payments {
        let id = id.to_string();
        let method = if id.ends_with('0') { "cash" } else { "card" };
        wtr.write_record(["charge", "1", "", "", id.as_str(), price.as_str(), "", method])?;
    }

    let mut rng = rand::thread_rng();
    for _ in 0..refunds {
        let payment = rng.gen_range(1..=payments).to_string();
        let amount = format_cents(rng.gen_range(-100..=price_cents / 2));
        if rng.gen_bool(0.5) {
            wtr.write_record(["refund", "", "", "", payment.as_str(), amount.as_str()])?;
        } else {
            wtr.write_record([
                "manual_refund", "", "", "", payment.as_str(), amount.as_str(), "", "", "", "adjustment",
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    format!("{}{}.{:02}", sign, cents.abs() / 100, cents.abs() % 100)
}
