use crate::domain::command::Command;
use crate::error::{LedgerError, Result};
use std::io::Read;

/// A parsed command row, tagged with the input line it starts on.
#[derive(Debug)]
pub struct CommandRow {
    /// 1-based line number; 0 when the reader could not tell.
    pub line: u64,
    pub command: Result<Command>,
}

/// Streams shop commands from CSV.
///
/// Fields are trimmed and short rows are accepted; missing trailing
/// columns read as empty.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one `CommandRow` per record.
    ///
    /// Line numbers come from the CSV parser, so quoted fields that span
    /// lines do not throw them off.
    pub fn commands(mut self) -> impl Iterator<Item = CommandRow> {
        let headers = self.reader.headers().ok().cloned();
        self.reader
            .into_records()
            .map(move |result| match result {
                Ok(record) => CommandRow {
                    line: record.position().map_or(0, |p| p.line()),
                    command: record
                        .deserialize(headers.as_ref())
                        .map_err(LedgerError::from),
                },
                Err(e) => CommandRow {
                    line: e.position().map_or(0, |p| p.line()),
                    command: Err(LedgerError::from(e)),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::CommandType;
    use crate::domain::payment::PaymentMethod;
    use rust_decimal_macros::dec;

    fn read(data: &str) -> Vec<CommandRow> {
        CommandReader::new(data.as_bytes()).commands().collect()
    }

    #[test]
    fn test_reader_valid_stream() {
        let rows = read(
            "type, order, garment, service, payment, amount, quantity, method, name, reason, force\n\
             open_order, 1, , , , , , , Ada Lovelace, , \n\
             charge, 1, , , 3, 40.00, , card, , , ",
        );

        assert_eq!(rows.len(), 2);
        let open = rows[0].command.as_ref().unwrap();
        assert_eq!(open.r#type, CommandType::OpenOrder);
        assert_eq!(open.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(rows[0].line, 2);

        let charge = rows[1].command.as_ref().unwrap();
        assert_eq!(charge.payment, Some(3));
        assert_eq!(charge.amount, Some(dec!(40.00)));
        assert_eq!(charge.method, Some(PaymentMethod::Card));
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_reader_short_rows() {
        let rows = read("type, order, garment, service, payment, amount\nrefund, , , , 3");

        let refund = rows[0].command.as_ref().unwrap();
        assert_eq!(refund.r#type, CommandType::Refund);
        assert_eq!(refund.amount, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let rows = read("type, order, payment, method\ncharge, 1, 1, bitcoin\nteleport, 1, 1, card");

        assert!(rows[0].command.is_err());
        assert_eq!(rows[0].line, 2);
        assert!(rows[1].command.is_err());
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_line_numbers_follow_multiline_fields() {
        let rows = read(
            "type,order,garment,service,payment,amount,quantity,method,name\n\
             open_order,1,,,,,,,\"Ada\nLovelace\"\n\
             add_garment,1,1",
        );

        assert_eq!(rows[0].line, 2);
        assert_eq!(
            rows[0].command.as_ref().unwrap().name.as_deref(),
            Some("Ada\nLovelace")
        );
        assert_eq!(rows[1].line, 4);
    }
}
