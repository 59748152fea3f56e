use crate::domain::order::Order;
use crate::error::{AccrualError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct OrderRecord {
    number: String,
    user_id: String,
}

/// Reads orders to submit from a CSV source with a `number, user_id` header.
///
/// Whitespace is trimmed and short rows are reported as errors instead of aborting the stream.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    /// Creates a new `OrderReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one `New` order per row.
    pub fn orders(self) -> impl Iterator<Item = Result<Order>> {
        self.reader.into_deserialize().map(|result| {
            let record: OrderRecord = result.map_err(AccrualError::from)?;
            if record.number.is_empty() || !record.number.chars().all(|c| c.is_ascii_digit()) {
                return Err(AccrualError::ValidationError(format!(
                    "Invalid order number {:?}",
                    record.number
                )));
            }
            Ok(Order::new(record.number, record.user_id))
        })
    }
}
