use crate::domain::order::Order;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRow<'a> {
    number: &'a str,
    user_id: &'a str,
    status: &'static str,
    accrual: String,
}

/// Writes the final state of orders as CSV.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes a `number,user_id,status,accrual` header followed by one row per order.
    /// The accrual column is empty for orders without a reward.
    pub fn write_orders(&mut self, orders: impl IntoIterator<Item = Order>) -> Result<()> {
        for order in orders {
            self.writer.serialize(OrderRow {
                number: &order.number,
                user_id: &order.user_id,
                status: order.status.as_str(),
                accrual: order.accrual.map(|r| r.to_string()).unwrap_or_default(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
