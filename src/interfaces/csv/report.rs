use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One session's usage in the occupancy report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyRow {
    pub session: String,
    pub confirmed: u32,
    pub waiting: u32,
    pub capacity: u32,
}

/// One transaction in the payment statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRow {
    pub member: String,
    pub status: String,
    pub amount: Decimal,
    pub membership: String,
}

/// Writes the replay reports as CSV, headers included.
pub struct ReportWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_occupancy(&mut self, rows: &[OccupancyRow]) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(&mut self.writer);
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_payments(&mut self, rows: &[PaymentRow]) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(&mut self.writer);
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Blank line between report sections.
    pub fn separator(&mut self) -> Result<()> {
        writeln!(self.writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_occupancy_report_format() {
        let rows = vec![OccupancyRow {
            session: "yoga".to_string(),
            confirmed: 9,
            waiting: 2,
            capacity: 10,
        }];
        let mut out = Vec::new();
        ReportWriter::new(&mut out).write_occupancy(&rows).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "session,confirmed,waiting,capacity\nyoga,9,2,10\n");
    }

    #[test]
    fn test_payment_report_format() {
        let rows = vec![PaymentRow {
            member: "alice".to_string(),
            status: "completed".to_string(),
            amount: dec!(250.0),
            membership: "active".to_string(),
        }];
        let mut out = Vec::new();
        ReportWriter::new(&mut out).write_payments(&rows).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "member,status,amount,membership\nalice,completed,250.0,active\n");
    }
}
