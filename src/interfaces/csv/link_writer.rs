use crate::domain::payment_link::PaymentLink;
use crate::error::Result;
use std::io::Write;

/// Writes payment links as CSV, one row per link.
pub struct LinkWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LinkWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_links<'a>(
        &mut self,
        links: impl IntoIterator<Item = &'a PaymentLink>,
        frontend_url: &str,
    ) -> Result<()> {
        self.writer.write_record([
            "id",
            "order_id",
            "payment_type",
            "amount",
            "status",
            "created_by",
            "created_at",
            "expires_at",
            "accessed_at",
            "paid_at",
            "url",
        ])?;
        for link in links {
            let opt = |t: Option<chrono::DateTime<chrono::Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_default();
            self.writer.write_record([
                link.id.to_string(),
                link.order_id.to_string(),
                link.payment_type.to_string(),
                link.amount.to_string(),
                link.status.to_string(),
                link.created_by.clone(),
                link.created_at.to_rfc3339(),
                link.expires_at.to_rfc3339(),
                opt(link.accessed_at),
                opt(link.paid_at),
                link.url(frontend_url),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
