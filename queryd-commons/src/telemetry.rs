//! A lightweight event sink used by the usage tracker and learning engine so
//! they can be tested without a real structured-logging backend.

use anyhow::Result;

pub trait TelemetrySink<Event>: Send + Sync {
    fn record(&self, event: &Event) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl<Event> TelemetrySink<Event> for NoopTelemetry {
    fn record(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}
