//! JsonLinesSink - one JSON object per envelope, newline-delimited

use contracts::{ContractError, DataSink, Envelope};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes `{"seq":..,"event":..,"payload":..}` lines to any async writer
pub struct JsonLinesSink<W> {
    name: String,
    writer: W,
    line: Vec<u8>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
            line: Vec::with_capacity(1024),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new("stdout", tokio::io::stdout())
    }
}

impl<W> DataSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, envelope)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        self.line.push(b'\n');
        self.writer.write_all(&self.line).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.writer.flush().await?;
        Ok(())
    }
}
