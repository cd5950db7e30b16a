//! Append-only audit trade log.
//!
//! JSON Lines format: each line is a complete record, so partial writes
//! only ever corrupt a single line and the file stays readable after an
//! interrupted session. Files rotate daily; writes are buffered and
//! flushed when the buffer fills or on close.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pmm_core::{OrderSide, Price, Qty, VenueRole};

use crate::error::TelemetryResult;

/// One audit record per confirmed fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ts_ms: u64,
    pub venue: VenueRole,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Price,
    pub qty: Qty,
    pub fee: Decimal,
    pub is_maker: Option<bool>,
    pub order_id: String,
}

struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Buffered JSON Lines writer with daily rotation.
pub struct TradeLogWriter {
    base_dir: PathBuf,
    buffer: Vec<TradeRecord>,
    max_buffer_size: usize,
    active_writer: Option<ActiveWriter>,
}

impl TradeLogWriter {
    pub fn new(base_dir: impl AsRef<Path>, max_buffer_size: usize) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&base_dir) {
            warn!(?e, dir = %base_dir.display(), "Failed to create trade log directory");
        }

        Self {
            base_dir,
            buffer: Vec::with_capacity(max_buffer_size.max(1)),
            max_buffer_size: max_buffer_size.max(1),
            active_writer: None,
        }
    }

    /// Buffer a record; flushes when the buffer is full.
    pub fn add_record(&mut self, record: TradeRecord) -> TelemetryResult<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush trade log on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed trade log writer"
            );
        }
    }

    fn create_new_writer(&mut self, date: &str) -> TelemetryResult<()> {
        let filename = self.base_dir.join(format!("trades_{date}.jsonl"));
        info!(filename = %filename.display(), "Opening trade log (append mode)");

        let file = OpenOptions::new().create(true).append(true).open(&filename)?;
        self.active_writer = Some(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        });
        Ok(())
    }

    /// Write every buffered record out.
    pub fn flush(&mut self) -> TelemetryResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let needs_rotation = self
            .active_writer
            .as_ref()
            .map(|w| w.date != today)
            .unwrap_or(false);
        if needs_rotation {
            self.close_active_writer();
        }
        if self.active_writer.is_none() {
            self.create_new_writer(&today)?;
        }

        let active = self
            .active_writer
            .as_mut()
            .expect("active writer just created");
        for record in &self.buffer {
            let json = serde_json::to_string(record)?;
            active.writer.write_all(json.as_bytes())?;
            active.writer.write_all(b"\n")?;
            active.records_written += 1;
        }
        active.writer.flush()?;
        self.buffer.clear();
        Ok(())
    }

    /// Flush and close. Call on shutdown.
    pub fn close(&mut self) -> TelemetryResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Drop for TradeLogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(?e, "Trade log close failed in drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmm_core::Symbol;
    use rust_decimal_macros::dec;

    fn record(ts: u64) -> TradeRecord {
        TradeRecord {
            ts_ms: ts,
            venue: VenueRole::Primary,
            symbol: Symbol::from("BTC-USD").to_string(),
            side: OrderSide::Buy,
            price: Price::new(dec!(99920.9)),
            qty: Qty::new(dec!(0.01)),
            fee: dec!(-0.1),
            is_maker: Some(true),
            order_id: format!("oid-{ts}"),
        }
    }

    fn read_lines(dir: &Path) -> Vec<String> {
        let mut lines = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                let content = std::fs::read_to_string(path).unwrap();
                lines.extend(content.lines().map(String::from));
            }
        }
        lines
    }

    #[test]
    fn test_records_written_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TradeLogWriter::new(dir.path(), 100);

        log.add_record(record(1)).unwrap();
        log.add_record(record(2)).unwrap();
        assert_eq!(log.buffered(), 2);

        log.flush().unwrap();
        assert_eq!(log.buffered(), 0);

        let lines = read_lines(dir.path());
        assert_eq!(lines.len(), 2);
        let parsed: TradeRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.order_id, "oid-1");
    }

    #[test]
    fn test_auto_flush_at_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TradeLogWriter::new(dir.path(), 2);

        log.add_record(record(1)).unwrap();
        assert_eq!(log.buffered(), 1);
        log.add_record(record(2)).unwrap(); // hits capacity
        assert_eq!(log.buffered(), 0);

        assert_eq!(read_lines(dir.path()).len(), 2);
    }

    #[test]
    fn test_append_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = TradeLogWriter::new(dir.path(), 10);
            log.add_record(record(1)).unwrap();
            log.close().unwrap();
        }
        {
            let mut log = TradeLogWriter::new(dir.path(), 10);
            log.add_record(record(2)).unwrap();
            log.close().unwrap();
        }

        assert_eq!(read_lines(dir.path()).len(), 2);
    }

    #[test]
    fn test_drop_flushes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = TradeLogWriter::new(dir.path(), 100);
            log.add_record(record(1)).unwrap();
        }
        assert_eq!(read_lines(dir.path()).len(), 1);
    }
}
