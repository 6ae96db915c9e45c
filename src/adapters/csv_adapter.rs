//! CSV file adapters: intraday bars in, trade ledger out.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::bar::Bar;
use crate::domain::error::OrbError;
use crate::domain::metrics::PeriodReturn;
use crate::domain::trade::Trade;
use crate::ports::data_port::DataPort;
use crate::ports::ledger_port::LedgerPort;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// One file per symbol-day: `{SYMBOL}_{YYYY-MM-DD}.csv` with columns
/// `timestamp,open,high,low,close,volume`.
pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, date: NaiveDate) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol, date.format("%Y-%m-%d")))
    }

    /// Write bars in the layout `fetch_bars` reads.
    pub fn write_bars(&self, symbol: &str, date: NaiveDate, bars: &[Bar]) -> Result<(), OrbError> {
        fs::create_dir_all(&self.base_path)?;
        let mut wtr = csv::Writer::from_path(self.csv_path(symbol, date))?;
        wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
        for bar in bars {
            wtr.write_record([
                bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                format!("{:.4}", bar.open),
                format!("{:.4}", bar.high),
                format!("{:.4}", bar.low),
                format!("{:.4}", bar.close),
                bar.volume.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value.trim(), fmt).ok())
}

fn field<'a>(record: &'a csv::StringRecord, index: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| format!("missing {name} column"))
}

fn parse_price(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, String> {
    field(record, index, name)?
        .parse()
        .map_err(|e| format!("invalid {name} value: {e}"))
}

fn parse_bar(record: &csv::StringRecord) -> Result<Bar, String> {
    let ts = field(record, 0, "timestamp")?;
    let timestamp = parse_timestamp(ts).ok_or_else(|| format!("invalid timestamp '{ts}'"))?;
    let volume = field(record, 5, "volume")?;
    // some providers emit volume as a float
    let volume = volume
        .parse::<i64>()
        .or_else(|_| volume.parse::<f64>().map(|v| v.round() as i64))
        .map_err(|e| format!("invalid volume value: {e}"))?;

    Ok(Bar {
        timestamp,
        open: parse_price(record, 1, "open")?,
        high: parse_price(record, 2, "high")?,
        low: parse_price(record, 3, "low")?,
        close: parse_price(record, 4, "close")?,
        volume,
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Bar>, OrbError> {
        let path = self.csv_path(symbol, date);
        let content = fs::read_to_string(&path)
            .map_err(|e| OrbError::data(symbol, date, format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result
                .map_err(|e| OrbError::data(symbol, date, format!("CSV parse error: {e}")))?;
            let bar = parse_bar(&record)
                .map_err(|reason| OrbError::data(symbol, date, format!("row {}: {reason}", line + 1)))?;
            if bar.date() == date {
                bars.push(bar);
            }
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

/// Writes `trades.csv` and `periods.csv` into an output directory.
pub struct CsvLedgerWriter {
    output_dir: PathBuf,
}

impl CsvLedgerWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn trades_path(&self) -> PathBuf {
        self.output_dir.join("trades.csv")
    }

    pub fn periods_path(&self) -> PathBuf {
        self.output_dir.join("periods.csv")
    }

    fn writer(&self, path: &Path) -> Result<csv::Writer<fs::File>, OrbError> {
        fs::create_dir_all(&self.output_dir)?;
        csv::Writer::from_path(path).map_err(|e| OrbError::Ledger {
            reason: format!("failed to create {}: {}", path.display(), e),
        })
    }
}

impl LedgerPort for CsvLedgerWriter {
    fn write_trades(&self, trades: &[Trade]) -> Result<(), OrbError> {
        let mut wtr = self.writer(&self.trades_path())?;
        wtr.write_record([
            "symbol",
            "entry_time",
            "entry_price",
            "exit_time",
            "exit_price",
            "exit_reason",
            "shares",
            "stop_price",
            "target_price",
            "commission",
            "pnl",
            "hold_minutes",
        ])?;
        for t in trades {
            wtr.write_record([
                t.symbol.clone(),
                t.entry_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                format!("{:.4}", t.entry_price),
                t.exit_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                format!("{:.4}", t.exit_price),
                t.exit_reason.to_string(),
                t.shares.to_string(),
                format!("{:.4}", t.stop_price),
                format!("{:.4}", t.target_price),
                format!("{:.2}", t.commission),
                format!("{:.2}", t.pnl),
                t.hold_minutes.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_periods(&self, periods: &[PeriodReturn]) -> Result<(), OrbError> {
        let mut wtr = self.writer(&self.periods_path())?;
        wtr.write_record(["period", "starting_equity", "pnl", "return_pct"])?;
        for p in periods {
            wtr.write_record([
                p.period.clone(),
                format!("{:.2}", p.starting_equity),
                format!("{:.2}", p.pnl),
                format!("{:.4}", p.return_pct * 100.0),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::ExitReason;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2025-03-03 09:31:00,100.5,101.0,100.2,100.8,1200\n\
            2025-03-03 09:30:00,100.0,100.6,99.8,100.5,1500\n\
            2025-03-04 09:30:00,101.0,101.5,100.9,101.2,900\n";
        fs::write(path.join("NVDA_2025-03-03.csv"), csv_content).unwrap();
        fs::write(
            path.join("AMD_2025-03-03.csv"),
            "timestamp,open,high,low,close,volume\n2025-03-03 09:30:00,abc,1,1,1,1\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_bars_sorts_and_filters_to_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_bars("NVDA", date()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, date().and_hms_opt(9, 30, 0).unwrap());
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 100.6);
        assert_eq!(bars[0].low, 99.8);
        assert_eq!(bars[0].close, 100.5);
        assert_eq!(bars[0].volume, 1500);
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_bars("TSLA", date()).unwrap_err();
        assert!(matches!(err, OrbError::DataUnavailable { ref symbol, .. } if symbol == "TSLA"));
    }

    #[test]
    fn bad_value_is_data_unavailable() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_bars("AMD", date()).unwrap_err();
        assert!(matches!(err, OrbError::DataUnavailable { ref reason, .. } if reason.contains("open")));
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2025-03-03 09:30:00").is_some());
        assert!(parse_timestamp("2025-03-03T09:30:00").is_some());
        assert!(parse_timestamp("2025-03-03 09:30").is_some());
        assert!(parse_timestamp("03/03/2025 09:30").is_none());
    }

    #[test]
    fn written_bars_read_back() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvAdapter::new(dir.path().join("bars"));
        let bars = vec![Bar {
            timestamp: date().and_hms_opt(9, 30, 0).unwrap(),
            open: 10.0,
            high: 10.5,
            low: 9.5,
            close: 10.25,
            volume: 300,
        }];
        adapter.write_bars("SPY", date(), &bars).unwrap();
        assert_eq!(adapter.fetch_bars("SPY", date()).unwrap(), bars);
    }

    #[test]
    fn ledger_writer_outputs_both_files() {
        let dir = TempDir::new().unwrap();
        let writer = CsvLedgerWriter::new(dir.path().join("out"));
        let at = |h, m| date().and_hms_opt(h, m, 0).unwrap();
        let trade = Trade {
            symbol: "NVDA".into(),
            entry_time: at(9, 46),
            entry_price: 102.5,
            exit_time: at(9, 47),
            exit_price: 101.475,
            exit_reason: ExitReason::Stop,
            shares: 100,
            stop_price: 101.475,
            target_price: 105.575,
            commission: 1.40,
            pnl: -103.9,
            hold_minutes: 1,
        };
        writer.write_trades(&[trade]).unwrap();
        writer
            .write_periods(&[PeriodReturn {
                period: "2025-03".into(),
                starting_equity: 100_000.0,
                pnl: -103.9,
                return_pct: -0.001039,
            }])
            .unwrap();

        let trades = fs::read_to_string(writer.trades_path()).unwrap();
        let mut lines = trades.lines();
        assert!(lines.next().unwrap().starts_with("symbol,entry_time"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("NVDA,2025-03-03 09:46:00,102.5000"));
        assert!(row.contains(",STOP,100,"));

        let periods = fs::read_to_string(writer.periods_path()).unwrap();
        assert!(periods.contains("2025-03,100000.00,-103.90,-0.1039"));
    }
}
