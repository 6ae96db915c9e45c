//! Volatility index sources.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::error::OrbError;
use crate::ports::market_port::MarketPort;

/// The same level every day.
pub struct ConstantVolatility(pub f64);

impl MarketPort for ConstantVolatility {
    fn volatility_index(&self, _date: NaiveDate) -> Option<f64> {
        Some(self.0)
    }
}

/// Daily levels from a `date,level` CSV file.
pub struct CsvVolatilityAdapter {
    levels: BTreeMap<NaiveDate, f64>,
}

impl CsvVolatilityAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OrbError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_csv(&content).map_err(|reason| OrbError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })
    }

    pub fn from_csv(content: &str) -> Result<Self, String> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut levels = BTreeMap::new();
        for result in rdr.records() {
            let record = result.map_err(|e| format!("CSV parse error: {e}"))?;
            let date_str = record.get(0).ok_or("missing date column")?.trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|e| format!("invalid date '{date_str}': {e}"))?;
            let level: f64 = record
                .get(1)
                .ok_or("missing level column")?
                .trim()
                .parse()
                .map_err(|e| format!("invalid level for {date_str}: {e}"))?;
            levels.insert(date, level);
        }
        Ok(Self { levels })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl MarketPort for CsvVolatilityAdapter {
    fn volatility_index(&self, date: NaiveDate) -> Option<f64> {
        self.levels.get(&date).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn constant_level() {
        assert_eq!(ConstantVolatility(18.5).volatility_index(d(3)), Some(18.5));
    }

    #[test]
    fn reads_levels_by_date() {
        let adapter =
            CsvVolatilityAdapter::from_csv("date,level\n2025-03-03,21.4\n2025-03-04, 33.0\n")
                .unwrap();
        assert_eq!(adapter.len(), 2);
        assert_eq!(adapter.volatility_index(d(3)), Some(21.4));
        assert_eq!(adapter.volatility_index(d(4)), Some(33.0));
        assert_eq!(adapter.volatility_index(d(5)), None);
    }

    #[test]
    fn bad_level_is_rejected() {
        assert!(CsvVolatilityAdapter::from_csv("date,level\n2025-03-03,high\n").is_err());
        assert!(CsvVolatilityAdapter::from_csv("date,level\n3/3/2025,20\n").is_err());
    }

    #[test]
    fn from_file_maps_errors() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "date,level\n2025-03-03,x\n").unwrap();
        let err = CsvVolatilityAdapter::from_file(file.path()).err().unwrap();
        assert!(err.is_config());
        assert!(CsvVolatilityAdapter::from_file("/nonexistent/vix.csv").is_err());
    }
}
