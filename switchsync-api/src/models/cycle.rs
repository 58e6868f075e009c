use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::CycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CycleType {
    /// Time-of-day window, bounds formatted as `HH:MM:SS`
    Time,
    /// Temperature window in degrees Celsius
    Temperature,
    /// Relative humidity window in percent
    Humidity,
}

impl fmt::Display for CycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Time => "TIME",
            Self::Temperature => "TEMPERATURE",
            Self::Humidity => "HUMIDITY",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];
}

impl From<time::Weekday> for Weekday {
    fn from(day: time::Weekday) -> Self {
        match day {
            time::Weekday::Monday => Weekday::Monday,
            time::Weekday::Tuesday => Weekday::Tuesday,
            time::Weekday::Wednesday => Weekday::Wednesday,
            time::Weekday::Thursday => Weekday::Thursday,
            time::Weekday::Friday => Weekday::Friday,
            time::Weekday::Saturday => Weekday::Saturday,
            time::Weekday::Sunday => Weekday::Sunday,
        }
    }
}

/// A recurring on/off window of a device.
///
/// The cycle type is fixed at construction. Bounds are kept in their wire
/// form and can only be set through the setter matching the cycle type, so
/// a stored bound always parses for that type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CycleRecord", into = "CycleRecord")]
pub struct Cycle {
    name: String,
    cycle_type: CycleType,
    start: Option<String>,
    stop: Option<String>,
    days: BTreeSet<Weekday>,
}

impl Cycle {
    pub fn new(name: impl Into<String>, cycle_type: CycleType) -> Self {
        Self {
            name: name.into(),
            cycle_type,
            start: None,
            stop: None,
            days: Weekday::ALL.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn cycle_type(&self) -> CycleType {
        self.cycle_type
    }

    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    pub fn stop(&self) -> Option<&str> {
        self.stop.as_deref()
    }

    pub fn days(&self) -> &BTreeSet<Weekday> {
        &self.days
    }

    pub fn set_days(&mut self, days: impl IntoIterator<Item = Weekday>) {
        self.days = days.into_iter().collect();
    }

    pub fn add_weekday(&mut self, day: Weekday) -> bool {
        self.days.insert(day)
    }

    pub fn remove_weekday(&mut self, day: Weekday) -> bool {
        self.days.remove(&day)
    }

    pub fn is_scheduled_on(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }

    pub fn set_start_time(&mut self, start: &str) -> Result<(), CycleError> {
        self.expect_type(CycleType::Time)?;
        self.start = Some(parse_time(start)?);
        Ok(())
    }

    pub fn set_stop_time(&mut self, stop: &str) -> Result<(), CycleError> {
        self.expect_type(CycleType::Time)?;
        self.stop = Some(parse_time(stop)?);
        Ok(())
    }

    pub fn set_start_temperature(&mut self, start: f32) -> Result<(), CycleError> {
        self.expect_type(CycleType::Temperature)?;
        self.start = Some(format_temperature(start)?);
        Ok(())
    }

    pub fn set_stop_temperature(&mut self, stop: f32) -> Result<(), CycleError> {
        self.expect_type(CycleType::Temperature)?;
        self.stop = Some(format_temperature(stop)?);
        Ok(())
    }

    pub fn set_start_humidity(&mut self, start: i64) -> Result<(), CycleError> {
        self.expect_type(CycleType::Humidity)?;
        self.start = Some(format_humidity(start)?);
        Ok(())
    }

    pub fn set_stop_humidity(&mut self, stop: i64) -> Result<(), CycleError> {
        self.expect_type(CycleType::Humidity)?;
        self.stop = Some(format_humidity(stop)?);
        Ok(())
    }

    /// `[start, stop)` as `HH:MM:SS` strings, if this is a complete time cycle.
    pub fn time_bounds(&self) -> Option<(&str, &str)> {
        if self.cycle_type != CycleType::Time {
            return None;
        }
        Some((self.start.as_deref()?, self.stop.as_deref()?))
    }

    pub fn temperature_bounds(&self) -> Option<(f32, f32)> {
        if self.cycle_type != CycleType::Temperature {
            return None;
        }
        let start = self.start.as_deref()?.parse().ok()?;
        let stop = self.stop.as_deref()?.parse().ok()?;
        Some((start, stop))
    }

    pub fn humidity_bounds(&self) -> Option<(i64, i64)> {
        if self.cycle_type != CycleType::Humidity {
            return None;
        }
        let start = self.start.as_deref()?.parse().ok()?;
        let stop = self.stop.as_deref()?.parse().ok()?;
        Some((start, stop))
    }

    fn expect_type(&self, expected: CycleType) -> Result<(), CycleError> {
        if self.cycle_type == expected {
            Ok(())
        } else {
            Err(CycleError::TypeMismatch {
                expected,
                found: self.cycle_type,
            })
        }
    }

    fn set_raw_bounds(&mut self, start: Option<&str>, stop: Option<&str>) -> Result<(), CycleError> {
        match self.cycle_type {
            CycleType::Time => {
                if let Some(start) = start {
                    self.set_start_time(start)?;
                }
                if let Some(stop) = stop {
                    self.set_stop_time(stop)?;
                }
            }
            CycleType::Temperature => {
                if let Some(start) = start {
                    self.set_start_temperature(parse_temperature(start)?)?;
                }
                if let Some(stop) = stop {
                    self.set_stop_temperature(parse_temperature(stop)?)?;
                }
            }
            CycleType::Humidity => {
                if let Some(start) = start {
                    self.set_start_humidity(parse_humidity(start)?)?;
                }
                if let Some(stop) = stop {
                    self.set_stop_humidity(parse_humidity(stop)?)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn all_days() -> BTreeSet<Weekday> {
    Weekday::ALL.into_iter().collect()
}

fn parse_time(value: &str) -> Result<String, CycleError> {
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 8
        && bytes[2] == b':'
        && bytes[5] == b':'
        && [0, 1, 3, 4, 6, 7].iter().all(|&i| bytes[i].is_ascii_digit());

    if well_formed {
        Ok(value.to_string())
    } else {
        Err(CycleError::InvalidTimeFormat(value.to_string()))
    }
}

fn format_temperature(value: f32) -> Result<String, CycleError> {
    if value.is_finite() {
        Ok(value.to_string())
    } else {
        Err(CycleError::InvalidThreshold(value.to_string()))
    }
}

fn parse_temperature(value: &str) -> Result<f32, CycleError> {
    value
        .trim()
        .parse()
        .map_err(|_| CycleError::InvalidThreshold(value.to_string()))
}

fn format_humidity(value: i64) -> Result<String, CycleError> {
    if (0..=100).contains(&value) {
        Ok(value.to_string())
    } else {
        Err(CycleError::HumidityOutOfRange(value))
    }
}

fn parse_humidity(value: &str) -> Result<i64, CycleError> {
    value
        .trim()
        .parse()
        .map_err(|_| CycleError::InvalidThreshold(value.to_string()))
}

/// Wire shape of a cycle; bounds are validated on the way in.
#[derive(Serialize, Deserialize)]
struct CycleRecord {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    cycle_type: CycleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stop: Option<String>,
    #[serde(default = "all_days")]
    days: BTreeSet<Weekday>,
}

impl TryFrom<CycleRecord> for Cycle {
    type Error = CycleError;

    fn try_from(record: CycleRecord) -> Result<Self, Self::Error> {
        let mut cycle = Cycle::new(record.name, record.cycle_type);
        cycle.set_raw_bounds(record.start.as_deref(), record.stop.as_deref())?;
        cycle.days = record.days;
        Ok(cycle)
    }
}

impl From<Cycle> for CycleRecord {
    fn from(cycle: Cycle) -> Self {
        Self {
            name: cycle.name,
            cycle_type: cycle.cycle_type,
            start: cycle.start,
            stop: cycle.stop,
            days: cycle.days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cycle_covers_every_day() {
        let cycle = Cycle::new("Morning", CycleType::Time);

        assert_eq!(cycle.days().len(), 7);
        assert!(cycle.is_scheduled_on(Weekday::Sunday));
        assert_eq!(cycle.time_bounds(), None);
    }

    #[test]
    fn test_time_setters_validate_format() {
        let mut cycle = Cycle::new("Morning", CycleType::Time);

        cycle.set_start_time("09:00:00").unwrap();
        cycle.set_stop_time("10:00:00").unwrap();
        assert_eq!(cycle.time_bounds(), Some(("09:00:00", "10:00:00")));

        assert_eq!(
            cycle.set_start_time("9:00"),
            Err(CycleError::InvalidTimeFormat("9:00".to_string()))
        );
        assert_eq!(cycle.start(), Some("09:00:00"));
    }

    #[test]
    fn test_type_mismatch_keeps_previous_values() {
        let mut cycle = Cycle::new("Heating", CycleType::Temperature);
        cycle.set_start_temperature(20.0).unwrap();
        cycle.set_stop_temperature(25.0).unwrap();

        let result = cycle.set_start_time("09:00:00");

        assert_eq!(
            result,
            Err(CycleError::TypeMismatch {
                expected: CycleType::Time,
                found: CycleType::Temperature,
            })
        );
        assert_eq!(cycle.temperature_bounds(), Some((20.0, 25.0)));
        assert_eq!(cycle.cycle_type(), CycleType::Temperature);
    }

    #[test]
    fn test_humidity_range_is_enforced() {
        let mut cycle = Cycle::new("Dry", CycleType::Humidity);

        assert_eq!(
            cycle.set_start_humidity(-1),
            Err(CycleError::HumidityOutOfRange(-1))
        );
        assert_eq!(
            cycle.set_stop_humidity(101),
            Err(CycleError::HumidityOutOfRange(101))
        );

        cycle.set_start_humidity(0).unwrap();
        cycle.set_stop_humidity(100).unwrap();
        assert_eq!(cycle.humidity_bounds(), Some((0, 100)));
    }

    #[test]
    fn test_weekday_editing() {
        let mut cycle = Cycle::new("Weekend", CycleType::Time);
        cycle.set_days([Weekday::Saturday]);

        assert!(cycle.add_weekday(Weekday::Sunday));
        assert!(!cycle.add_weekday(Weekday::Sunday));
        assert!(cycle.remove_weekday(Weekday::Saturday));
        assert_eq!(cycle.days().iter().copied().collect::<Vec<_>>(), vec![Weekday::Sunday]);
    }

    #[test]
    fn test_deserialize_defaults_days() {
        let cycle: Cycle = serde_json::from_str(
            r#"{"name":"Lamp","type":"TIME","start":"18:00:00","stop":"23:00:00"}"#,
        )
        .unwrap();

        assert_eq!(cycle.days().len(), 7);
        assert_eq!(cycle.time_bounds(), Some(("18:00:00", "23:00:00")));
    }

    #[test]
    fn test_deserialize_rejects_invalid_bounds() {
        let result = serde_json::from_str::<Cycle>(
            r#"{"name":"Dry","type":"HUMIDITY","start":"30","stop":"120"}"#,
        );
        assert!(result.is_err());

        let result = serde_json::from_str::<Cycle>(
            r#"{"name":"Lamp","type":"TIME","start":"late","stop":"23:00:00"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let mut cycle = Cycle::new("Dry", CycleType::Humidity);
        cycle.set_start_humidity(30).unwrap();
        cycle.set_stop_humidity(60).unwrap();
        cycle.set_days([Weekday::Monday, Weekday::Friday]);

        let value = serde_json::to_value(&cycle).unwrap();

        assert_eq!(value["type"], "HUMIDITY");
        assert_eq!(value["start"], "30");
        assert_eq!(value["stop"], "60");
        assert_eq!(value["days"], serde_json::json!(["MONDAY", "FRIDAY"]));
    }
}
