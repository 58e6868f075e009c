use switchsync_api::{Cycle, CycleType, Device, Weekday};
use time::PrimitiveDateTime;

use crate::services::providers::EnvironmentReading;

/// Edge a device crossed during one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
    Unchanged,
}

/// Decides whether `device` has to be started or stopped at `now`.
///
/// The first cycle covering the device decides the outcome. A stop is only
/// raised when no cycle covers it, and cycles that cannot be decided (missing
/// reading or bound) neither start nor stop it.
pub fn evaluate(device: &Device, now: PrimitiveDateTime, reading: EnvironmentReading) -> Transition {
    let Some(cycles) = device.cycles.as_deref() else {
        return Transition::Unchanged;
    };

    let today = Weekday::from(now.weekday());
    let time_of_day = format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second());
    let mut outside = false;

    for cycle in cycles.iter().filter(|cycle| cycle.is_scheduled_on(today)) {
        match covers(cycle, &time_of_day, reading) {
            Some(true) if device.is_off() => return Transition::Start,
            Some(true) => return Transition::Unchanged,
            Some(false) => outside = true,
            None => {}
        }
    }

    if outside && device.is_on() {
        Transition::Stop
    } else {
        Transition::Unchanged
    }
}

/// `Some(true)` inside, `Some(false)` outside, `None` undetermined.
fn covers(cycle: &Cycle, time_of_day: &str, reading: EnvironmentReading) -> Option<bool> {
    match cycle.cycle_type() {
        // Fixed-width HH:MM:SS orders lexicographically
        CycleType::Time => {
            let (start, stop) = cycle.time_bounds()?;
            Some(start <= time_of_day && time_of_day < stop)
        }
        CycleType::Temperature => {
            let (start, stop) = cycle.temperature_bounds()?;
            let temperature = reading.temperature?;
            if temperature >= start && temperature < stop {
                Some(true)
            } else if temperature < start || temperature > stop {
                Some(false)
            } else {
                None
            }
        }
        CycleType::Humidity => {
            let (start, stop) = cycle.humidity_bounds()?;
            let humidity = reading.humidity?;
            Some(humidity >= start as f32 && humidity <= stop as f32)
        }
    }
}

#[cfg(test)]
mod tests {
    use switchsync_api::DeviceType;
    use time::macros::datetime;

    use super::*;

    // 2024-06-03 is a Monday
    const MONDAY_0930: PrimitiveDateTime = datetime!(2024-06-03 09:30:00);

    fn time_cycle(start: &str, stop: &str) -> Cycle {
        let mut cycle = Cycle::new("Morning", CycleType::Time);
        cycle.set_start_time(start).unwrap();
        cycle.set_stop_time(stop).unwrap();
        cycle
    }

    fn temperature_cycle(start: f32, stop: f32) -> Cycle {
        let mut cycle = Cycle::new("Heating", CycleType::Temperature);
        cycle.set_start_temperature(start).unwrap();
        cycle.set_stop_temperature(stop).unwrap();
        cycle
    }

    fn humidity_cycle(start: i64, stop: i64) -> Cycle {
        let mut cycle = Cycle::new("Dry", CycleType::Humidity);
        cycle.set_start_humidity(start).unwrap();
        cycle.set_stop_humidity(stop).unwrap();
        cycle
    }

    fn socket(status: i32, cycles: Vec<Cycle>) -> Device {
        Device::new(1, DeviceType::Socket, "Socket")
            .with_status(status)
            .with_cycles(cycles)
    }

    fn no_reading() -> EnvironmentReading {
        EnvironmentReading::default()
    }

    #[test]
    fn test_time_cycle_edges() {
        let cycles = vec![time_cycle("09:00:00", "10:00:00")];

        assert_eq!(evaluate(&socket(0, cycles.clone()), MONDAY_0930, no_reading()), Transition::Start);
        assert_eq!(evaluate(&socket(1, cycles.clone()), MONDAY_0930, no_reading()), Transition::Unchanged);
        assert_eq!(
            evaluate(&socket(1, cycles.clone()), datetime!(2024-06-03 10:30:00), no_reading()),
            Transition::Stop
        );
        assert_eq!(
            evaluate(&socket(0, cycles), datetime!(2024-06-03 10:30:00), no_reading()),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_time_cycle_stop_is_exclusive() {
        let cycles = vec![time_cycle("09:00:00", "10:00:00")];

        assert_eq!(
            evaluate(&socket(0, cycles.clone()), datetime!(2024-06-03 09:00:00), no_reading()),
            Transition::Start
        );
        assert_eq!(
            evaluate(&socket(1, cycles), datetime!(2024-06-03 10:00:00), no_reading()),
            Transition::Stop
        );
    }

    #[test]
    fn test_weekday_filter() {
        let mut cycle = time_cycle("09:00:00", "10:00:00");
        cycle.set_days([Weekday::Tuesday]);

        assert_eq!(evaluate(&socket(0, vec![cycle.clone()]), MONDAY_0930, no_reading()), Transition::Unchanged);
        assert_eq!(
            evaluate(&socket(0, vec![cycle]), datetime!(2024-06-04 09:30:00), no_reading()),
            Transition::Start
        );
    }

    #[test]
    fn test_empty_weekday_set_never_runs() {
        let mut cycle = time_cycle("00:00:00", "23:59:59");
        cycle.set_days(Vec::<Weekday>::new());

        assert_eq!(evaluate(&socket(0, vec![cycle]), MONDAY_0930, no_reading()), Transition::Unchanged);
    }

    #[test]
    fn test_humidity_stop_is_inclusive() {
        let device = socket(0, vec![humidity_cycle(30, 60)]);

        let reading = EnvironmentReading::new(None, Some(60.0));
        assert_eq!(evaluate(&device, MONDAY_0930, reading), Transition::Start);

        let reading = EnvironmentReading::new(None, Some(61.0));
        assert_eq!(evaluate(&socket(1, vec![humidity_cycle(30, 60)]), MONDAY_0930, reading), Transition::Stop);
    }

    #[test]
    fn test_temperature_stop_is_exclusive() {
        let reading = EnvironmentReading::new(Some(25.0), None);

        assert_eq!(
            evaluate(&socket(0, vec![temperature_cycle(20.0, 25.0)]), MONDAY_0930, reading),
            Transition::Unchanged
        );

        let reading = EnvironmentReading::new(Some(20.0), None);
        assert_eq!(
            evaluate(&socket(0, vec![temperature_cycle(20.0, 25.0)]), MONDAY_0930, reading),
            Transition::Start
        );

        let reading = EnvironmentReading::new(Some(19.5), None);
        assert_eq!(
            evaluate(&socket(1, vec![temperature_cycle(20.0, 25.0)]), MONDAY_0930, reading),
            Transition::Stop
        );
    }

    #[test]
    fn test_missing_reading_is_undetermined() {
        let device = socket(1, vec![temperature_cycle(20.0, 25.0), humidity_cycle(30, 60)]);

        assert_eq!(evaluate(&device, MONDAY_0930, no_reading()), Transition::Unchanged);
    }

    #[test]
    fn test_any_covering_cycle_prevents_stop() {
        let device = socket(
            1,
            vec![time_cycle("06:00:00", "07:00:00"), time_cycle("09:00:00", "10:00:00")],
        );

        assert_eq!(evaluate(&device, MONDAY_0930, no_reading()), Transition::Unchanged);
    }

    #[test]
    fn test_device_without_cycles() {
        let device = Device::new(1, DeviceType::Socket, "Socket");

        assert_eq!(evaluate(&device, MONDAY_0930, no_reading()), Transition::Unchanged);
    }
}
