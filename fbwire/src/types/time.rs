use time::{Date, Month, PrimitiveDateTime, Time};

use crate::value::{DecodeError, Value};

// the wire carries times in units of 100 microseconds
const NANOS_PER_FRACTION: u32 = 100_000;

impl From<Date> for Value {
    fn from(date: Date) -> Self {
        Value::Date {
            year: date.year(),
            month: date.month() as u8,
            day: date.day(),
        }
    }
}

impl From<Time> for Value {
    fn from(time: Time) -> Self {
        Value::Time {
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
            fraction: time.nanosecond() / NANOS_PER_FRACTION,
        }
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(dt: PrimitiveDateTime) -> Self {
        Value::Timestamp {
            year: dt.year(),
            month: dt.month() as u8,
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            fraction: dt.nanosecond() / NANOS_PER_FRACTION,
        }
    }
}

fn date(year: i32, month: u8, day: u8) -> Result<Date, DecodeError> {
    let month = Month::try_from(month).map_err(|_| DecodeError::Mismatch {
        expected: "calendar date",
        found: "date",
    })?;
    Date::from_calendar_date(year, month, day).map_err(|_| DecodeError::Mismatch {
        expected: "calendar date",
        found: "date",
    })
}

fn clock(hour: u8, minute: u8, second: u8, fraction: u32) -> Result<Time, DecodeError> {
    Time::from_hms_nano(hour, minute, second, fraction.saturating_mul(NANOS_PER_FRACTION))
        .map_err(|_| DecodeError::Mismatch { expected: "time of day", found: "time" })
}

impl TryFrom<Value> for Date {
    type Error = DecodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Date { year, month, day } => date(year, month, day),
            Value::Timestamp { year, month, day, .. } => date(year, month, day),
            other => Err(DecodeError::mismatch("date", &other)),
        }
    }
}

impl TryFrom<Value> for Time {
    type Error = DecodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Time { hour, minute, second, fraction } => clock(hour, minute, second, fraction),
            Value::Timestamp { hour, minute, second, fraction, .. } => {
                clock(hour, minute, second, fraction)
            }
            other => Err(DecodeError::mismatch("time", &other)),
        }
    }
}

impl TryFrom<Value> for PrimitiveDateTime {
    type Error = DecodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Timestamp { year, month, day, hour, minute, second, fraction } => Ok(
                PrimitiveDateTime::new(date(year, month, day)?, clock(hour, minute, second, fraction)?),
            ),
            Value::Date { year, month, day } => {
                Ok(PrimitiveDateTime::new(date(year, month, day)?, Time::MIDNIGHT))
            }
            other => Err(DecodeError::mismatch("timestamp", &other)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn date_round_trip() {
        let date = Date::from_calendar_date(2024, Month::February, 29).unwrap();
        let value = Value::from(date);
        assert_eq!(Date::try_from(value).unwrap(), date);
    }

    #[test]
    fn time_keeps_sub_second_precision() {
        let time = Time::from_hms_nano(23, 59, 59, 999_900_000).unwrap();
        let value = Value::from(time);
        assert_eq!(value, Value::Time { hour: 23, minute: 59, second: 59, fraction: 9999 });
        assert_eq!(Time::try_from(value).unwrap(), time);
    }

    #[test]
    fn nanoseconds_truncate_to_wire_precision() {
        let time = Time::from_hms_nano(1, 2, 3, 123_456_789).unwrap();
        match Value::from(time) {
            Value::Time { fraction, .. } => assert_eq!(fraction, 1234),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn timestamp_splits_into_parts() {
        let dt = PrimitiveDateTime::new(
            Date::from_calendar_date(1999, Month::December, 31).unwrap(),
            Time::from_hms(12, 30, 45).unwrap(),
        );
        let value = Value::from(dt);
        assert_eq!(Date::try_from(value.clone()).unwrap(), dt.date());
        assert_eq!(Time::try_from(value.clone()).unwrap(), dt.time());
        assert_eq!(PrimitiveDateTime::try_from(value).unwrap(), dt);
    }

    #[test]
    fn out_of_range_date_rejected() {
        assert!(Date::try_from(Value::Date { year: 2024, month: 13, day: 1 }).is_err());
        assert!(Date::try_from(Value::Integer(7)).is_err());
    }
}
