//! Conversion between wall-clock time and platform identifiers.
//!
//! A snowflake's top 42 bits hold milliseconds since the platform epoch;
//! the low 22 bits hold worker, process and sequence data. A *boundary id*
//! zeroes the low bits so it sorts at or before every real id minted in the
//! same millisecond, which makes it usable as a `before`/`after` cursor.

use chrono::{DateTime, Duration, Utc};

use crate::models::Snowflake;

/// Unix time in milliseconds of the first second of 2015.
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Number of low bits below the timestamp.
pub const TIMESTAMP_SHIFT: u32 = 22;

const MAX_OFFSET_MS: i64 = (1 << (64 - TIMESTAMP_SHIFT)) - 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("{0} predates the platform epoch")]
    BeforeEpoch(DateTime<Utc>),

    #[error("{0} does not fit in a snowflake")]
    Overflow(DateTime<Utc>),

    #[error("{age} before {now} is not a representable time")]
    AgeOutOfRange { now: DateTime<Utc>, age: Duration },

    #[error("snowflake {0} carries an unrepresentable timestamp")]
    Malformed(Snowflake),
}

/// Boundary id for the instant `age` before `now`.
pub fn boundary_before(now: DateTime<Utc>, age: Duration) -> Result<Snowflake, CodecError> {
    let t = now
        .checked_sub_signed(age)
        .ok_or(CodecError::AgeOutOfRange { now, age })?;
    timestamp_to_boundary_id(t)
}

/// Smallest id that could belong to a message created at or after `t`.
///
/// Sub-millisecond precision is truncated.
pub fn timestamp_to_boundary_id(t: DateTime<Utc>) -> Result<Snowflake, CodecError> {
    let offset = t.timestamp_millis() - DISCORD_EPOCH_MS;
    if offset < 0 {
        return Err(CodecError::BeforeEpoch(t));
    }
    if offset > MAX_OFFSET_MS {
        return Err(CodecError::Overflow(t));
    }
    Ok(Snowflake::new((offset as u64) << TIMESTAMP_SHIFT))
}

/// Creation time encoded in an id.
pub fn snowflake_timestamp(id: Snowflake) -> Result<DateTime<Utc>, CodecError> {
    let offset = (id.get() >> TIMESTAMP_SHIFT) as i64;
    DateTime::from_timestamp_millis(DISCORD_EPOCH_MS + offset).ok_or(CodecError::Malformed(id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(DISCORD_EPOCH_MS).unwrap()
    }

    #[test]
    fn test_epoch_is_zero() {
        assert_eq!(timestamp_to_boundary_id(epoch()).unwrap(), Snowflake::new(0));
        assert_eq!(
            timestamp_to_boundary_id(epoch() + Duration::milliseconds(1)).unwrap(),
            Snowflake::new(1 << 22)
        );
    }

    #[test]
    fn test_known_id_timestamp() {
        // Example id from the platform's developer documentation.
        let id = Snowflake::new(175_928_847_299_117_063);
        let ts = snowflake_timestamp(id).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn test_before_epoch_rejected() {
        let t = epoch() - Duration::milliseconds(1);
        assert_eq!(timestamp_to_boundary_id(t), Err(CodecError::BeforeEpoch(t)));
    }

    #[test]
    fn test_boundary_before() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(
            boundary_before(now, Duration::hours(2)),
            timestamp_to_boundary_id(now - Duration::hours(2))
        );
        assert_eq!(
            boundary_before(now, Duration::MAX),
            Err(CodecError::AgeOutOfRange {
                now,
                age: Duration::MAX
            })
        );
    }

    #[test]
    fn test_overflow_rejected() {
        let t = epoch() + Duration::milliseconds(MAX_OFFSET_MS + 1);
        assert_eq!(timestamp_to_boundary_id(t), Err(CodecError::Overflow(t)));
        assert!(timestamp_to_boundary_id(t - Duration::milliseconds(1)).is_ok());
    }

    #[rstest]
    #[case::same_millisecond(0, 1)]
    #[case::one_millisecond(1, 2)]
    #[case::one_day(0, 86_400_000)]
    #[case::years_apart(1_000, 300_000_000_000)]
    fn test_monotonic_with_zero_low_bits(#[case] a_ms: i64, #[case] b_ms: i64) {
        let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let a = timestamp_to_boundary_id(base + Duration::milliseconds(a_ms)).unwrap();
        let b = timestamp_to_boundary_id(base + Duration::milliseconds(b_ms)).unwrap();

        assert!(a < b);
        assert_eq!(a.get() & ((1 << TIMESTAMP_SHIFT) - 1), 0);
        assert_eq!(b.get() & ((1 << TIMESTAMP_SHIFT) - 1), 0);
    }

    #[test]
    fn test_boundary_is_inclusive_from_above() {
        let t = Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap();
        let boundary = timestamp_to_boundary_id(t).unwrap();

        // Any id minted in the boundary millisecond sorts at or above it.
        let same_ms = Snowflake::new(boundary.get() | 0x3F_FFFF);
        assert!(same_ms >= boundary);
        assert_eq!(snowflake_timestamp(same_ms).unwrap(), t);

        // The last id of the previous millisecond sorts below it.
        let previous = Snowflake::new(boundary.get() - 1);
        assert!(previous < boundary);
        assert!(snowflake_timestamp(previous).unwrap() < t);
    }

    #[test]
    fn test_timestamp_recovered_from_boundary() {
        let t = Utc.with_ymd_and_hms(2022, 7, 4, 17, 5, 9).unwrap();
        let id = timestamp_to_boundary_id(t).unwrap();
        assert_eq!(snowflake_timestamp(id).unwrap(), t);
    }
}
