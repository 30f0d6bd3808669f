/*!
 * Duration Input
 *
 * Converts the loosely typed "seconds" argument of the entry points into an
 * optional `Duration`. `Ok(None)` means no duration was given; whether that is
 * an error depends on the entry point.
 */

use crate::errors::ArgumentError;
use serde_json::Value;
use std::time::Duration;

/// Conversion into an optional timeout duration
pub trait IntoSeconds {
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError>;
}

impl IntoSeconds for Duration {
    #[inline]
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        Ok(Some(self))
    }
}

impl IntoSeconds for f64 {
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        Duration::try_from_secs_f64(self)
            .map(Some)
            .map_err(|_| ArgumentError::OutOfRange {
                given: self.to_string(),
            })
    }
}

impl IntoSeconds for f32 {
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        Duration::try_from_secs_f32(self)
            .map(Some)
            .map_err(|_| ArgumentError::OutOfRange {
                given: self.to_string(),
            })
    }
}

impl IntoSeconds for u64 {
    #[inline]
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        Ok(Some(Duration::from_secs(self)))
    }
}

impl IntoSeconds for u32 {
    #[inline]
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        Ok(Some(Duration::from_secs(u64::from(self))))
    }
}

impl IntoSeconds for i64 {
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        u64::try_from(self)
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ArgumentError::OutOfRange {
                given: self.to_string(),
            })
    }
}

impl IntoSeconds for i32 {
    #[inline]
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        i64::from(self).into_seconds()
    }
}

impl<S: IntoSeconds> IntoSeconds for Option<S> {
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        match self {
            Some(seconds) => seconds.into_seconds(),
            None => Ok(None),
        }
    }
}

impl IntoSeconds for &Value {
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        match self {
            Value::Null => Ok(None),
            Value::Number(number) => {
                if let Some(secs) = number.as_u64() {
                    return secs.into_seconds();
                }
                match number.as_f64() {
                    Some(secs) => secs.into_seconds(),
                    None => Err(ArgumentError::NonNumeric {
                        given: number.to_string(),
                    }),
                }
            }
            other => Err(ArgumentError::NonNumeric {
                given: other.to_string(),
            }),
        }
    }
}

impl IntoSeconds for Value {
    #[inline]
    fn into_seconds(self) -> Result<Option<Duration>, ArgumentError> {
        (&self).into_seconds()
    }
}

/// Resolve a duration that must be present
pub(crate) fn required<S: IntoSeconds>(seconds: S) -> Result<Duration, ArgumentError> {
    seconds.into_seconds()?.ok_or(ArgumentError::MissingSeconds)
}
