use logos::{Lexer, Logos};
use std::{
    fmt,
    ops::{Add, AddAssign, Div, Mul, Sub, SubAssign},
    str::FromStr,
    time,
};
use thiserror::Error;

/// A point in time or a span of time, in ticks.
///
/// One tick is one nanosecond. The value is signed so that differences
/// between two clock readings can be carried without special casing.
/// Timestamps come off the wire unchecked, so the operators saturate at
/// the `i64` bounds instead of overflowing. A division truncates toward
/// zero.
///
/// ```
/// # use pacer_core::Time;
/// let interval = Time::from_micros(500);
/// assert_eq!(interval * 75 / 100, Time::from_nanos(375_000));
/// assert_eq!(interval.to_string(), "500µs");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(i64);

impl Time {
    pub const ZERO: Self = Self(0);

    #[inline(always)]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    #[inline(always)]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros * 1_000)
    }

    #[inline(always)]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 1_000_000)
    }

    #[inline(always)]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1_000_000_000)
    }

    #[inline(always)]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    #[inline(always)]
    pub const fn as_micros(self) -> i64 {
        self.0 / 1_000
    }

    #[inline(always)]
    pub const fn as_millis(self) -> i64 {
        self.0 / 1_000_000
    }

    /// the tick count as a float, used by the regression math
    #[inline(always)]
    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    /// convert into a [`std::time::Duration`]
    ///
    /// Negative values have no `Duration` representation and are
    /// clamped to [`Duration::ZERO`](time::Duration::ZERO).
    pub fn into_duration(self) -> time::Duration {
        u64::try_from(self.0)
            .map(time::Duration::from_nanos)
            .unwrap_or(time::Duration::ZERO)
    }

    /// Weighted average of `old` and `new`:
    /// `(old * old_weight + new * new_weight) / (old_weight + new_weight)`.
    ///
    /// ```
    /// # use pacer_core::Time;
    /// let smoothed = Time::smooth(Time::from_millis(10), Time::from_millis(20), 9, 1);
    /// assert_eq!(smoothed, Time::from_millis(11));
    /// ```
    #[inline]
    pub fn smooth(old: Self, new: Self, old_weight: i64, new_weight: i64) -> Self {
        let weighted = i128::from(old.0) * i128::from(old_weight)
            + i128::from(new.0) * i128::from(new_weight);
        let average = weighted / (i128::from(old_weight) + i128::from(new_weight));
        Self(average.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }

    /// `self - rhs`, `None` if the difference does not fit
    ///
    /// ```
    /// # use pacer_core::Time;
    /// let now = Time::from_millis(10);
    /// assert_eq!(now.checked_sub(Time::from_millis(4)), Some(Time::from_millis(6)));
    /// assert_eq!(now.checked_sub(Time::from_nanos(i64::MIN)), None);
    /// ```
    #[inline]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(ticks) => Some(Self(ticks)),
            None => None,
        }
    }

    /// `self + rhs`, `None` if the sum does not fit
    #[inline]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(ticks) => Some(Self(ticks)),
            None => None,
        }
    }
}

impl From<time::Duration> for Time {
    fn from(value: time::Duration) -> Self {
        Self(i64::try_from(value.as_nanos()).unwrap_or(i64::MAX))
    }
}

impl From<Time> for time::Duration {
    fn from(value: Time) -> Self {
        value.into_duration()
    }
}

impl Add for Time {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Time {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Mul<i64> for Time {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0.saturating_mul(rhs))
    }
}

impl Div<i64> for Time {
    type Output = Self;
    fn div(self, rhs: i64) -> Self::Output {
        Self(self.0.saturating_div(rhs))
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            f.write_str("-")?;
        }
        let magnitude = time::Duration::from_nanos(self.0.unsigned_abs());
        <time::Duration as fmt::Debug>::fmt(&magnitude, f)
    }
}

/// Error returned when parsing a [`Time`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("Failed to parse `{input}': unexpected token")]
    InvalidToken { input: String },
    #[error("Expecting duration to start with a number. Cannot parse `{input}'")]
    ExpectingNumber { input: String },
    #[error("Expecting a measure after the number, failed to parse `{input}'")]
    ExpectingMeasure { input: String },
    #[error("Number out of range in `{input}'")]
    OutOfRange { input: String },
    #[error("Empty duration")]
    Empty,
}

impl FromStr for Time {
    type Err = TimeParseError;

    /// Parses a sum of `<integer><unit>` terms, e.g. `"5ms"`,
    /// `"1s 500ms"` or `"200us"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<Token>::new(s);
        let mut total = Self::ZERO;
        let mut seen = false;

        while let Some(next) = lex.next() {
            let number = next.map_err(|()| TimeParseError::InvalidToken {
                input: s.to_owned(),
            })?;
            if number != Token::Value {
                return Err(TimeParseError::ExpectingNumber {
                    input: s.to_owned(),
                });
            }
            let number: i64 = lex
                .slice()
                .parse()
                .map_err(|_| TimeParseError::OutOfRange {
                    input: s.to_owned(),
                })?;

            let Some(Ok(measure)) = lex.next() else {
                return Err(TimeParseError::ExpectingMeasure {
                    input: s.to_owned(),
                });
            };
            let nanos_per_unit = match measure {
                Token::NanoSeconds => 1,
                Token::MicroSeconds => 1_000,
                Token::MilliSeconds => 1_000_000,
                Token::Seconds => 1_000_000_000,
                Token::Minutes => 60 * 1_000_000_000,
                Token::Value => {
                    return Err(TimeParseError::ExpectingMeasure {
                        input: s.to_owned(),
                    });
                }
            };
            let term = number
                .checked_mul(nanos_per_unit)
                .and_then(|term| term.checked_add(total.0))
                .ok_or_else(|| TimeParseError::OutOfRange {
                    input: s.to_owned(),
                })?;
            total = Self(term);
            seen = true;
        }

        if seen { Ok(total) } else { Err(TimeParseError::Empty) }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|µs|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex("[0-9]+")]
    Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logos_lexer() {
        let mut lex = Token::lexer("5ms");

        assert_eq!(lex.next(), Some(Ok(Token::Value)));
        assert_eq!(lex.slice(), "5");

        assert_eq!(lex.next(), Some(Ok(Token::MilliSeconds)));
        assert_eq!(lex.span(), 1..3);
    }

    #[test]
    fn parse() {
        assert_eq!("5ms".parse::<Time>().unwrap(), Time::from_millis(5));
        assert_eq!("200us".parse::<Time>().unwrap(), Time::from_micros(200));
        assert_eq!(
            "1s 500ms".parse::<Time>().unwrap(),
            Time::from_millis(1_500)
        );
        assert_eq!("10µs".parse::<Time>().unwrap(), Time::from_micros(10));
    }

    #[test]
    fn parse_invalid() {
        assert_eq!("".parse::<Time>(), Err(TimeParseError::Empty));
        assert!(matches!(
            "150".parse::<Time>(),
            Err(TimeParseError::ExpectingMeasure { .. })
        ));
        assert!(matches!(
            "ms".parse::<Time>(),
            Err(TimeParseError::ExpectingNumber { .. })
        ));
        assert!("abc".parse::<Time>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Time::from_micros(500).to_string(), "500µs");
        assert_eq!(Time::from_millis(10).to_string(), "10ms");
        assert_eq!(Time::from_millis(-3).to_string(), "-3ms");
    }

    #[test]
    fn integer_division_truncates() {
        let interval = Time::from_micros(1_000);
        assert_eq!(interval * 100 / 70, Time::from_nanos(1_428_571));
        assert_eq!(Time::from_nanos(-7) / 2, Time::from_nanos(-3));
    }

    #[test]
    fn smooth_weights() {
        let old = Time::from_micros(100);
        let new = Time::from_micros(200);
        assert_eq!(Time::smooth(old, new, 5, 5), Time::from_micros(150));
        assert_eq!(Time::smooth(old, new, 95, 5), Time::from_micros(105));
    }

    #[test]
    fn arithmetic_saturates() {
        let min = Time::from_nanos(i64::MIN);
        let max = Time::from_nanos(i64::MAX);
        assert_eq!(Time::from_millis(10) - min, max);
        assert_eq!(max + Time::from_nanos(1), max);
        assert_eq!(min * 100, min);
        assert_eq!(min / -1, max);

        let mut total = max;
        total += Time::from_secs(1);
        assert_eq!(total, max);
        total -= max;
        total -= max;
        assert_eq!(total, Time::from_nanos(-i64::MAX));
    }

    #[test]
    fn checked_arithmetic() {
        let min = Time::from_nanos(i64::MIN);
        let max = Time::from_nanos(i64::MAX);
        assert_eq!(Time::from_millis(10).checked_sub(min), None);
        assert_eq!(Time::from_nanos(-1).checked_sub(min), Some(max));
        assert_eq!(max.checked_add(Time::from_nanos(1)), None);
        assert_eq!(
            Time::from_millis(1).checked_add(Time::from_micros(500)),
            Some(Time::from_micros(1_500))
        );
    }

    #[test]
    fn smooth_extremes() {
        let max = Time::from_nanos(i64::MAX);
        assert_eq!(Time::smooth(max, max, 9, 1), max);
        let min = Time::from_nanos(i64::MIN);
        assert_eq!(Time::smooth(min, Time::ZERO, 1, 1), Time::from_nanos(i64::MIN / 2));
    }

    #[test]
    fn duration_conversion() {
        let dur = time::Duration::from_millis(42);
        assert_eq!(Time::from(dur), Time::from_millis(42));
        assert_eq!(Time::from_millis(42).into_duration(), dur);
        assert_eq!(Time::from_millis(-1).into_duration(), time::Duration::ZERO);
    }
}
