use rand_core::Rng;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Loss model of the simulated link.
///
/// ```
/// use pacer_core::sim::PacketLoss;
///
/// let lossy: PacketLoss = "5%".parse().unwrap();
/// assert_eq!(lossy, PacketLoss::rate(0.05).unwrap());
/// assert_eq!(lossy.to_string(), "5%");
///
/// let periodic: PacketLoss = "1/10".parse().unwrap();
/// assert_eq!(periodic, PacketLoss::every(10).unwrap());
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub enum PacketLoss {
    /// every datagram goes through
    #[default]
    None,
    /// each datagram is dropped independently with the given probability
    Rate(LossRate),
    /// every `n`th datagram offered to the link is dropped
    Every(u32),
}

/// A probability in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossRate(f64);

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PacketLossError {
    #[error("Loss rate must be in [0.0, 1.0], got {0}")]
    Rate(f64),
    #[error("Loss period must be at least 1, got {0}")]
    Period(u32),
    #[error("Expecting a percentage (`5%') or a period (`1/10')")]
    Syntax,
}

impl LossRate {
    pub fn new(rate: f64) -> Result<Self, PacketLossError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(PacketLossError::Rate(rate));
        }
        Ok(Self(rate))
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PacketLoss {
    pub fn rate(rate: f64) -> Result<Self, PacketLossError> {
        LossRate::new(rate).map(Self::Rate)
    }

    pub fn every(period: u32) -> Result<Self, PacketLossError> {
        if period == 0 {
            return Err(PacketLossError::Period(period));
        }
        Ok(Self::Every(period))
    }

    /// Decide the fate of the `offered`th datagram (counting from 1).
    ///
    /// Randomness only comes from `rng` so a run is reproducible from the
    /// seed of the generator.
    pub fn should_drop<R: Rng>(&self, offered: u64, rng: &mut R) -> bool {
        match self {
            Self::None => false,
            Self::Rate(rate) => {
                let sample = (rng.next_u64() as f64) * (1.0 / (u64::MAX as f64 + 1.0));
                sample < rate.0
            }
            Self::Every(period) => offered % u64::from(*period) == 0,
        }
    }
}

impl fmt::Display for LossRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = self.0 * 100.0;
        if percent.fract() == 0.0 {
            write!(f, "{}%", percent as u64)
        } else {
            write!(f, "{percent:.2}%")
        }
    }
}

impl fmt::Display for PacketLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("0%"),
            Self::Rate(rate) => rate.fmt(f),
            Self::Every(period) => write!(f, "1/{period}"),
        }
    }
}

impl FromStr for PacketLoss {
    type Err = PacketLossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(percent) = s.strip_suffix('%') {
            let percent: f64 = percent.trim().parse().map_err(|_| PacketLossError::Syntax)?;
            if percent == 0.0 {
                return Ok(Self::None);
            }
            return Self::rate(percent / 100.0);
        }
        if let Some(period) = s.strip_prefix("1/") {
            let period: u32 = period.trim().parse().map_err(|_| PacketLossError::Syntax)?;
            return Self::every(period);
        }
        Err(PacketLossError::Syntax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaChaRng;
    use rand_core::SeedableRng as _;

    fn drops(loss: PacketLoss, seed: u64, count: u64) -> Vec<u64> {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        (1..=count)
            .filter(|offered| loss.should_drop(*offered, &mut rng))
            .collect()
    }

    #[test]
    fn none_never_drops() {
        assert!(drops(PacketLoss::None, 42, 1_000).is_empty());
        assert!(drops(PacketLoss::rate(0.0).unwrap(), 42, 1_000).is_empty());
    }

    #[test]
    fn full_rate_always_drops() {
        assert_eq!(drops(PacketLoss::rate(1.0).unwrap(), 42, 1_000).len(), 1_000);
    }

    #[test]
    fn rate_approximately() {
        let dropped = drops(PacketLoss::rate(0.1).unwrap(), 42, 10_000).len();
        assert!(dropped > 800 && dropped < 1_200, "dropped {dropped}/10000");
    }

    #[test]
    fn reproducible_from_seed() {
        let loss = PacketLoss::rate(0.3).unwrap();
        assert_eq!(drops(loss, 7, 200), drops(loss, 7, 200));
    }

    #[test]
    fn periodic() {
        assert_eq!(drops(PacketLoss::every(4).unwrap(), 0, 12), vec![4, 8, 12]);
        assert_eq!(drops(PacketLoss::every(1).unwrap(), 0, 3), vec![1, 2, 3]);
    }

    #[test]
    fn validation() {
        assert_eq!(PacketLoss::rate(1.5), Err(PacketLossError::Rate(1.5)));
        assert!(PacketLoss::rate(f64::NAN).is_err());
        assert_eq!(PacketLoss::every(0), Err(PacketLossError::Period(0)));
        assert_eq!(
            PacketLoss::rate(-0.5).unwrap_err().to_string(),
            "Loss rate must be in [0.0, 1.0], got -0.5"
        );
    }

    #[test]
    fn display_and_parse() {
        assert_eq!(PacketLoss::rate(0.123).unwrap().to_string(), "12.30%");
        assert_eq!(PacketLoss::every(20).unwrap().to_string(), "1/20");
        assert_eq!("0%".parse::<PacketLoss>(), Ok(PacketLoss::None));
        assert_eq!("100%".parse::<PacketLoss>(), PacketLoss::rate(1.0));
        assert_eq!(" 1/3 ".parse::<PacketLoss>(), PacketLoss::every(3));
        assert_eq!("5".parse::<PacketLoss>(), Err(PacketLossError::Syntax));
        assert_eq!("1/x".parse::<PacketLoss>(), Err(PacketLossError::Syntax));
        assert_eq!("150%".parse::<PacketLoss>(), Err(PacketLossError::Rate(1.5)));
    }
}
