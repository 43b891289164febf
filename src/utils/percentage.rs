use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Percentage {
    pub const ZERO: Percentage = Percentage(0.);

    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value.is_nan() || value < 0. {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl FromStr for Percentage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches("%");
        let v = s.parse::<f64>()?;
        Percentage::new_opt(v).ok_or_else(|| anyhow!("Can't parse {s} into percentage"))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `value` in `whole`. An empty whole yields zero instead of NaN.
pub fn seconds_percentage(value: u64, whole: u64) -> Percentage {
    if whole == 0 {
        return Percentage::ZERO;
    }
    Percentage(value as f64 / whole as f64 * 100.)
}
