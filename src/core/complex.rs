//! Purpose: The complex-number value type whose lifetime the registry manages.
//! Exports: `Complex`.
//! Role: Pure compute; knows nothing about handles or the host.
//! Invariants: Zero imaginary part exports as a real-only pair.
use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use super::handle::TypeTag;
use super::raw::RawPair;
use super::registry::Managed;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub fn from_raw_pair(pair: RawPair) -> Self {
        Self {
            re: pair.re,
            im: pair.im.unwrap_or(0.0),
        }
    }

    pub fn to_raw_pair(&self) -> RawPair {
        if self.im == 0.0 {
            RawPair::real(self.re)
        } else {
            RawPair::complex(self.re, self.im)
        }
    }

    pub fn display_string(&self) -> String {
        self.to_string()
    }
}

/// `%f` rendering of one part: six decimals, `inf`/`nan` spelled in lowercase.
struct Part(f64);

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_nan() {
            f.write_str("nan")
        } else {
            write!(f, "{:.6}", self.0)
        }
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im == 0.0 {
            write!(f, "{}", Part(self.re))
        } else {
            write!(f, "{} + {}i", Part(self.re), Part(self.im))
        }
    }
}

impl Add for Complex {
    type Output = Complex;

    fn add(self, other: Complex) -> Complex {
        Complex::new(self.re + other.re, self.im + other.im)
    }
}

impl AddAssign for Complex {
    fn add_assign(&mut self, other: Complex) {
        self.re += other.re;
        self.im += other.im;
    }
}

impl Managed for Complex {
    const TYPE_TAG: TypeTag = 0x0C01;
    const TYPE_NAME: &'static str = "Complex";
}
