//! Purpose: Model the host's raw numeric data as it crosses the boundary.
//! Exports: `RawArray`, `RawPair`.
//! Role: Shape validation for host matrices before they become native values.
//! Invariants: `RawArray` data is column-major; `im`, when present, matches `re` in length.
//! Invariants: A real-only value has `im == None`, never a NaN placeholder.
use serde::{Deserialize, Serialize};

use super::error::{Error, ErrorKind};

/// A single numeric pair: real part plus optional imaginary part.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawPair {
    pub re: f64,
    pub im: Option<f64>,
}

impl RawPair {
    pub fn real(re: f64) -> Self {
        Self { re, im: None }
    }

    pub fn complex(re: f64, im: f64) -> Self {
        Self { re, im: Some(im) }
    }
}

/// A host double matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawArray {
    pub dims: Vec<usize>,
    pub re: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub im: Option<Vec<f64>>,
}

impl RawArray {
    pub fn scalar(re: f64, im: Option<f64>) -> Self {
        Self {
            dims: vec![1, 1],
            re: vec![re],
            im: im.map(|im| vec![im]),
        }
    }

    /// Product of `dims`, or `None` when it overflows `usize`.
    pub fn element_count(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Extracts the pair from a 1x1 matrix, rejecting any other shape.
    pub fn single_pair(&self) -> Result<RawPair, Error> {
        if self.dims.len() != 2 {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("input argument must be two dimensional"));
        }
        let Some(count) = self.element_count() else {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message(format!("dims {:?} overflow the element count", self.dims)));
        };
        if self.re.len() != count {
            return Err(Error::new(ErrorKind::InvalidArgument).with_message(format!(
                "real data has {} element(s), dims {:?} need {count}",
                self.re.len(),
                self.dims
            )));
        }
        if let Some(im) = &self.im {
            if im.len() != count {
                return Err(Error::new(ErrorKind::InvalidArgument).with_message(format!(
                    "imaginary data has {} element(s), dims {:?} need {count}",
                    im.len(),
                    self.dims
                )));
            }
        }
        if self.dims != [1, 1] {
            return Err(Error::new(ErrorKind::InvalidArgument).with_message(format!(
                "size [1 1] expected, got {:?}",
                self.dims
            )));
        }
        Ok(RawPair {
            re: self.re[0],
            im: self.im.as_ref().map(|im| im[0]),
        })
    }
}
