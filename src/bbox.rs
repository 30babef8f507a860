use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::VisionError;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d*\.?\d+").expect("number pattern is valid"));

/// Rectangular region `(x1, y1, x2, y2)` in pixel coordinates.
///
/// `x2`/`y2` are exclusive. Values are not checked against any image here;
/// see [`crate::imaging::Image::crop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoundingBox {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }
}

impl FromStr for BoundingBox {
    type Err = VisionError;

    /// Parse `"(x1, y1, x2, y2)"`. Any separators are accepted; fractional
    /// coordinates are truncated toward zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let numbers = NUMBER
            .find_iter(s)
            .map(|m| {
                m.as_str()
                    .parse::<f64>()
                    .map(|v| v.trunc() as i64)
                    .map_err(|e| VisionError::InvalidBoundingBox(format!("{}: {}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match numbers.as_slice() {
            &[x1, y1, x2, y2] => Ok(Self::new(x1, y1, x2, y2)),
            _ => Err(VisionError::InvalidBoundingBox(format!(
                "expected 4 coordinates in `{}`, found {}",
                s,
                numbers.len()
            ))),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}
