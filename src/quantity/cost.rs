use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Swedish krona.
pub type Cost = Quantity<0, 0, 1>;

impl Cost {
    /// Number of decimal places a reported cost is rounded to.
    pub const PRECISION: i32 = 4;

    /// Round the cost to [`Cost::PRECISION`] decimal places, half away from zero.
    pub fn round_to_precision(self) -> Self {
        let scale = 10_f64.powi(Self::PRECISION);
        Self::new((self.get() * scale).round() / scale)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} kr", self.0)
    }
}

impl Debug for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}kr", self.0)
    }
}
