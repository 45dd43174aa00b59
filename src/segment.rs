//! Binary thresholding of an intensity field.

use crate::frame::{BinaryMask, IntensityField};

/// Mark every pixel whose intensity is at least `threshold`.
pub fn threshold(intensity: &IntensityField, threshold: u8) -> BinaryMask {
    intensity.mapv(|v| v >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn threshold_is_inclusive() {
        let gray = array![[0u8, 199, 200], [201, 255, 10]];
        let mask = threshold(&gray, 200);
        assert_eq!(mask, array![[false, false, true], [true, true, false]]);
    }

    #[test]
    fn zero_threshold_selects_everything() {
        let gray = array![[0u8, 3], [9, 255]];
        assert!(threshold(&gray, 0).iter().all(|&v| v));
    }
}
