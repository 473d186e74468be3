//! Fee selection: policy floors and bounded-jitter band draws.
//!
//! The encoder draws each frame's fee uniformly from its declared band so
//! repeated uses of a symbol do not produce bit-identical transactions. Policy
//! floors win over the draw: a fee is never pushed below relay minimums, even
//! when that lands it outside the band.

use crate::ast::FeeBand;
use rand::Rng;

/// Labelled fee floors, minor units. The effective floor is the maximum.
#[derive(Debug, Clone, Default)]
pub struct FeePolicy {
    floors: Vec<(String, u64)>,
}

impl FeePolicy {
    pub fn new() -> Self {
        FeePolicy::default()
    }

    pub fn with_floor(mut self, label: impl Into<String>, amount: u64) -> Self {
        self.floors.push((label.into(), amount));
        self
    }

    /// Effective floor: the highest of all declared floors, or zero.
    pub fn floor(&self) -> u64 {
        self.floors.iter().map(|(_, amount)| *amount).max().unwrap_or(0)
    }

    /// Labels of the floors that set the effective value.
    pub fn floors_applied(&self) -> Vec<&str> {
        let floor = self.floor();
        self.floors
            .iter()
            .filter(|(_, amount)| *amount == floor && floor > 0)
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// Draw a fee from `band`: uniform in `[center - tol, center + tol]`,
    /// clamped to the policy floor.
    pub fn draw_from_band<R: Rng>(&self, band: &FeeBand, rng: &mut R) -> FeeSelection {
        let lo = band.center.saturating_sub(band.tolerance);
        let hi = band.center + band.tolerance;
        let drawn = rng.gen_range(lo..=hi);
        let floor = self.floor();
        if drawn < floor {
            FeeSelection {
                fee: floor,
                clamped_by: self.floors_applied().first().map(|s| s.to_string()),
            }
        } else {
            FeeSelection {
                fee: drawn,
                clamped_by: None,
            }
        }
    }
}

/// A drawn fee and, when the policy floor overrode the draw, which floor.
#[derive(Debug, Clone)]
pub struct FeeSelection {
    pub fee: u64,
    pub clamped_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn draw_stays_inside_band() {
        let band = FeeBand {
            center: 21_000_000,
            tolerance: 500_000,
        };
        let policy = FeePolicy::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let selection = policy.draw_from_band(&band, &mut rng);
            assert!(selection.fee >= 20_500_000 && selection.fee <= 21_500_000);
            assert!(selection.clamped_by.is_none());
        }
    }

    #[test]
    fn floor_overrides_draw() {
        let band = FeeBand {
            center: 1_000,
            tolerance: 100,
        };
        let policy = FeePolicy::new()
            .with_floor("relay", 5_000)
            .with_floor("mempool", 2_000);
        let mut rng = StdRng::seed_from_u64(7);
        let selection = policy.draw_from_band(&band, &mut rng);
        assert_eq!(selection.fee, 5_000);
        assert_eq!(selection.clamped_by.as_deref(), Some("relay"));
    }

    #[test]
    fn highest_floor_wins() {
        let policy = FeePolicy::new()
            .with_floor("a", 10)
            .with_floor("b", 30)
            .with_floor("c", 20);
        assert_eq!(policy.floor(), 30);
        assert_eq!(policy.floors_applied(), vec!["b"]);
    }
}
