//! Trainable skills and the randomness source behind every roll.

use rand::Rng;
use rand_distr::StandardNormal;

/// Source of randomness. Injected so tests can script every roll.
pub trait Roller: Send + Sync {
    /// Uniform in 0..=100, in steps of 0.01
    fn percent(&self) -> f32;

    /// Uniform in [0, 1)
    fn unit(&self) -> f32;

    /// Uniform in 0..n. `n` must be non-zero.
    fn below(&self, n: usize) -> usize;

    /// Uniform in lo..=hi
    fn range(&self, lo: u64, hi: u64) -> u64;

    /// A draw from N(0, 1)
    fn standard_normal(&self) -> f64;
}

/// Thread-local RNG backed roller used in production
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomRoller;

impl Roller for RandomRoller {
    fn percent(&self) -> f32 {
        rand::thread_rng().gen_range(0..=10_000) as f32 / 100.0
    }

    fn unit(&self) -> f32 {
        rand::thread_rng().gen::<f32>()
    }

    fn below(&self, n: usize) -> usize {
        rand::thread_rng().gen_range(0..n.max(1))
    }

    fn range(&self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        rand::thread_rng().gen_range(lo..=hi)
    }

    fn standard_normal(&self) -> f64 {
        rand::thread_rng().sample(StandardNormal)
    }
}

/// Gain for one accuracy check at the given skill level
pub fn training_increment(value: f32) -> f32 {
    match value {
        v if v < 20.0 => 1.0,
        v if v < 30.0 => 0.2,
        v if v < 40.0 => 0.08,
        v if v < 50.0 => 0.04,
        v if v < 60.0 => 0.008,
        v if v < 70.0 => 0.004,
        v if v < 80.0 => 0.0008,
        v if v < 90.0 => 0.0004,
        v if v < 100.0 => 0.00008,
        _ => 0.0,
    }
}

/// Rolls against `skill` and trains it. Failures only teach below 35.
pub fn accuracy_check(skill: &mut f32, roller: &dyn Roller) -> bool {
    let success = roller.percent() <= *skill;
    let mut gain = training_increment(*skill);
    if !success {
        gain = if *skill > 35.0 { 0.0 } else { gain / 15.0 };
    }
    *skill += gain;
    success
}

#[cfg(test)]
pub(crate) use scripted::ScriptedRoller;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_at_low_skill_trains_a_fifteenth() {
        let mut acc = 20.0;
        let roller = ScriptedRoller::always(50.0);
        assert!(!accuracy_check(&mut acc, &roller));
        assert!((acc - (20.0 + 0.2 / 15.0)).abs() < 1e-6);
    }

    #[test]
    fn miss_above_35_teaches_nothing() {
        let mut acc = 36.0;
        let roller = ScriptedRoller::always(90.0);
        assert!(!accuracy_check(&mut acc, &roller));
        assert_eq!(acc, 36.0);
    }

    #[test]
    fn hit_trains_full_increment() {
        let mut acc = 45.0;
        let roller = ScriptedRoller::always(45.0);
        assert!(accuracy_check(&mut acc, &roller));
        assert!((acc - 45.04).abs() < 1e-5);
    }

    #[test]
    fn increments_shrink_with_skill() {
        let levels = [10.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0, 85.0, 95.0, 100.0];
        let gains: Vec<f32> = levels.iter().map(|v| training_increment(*v)).collect();
        assert!(gains.windows(2).all(|w| w[0] > w[1] || (w[0] == 0.0 && w[1] == 0.0)));
        assert_eq!(training_increment(100.0), 0.0);
    }

    #[test]
    fn random_roller_stays_in_range() {
        let roller = RandomRoller;
        for _ in 0..200 {
            let p = roller.percent();
            assert!((0.0..=100.0).contains(&p));
            assert!(roller.below(3) < 3);
            let r = roller.range(45, 90);
            assert!((45..=90).contains(&r));
        }
    }
}
