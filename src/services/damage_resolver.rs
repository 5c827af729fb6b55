//! Single-attack damage calculation.
//!
//! Element advantage is a cycle, FIRE > EARTH > ELECTRIC > WATER > FIRE.
//! The attacker doubles against the element it beats and halves against the
//! element that beats it; every other pairing is neutral.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::{
    constants::{
        BASE_CRIT_CHANCE, CRIT_CHANCE_PER_POWER, CRIT_MULTIPLIER, DAMAGE_VARIANCE_MAX,
        DAMAGE_VARIANCE_MIN, DEFAULT_ATTACKER_POWER, NEUTRAL, NOT_VERY_EFFECTIVE,
        SUPER_EFFECTIVE,
    },
    models::{Beast, ElementType, Move},
};

/// Source of the independent uniform draws an attack needs.
pub trait RandomSource: Send {
    /// Uniform draw in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Uniform draw in `[low, high]`.
    fn next_in_range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_unit()
    }
}

pub struct SystemRandom {
    rng: StdRng,
}

impl SystemRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn next_in_range(&mut self, low: f64, high: f64) -> f64 {
        self.rng.random_range(low..=high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageOutcome {
    pub damage: i32,
    pub is_critical: bool,
    pub type_multiplier: f64,
}

/// The element `element` has the advantage over.
fn beats(element: ElementType) -> ElementType {
    match element {
        ElementType::Fire => ElementType::Earth,
        ElementType::Earth => ElementType::Electric,
        ElementType::Electric => ElementType::Water,
        ElementType::Water => ElementType::Fire,
    }
}

pub fn type_effectiveness(attacking: ElementType, defending: ElementType) -> f64 {
    if beats(attacking) == defending {
        SUPER_EFFECTIVE
    } else if beats(defending) == attacking {
        NOT_VERY_EFFECTIVE
    } else {
        NEUTRAL
    }
}

pub fn attacker_power(attacker: &Beast) -> i32 {
    match attacker.power {
        Some(power) if power > 0 => power,
        _ => DEFAULT_ATTACKER_POWER,
    }
}

pub fn crit_chance(power: i32) -> f64 {
    BASE_CRIT_CHANCE + f64::from(power) * CRIT_CHANCE_PER_POWER
}

/// Draws the crit roll first, then the variance roll.
pub fn resolve(
    attacker: &Beast,
    defender: &Beast,
    mv: &Move,
    rng: &mut dyn RandomSource,
) -> DamageOutcome {
    let power = attacker_power(attacker);
    let base_damage = f64::from(power) * f64::from(mv.damage) / 100.0;
    let type_multiplier = type_effectiveness(mv.element_type, defender.element_type);

    let is_critical = rng.next_unit() < crit_chance(power);
    let crit_multiplier = if is_critical { CRIT_MULTIPLIER } else { 1.0 };

    let variance = rng.next_in_range(DAMAGE_VARIANCE_MIN, DAMAGE_VARIANCE_MAX);

    let raw = (base_damage * type_multiplier * crit_multiplier * variance).floor();
    let damage = if raw.is_finite() && raw > 0.0 {
        raw.min(f64::from(i32::MAX)) as i32
    } else {
        0
    };

    DamageOutcome {
        damage,
        is_critical,
        type_multiplier,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Health;
    use uuid::Uuid;

    /// Replays a fixed crit roll and a fixed variance factor.
    pub(crate) struct FixedRolls {
        pub crit_roll: f64,
        pub variance: f64,
    }

    impl FixedRolls {
        pub(crate) fn no_crit() -> Self {
            Self {
                crit_roll: 0.99,
                variance: 1.0,
            }
        }
    }

    impl RandomSource for FixedRolls {
        fn next_unit(&mut self) -> f64 {
            self.crit_roll
        }

        fn next_in_range(&mut self, _low: f64, _high: f64) -> f64 {
            self.variance
        }
    }

    fn beast(element: ElementType, power: Option<i32>) -> Beast {
        Beast {
            id: Uuid::new_v4(),
            owner_id: "alice".to_string(),
            name: "Test".to_string(),
            element_type: element,
            health: Health { current: 100, max: 100 },
            power,
            stamina: None,
            moves: Vec::new(),
        }
    }

    fn attack(element: ElementType, damage: i32) -> Move {
        Move {
            id: Uuid::new_v4(),
            name: "Strike".to_string(),
            element_type: element,
            damage,
            cooldown: 0,
        }
    }

    #[test]
    fn cyclic_table_holds_in_both_directions() {
        use ElementType::*;
        let cycle = [(Fire, Earth), (Earth, Electric), (Electric, Water), (Water, Fire)];
        for (strong, weak) in cycle {
            assert_eq!(type_effectiveness(strong, weak), 2.0, "{strong} vs {weak}");
            assert_eq!(type_effectiveness(weak, strong), 0.5, "{weak} vs {strong}");
        }
        for element in ElementType::ALL {
            assert_eq!(type_effectiveness(element, element), 1.0);
        }
        assert_eq!(type_effectiveness(Fire, Electric), 1.0);
        assert_eq!(type_effectiveness(Water, Earth), 1.0);
    }

    #[test]
    fn fire_beast_against_earth_scenario() {
        let attacker = beast(ElementType::Fire, Some(80));
        let defender = beast(ElementType::Earth, Some(50));
        let mv = attack(ElementType::Fire, 50);

        let outcome = resolve(&attacker, &defender, &mv, &mut FixedRolls::no_crit());
        assert_eq!(outcome.damage, 80);
        assert!(!outcome.is_critical);
        assert_eq!(outcome.type_multiplier, 2.0);
    }

    #[test]
    fn crit_applies_one_and_a_half() {
        let attacker = beast(ElementType::Water, Some(80));
        let defender = beast(ElementType::Water, None);
        let mv = attack(ElementType::Water, 50);
        let mut rolls = FixedRolls {
            crit_roll: 0.0,
            variance: 1.0,
        };

        let outcome = resolve(&attacker, &defender, &mv, &mut rolls);
        assert!(outcome.is_critical);
        assert_eq!(outcome.damage, 60);
    }

    #[test]
    fn crit_threshold_scales_with_power() {
        assert!((crit_chance(80) - 0.1425).abs() < 1e-12);
        let attacker = beast(ElementType::Fire, Some(80));
        let defender = beast(ElementType::Fire, None);
        let mv = attack(ElementType::Fire, 100);
        let mut just_above = FixedRolls {
            crit_roll: 0.15,
            variance: 1.0,
        };
        assert!(!resolve(&attacker, &defender, &mv, &mut just_above).is_critical);
    }

    #[test]
    fn missing_or_zero_power_defaults_to_fifty() {
        let defender = beast(ElementType::Earth, None);
        let mv = attack(ElementType::Earth, 40);
        for power in [None, Some(0)] {
            let attacker = beast(ElementType::Earth, power);
            let outcome = resolve(&attacker, &defender, &mv, &mut FixedRolls::no_crit());
            assert_eq!(outcome.damage, 20);
        }
    }

    #[test]
    fn variance_floor_is_applied() {
        let attacker = beast(ElementType::Fire, Some(50));
        let defender = beast(ElementType::Water, None);
        let mv = attack(ElementType::Fire, 50);
        let mut low = FixedRolls {
            crit_roll: 0.99,
            variance: 0.85,
        };
        // 25 * 0.5 * 0.85 = 10.625
        assert_eq!(resolve(&attacker, &defender, &mv, &mut low).damage, 10);
    }

    #[test]
    fn damage_is_never_negative() {
        let mut rng = SystemRandom::seeded(7);
        for element in ElementType::ALL {
            for target in ElementType::ALL {
                for base in [0, 1, 10, 120] {
                    for power in [None, Some(-30), Some(1), Some(200)] {
                        let outcome = resolve(
                            &beast(element, power),
                            &beast(target, None),
                            &attack(element, base),
                            &mut rng,
                        );
                        assert!(outcome.damage >= 0);
                    }
                }
            }
        }
    }

    #[test]
    fn system_random_stays_in_range() {
        let mut rng = SystemRandom::seeded(42);
        for _ in 0..1_000 {
            let unit = rng.next_unit();
            assert!((0.0..1.0).contains(&unit));
            let factor = rng.next_in_range(DAMAGE_VARIANCE_MIN, DAMAGE_VARIANCE_MAX);
            assert!((DAMAGE_VARIANCE_MIN..=DAMAGE_VARIANCE_MAX).contains(&factor));
        }
    }
}
