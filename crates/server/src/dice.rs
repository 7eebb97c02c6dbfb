//! Dice formulas typed into campaign chat, e.g. `2d8 + 2d6 + 5` or `d20+3`.
//!
//! A chat message is rolled only when the whole message is a formula. Dice
//! terms are joined with `+`, die sizes are limited to the standard polyhedral
//! set and one trailing signed modifier is allowed.

use rand::Rng;
use regex_lite::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

use tabletop_shared::constants::{DIE_SIZES, MAX_DICE_MODIFIER, MAX_DICE_PER_ROLL};

const DIE_PATTERN: &str = r"d(?:100|4|6|8|10|12|20)";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Not a dice formula")]
    NotAFormula,
    #[error("Too many dice (max {} per roll)", MAX_DICE_PER_ROLL)]
    TooManyDice,
    #[error("Modifier too large (max {} either way)", MAX_DICE_MODIFIER)]
    ModifierTooLarge,
}

/// Parsed formula: number of dice per die size plus a flat modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceFormula {
    pub text: String,
    pub counts: BTreeMap<u32, u32>,
    pub modifier: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DieRoll {
    pub die: u32,
    pub values: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub formula: String,
    pub rolls: Vec<DieRoll>,
    pub modifier: i64,
    pub total: i64,
}

fn formula_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)^\s*\+?\s*(\d*{die}(?:\s*\+\s*\d*{die})*)(?:\s*([+-])\s*(\d+))?\s*$",
            die = DIE_PATTERN
        );
        Regex::new(&pattern).expect("dice formula pattern is valid")
    })
}

fn term_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d*)d(100|4|6|8|10|12|20)").expect("dice term pattern is valid")
    })
}

/// True when the entire input is a dice formula.
pub fn is_dice_formula(input: &str) -> bool {
    formula_regex().is_match(input.trim())
}

pub fn parse(input: &str) -> Result<DiceFormula, DiceError> {
    let text = input.trim();
    let caps = formula_regex().captures(text).ok_or(DiceError::NotAFormula)?;

    let dice_part = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    let mut total_dice: u32 = 0;

    for term in term_regex().captures_iter(dice_part) {
        let count = match term.get(1).map(|m| m.as_str()) {
            Some("") | None => 1,
            Some(digits) => digits.parse::<u32>().map_err(|_| DiceError::TooManyDice)?,
        };
        let die = term[2].parse::<u32>().map_err(|_| DiceError::NotAFormula)?;

        total_dice = total_dice
            .checked_add(count)
            .filter(|n| *n <= MAX_DICE_PER_ROLL)
            .ok_or(DiceError::TooManyDice)?;
        if count > 0 {
            *counts.entry(die).or_default() += count;
        }
    }

    if total_dice == 0 {
        return Err(DiceError::NotAFormula);
    }

    let modifier = match (caps.get(2), caps.get(3)) {
        (Some(sign), Some(value)) => {
            let magnitude = value
                .as_str()
                .parse::<i64>()
                .ok()
                .filter(|m| *m <= MAX_DICE_MODIFIER)
                .ok_or(DiceError::ModifierTooLarge)?;
            if sign.as_str() == "-" {
                -magnitude
            } else {
                magnitude
            }
        }
        _ => 0,
    };

    Ok(DiceFormula {
        text: text.to_string(),
        counts,
        modifier,
    })
}

impl DiceFormula {
    /// Roll every die. d100 results come first, then the smaller dice in size order.
    pub fn roll<R: Rng>(&self, rng: &mut R) -> RollResult {
        let order = std::iter::once(100).chain(DIE_SIZES.iter().copied().filter(|d| *d != 100));

        let mut rolls = Vec::new();
        let mut total = self.modifier;
        for die in order {
            let count = self.counts.get(&die).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            let values: Vec<u32> = (0..count).map(|_| rng.gen_range(1..=die)).collect();
            let sum: i64 = values.iter().map(|v| i64::from(*v)).sum();
            total = total.saturating_add(sum);
            rolls.push(DieRoll { die, values });
        }

        RollResult {
            formula: self.text.clone(),
            rolls,
            modifier: self.modifier,
            total,
        }
    }
}

impl RollResult {
    /// Chat rendering: header line, total, then a per-die breakdown.
    pub fn to_message(&self) -> String {
        let mut breakdown = self
            .rolls
            .iter()
            .map(|r| {
                let values: Vec<String> = r.values.iter().map(|v| v.to_string()).collect();
                format!("d{}: [{}]", r.die, values.join(", "))
            })
            .collect::<Vec<_>>()
            .join(" | ");

        if self.modifier != 0 {
            let sign = if self.modifier > 0 { "+" } else { "" };
            breakdown.push_str(&format!(" | Modifier: {}{}", sign, self.modifier));
        }

        let mut message = format!("🎲 {}\nResult: {}", self.formula, self.total);
        if !breakdown.is_empty() {
            message.push('\n');
            message.push_str(&breakdown);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn recognises_whole_message_formulas_only() {
        assert!(is_dice_formula("d20"));
        assert!(is_dice_formula("2d8 + 2d6 + 5"));
        assert!(is_dice_formula("1D20+3"));
        assert!(is_dice_formula("  d100 - 10 "));
        assert!(!is_dice_formula("I roll d20"));
        assert!(!is_dice_formula("d7"));
        assert!(!is_dice_formula("d1000"));
        assert!(!is_dice_formula("d20 + 3 + 2"));
        assert!(!is_dice_formula("5"));
    }

    #[test]
    fn sums_counts_per_die_size() {
        let formula = parse("2d6 + d20 + 3d6 - 2").unwrap();
        assert_eq!(formula.counts.get(&6), Some(&5));
        assert_eq!(formula.counts.get(&20), Some(&1));
        assert_eq!(formula.modifier, -2);
    }

    #[test]
    fn d100_is_not_read_as_d10() {
        let formula = parse("d100 + d10").unwrap();
        assert_eq!(formula.counts.get(&100), Some(&1));
        assert_eq!(formula.counts.get(&10), Some(&1));
    }

    #[test]
    fn rejects_oversized_rolls() {
        assert_eq!(parse("101d6"), Err(DiceError::TooManyDice));
        assert_eq!(parse("60d6 + 41d8"), Err(DiceError::TooManyDice));
        assert_eq!(parse("99999999999d6"), Err(DiceError::TooManyDice));
        assert!(parse("100d6").is_ok());
    }

    #[test]
    fn rejects_huge_modifiers() {
        assert_eq!(parse("d20+9223372036854775807"), Err(DiceError::ModifierTooLarge));
        assert_eq!(parse("d20 - 99999999999999999999"), Err(DiceError::ModifierTooLarge));
        assert_eq!(parse("d20 + 1001"), Err(DiceError::ModifierTooLarge));
        assert_eq!(parse("d20 - 1000").map(|f| f.modifier), Ok(-1000));
    }

    #[test]
    fn zero_dice_is_not_a_formula() {
        assert_eq!(parse("0d6 + 4"), Err(DiceError::NotAFormula));
    }

    #[test]
    fn rolls_stay_in_range_and_total_adds_up() {
        let mut rng = StdRng::seed_from_u64(7);
        let formula = parse("3d6 + 2d100 + 4").unwrap();
        for _ in 0..50 {
            let result = formula.roll(&mut rng);
            assert_eq!(result.rolls[0].die, 100);
            assert_eq!(result.rolls[1].die, 6);
            assert!(result.rolls[0].values.iter().all(|v| (1..=100).contains(v)));
            assert!(result.rolls[1].values.iter().all(|v| (1..=6).contains(v)));
            let dice_sum: i64 = result
                .rolls
                .iter()
                .flat_map(|r| r.values.iter())
                .map(|v| i64::from(*v))
                .sum();
            assert_eq!(result.total, dice_sum + 4);
        }
    }

    #[test]
    fn message_format() {
        let result = RollResult {
            formula: "2d6 - 1".into(),
            rolls: vec![DieRoll { die: 6, values: vec![3, 5] }],
            modifier: -1,
            total: 7,
        };
        assert_eq!(
            result.to_message(),
            "🎲 2d6 - 1\nResult: 7\nd6: [3, 5] | Modifier: -1"
        );
    }
}
