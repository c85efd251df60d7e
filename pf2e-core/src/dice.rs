//! Dice rolling.
//!
//! Damage is configured with standard notation (`1d8+3`, `2d6+1d4`). Every
//! roll in an encounter goes through the encounter's [`Dice`] source, so a
//! seed reproduces a whole fight and tests can script exact faces.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
}

/// Die sizes used by the ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// Most dice a single expression may roll.
pub const MAX_DICE: u32 = 100;
/// Largest flat modifier an expression may carry, either sign.
pub const MAX_MODIFIER: i32 = 10_000;

/// Source of die faces for one encounter.
///
/// `Seeded` is the normal mode. `Scripted` hands out queued faces first and
/// falls back to a fixed-seed generator once the queue is exhausted.
#[derive(Debug, Clone)]
pub enum Dice {
    Seeded(StdRng),
    Scripted {
        faces: VecDeque<u32>,
        fallback: StdRng,
    },
}

impl Dice {
    pub fn seeded(seed: u64) -> Self {
        Dice::Seeded(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Dice::Seeded(StdRng::from_entropy())
    }

    pub fn scripted(faces: impl IntoIterator<Item = u32>) -> Self {
        Dice::Scripted {
            faces: faces.into_iter().collect(),
            fallback: StdRng::seed_from_u64(0),
        }
    }

    /// Queue more faces. Turns a seeded source into a scripted one that keeps
    /// its generator as the fallback.
    pub fn push_faces(&mut self, more: impl IntoIterator<Item = u32>) {
        match self {
            Dice::Scripted { faces, .. } => faces.extend(more),
            Dice::Seeded(rng) => {
                *self = Dice::Scripted {
                    faces: more.into_iter().collect(),
                    fallback: rng.clone(),
                };
            }
        }
    }

    /// Roll one die with `sides` faces (1..=sides).
    ///
    /// Scripted faces are clamped into range so a script written for a d20
    /// can't produce an impossible d6.
    pub fn roll(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        match self {
            Dice::Seeded(rng) => rng.gen_range(1..=sides),
            Dice::Scripted { faces, fallback } => match faces.pop_front() {
                Some(face) => face.clamp(1, sides),
                None => fallback.gen_range(1..=sides),
            },
        }
    }

    pub fn d20(&mut self) -> u32 {
        self.roll(DieType::D20.sides())
    }
}

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
}

/// A complete dice expression (e.g., 1d8+3).
///
/// Serialized as its notation string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub notation: String,
}

impl DiceExpression {
    /// `count` dice of one size plus a flat modifier, clamped to the
    /// ranges [`parse`](Self::parse) accepts.
    pub fn single(count: u32, die_type: DieType, modifier: i32) -> Self {
        let count = count.clamp(1, MAX_DICE);
        let modifier = modifier.clamp(-MAX_MODIFIER, MAX_MODIFIER);
        let notation = match modifier {
            0 => format!("{count}{die_type}"),
            m if m > 0 => format!("{count}{die_type}+{m}"),
            m => format!("{count}{die_type}{m}"),
        };
        Self {
            components: vec![DiceComponent { count, die_type }],
            modifier,
            notation,
        }
    }

    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_term(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_term(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            notation,
        })
    }

    fn parse_term(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let Some(d_pos) = s.find('d') else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier = value
                .checked_mul(sign)
                .and_then(|v| modifier.checked_add(v))
                .filter(|m| m.unsigned_abs() <= MAX_MODIFIER.unsigned_abs())
                .ok_or_else(|| DiceError::InvalidNotation(s.to_string()))?;
            return Ok(());
        };

        if sign < 0 {
            // Subtracting dice has no meaning for damage.
            return Err(DiceError::InvalidNotation(s.to_string()));
        }

        let count_str = &s[..d_pos];
        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
        };
        let sides: u32 = s[d_pos + 1..]
            .parse()
            .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
        let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

        let rolled: u32 = components.iter().map(|c| c.count).sum();
        if count == 0 || rolled.saturating_add(count) > MAX_DICE {
            return Err(DiceError::InvalidNotation(s.to_string()));
        }
        components.push(DiceComponent { count, die_type });
        Ok(())
    }

    /// Roll every die in the expression.
    pub fn roll(&self, dice: &mut Dice) -> RollResult {
        let rolls: Vec<u32> = self
            .components
            .iter()
            .flat_map(|c| std::iter::repeat(c.die_type).take(c.count.min(MAX_DICE) as usize))
            .take(MAX_DICE as usize)
            .map(|die| dice.roll(die.sides()))
            .collect();
        let dice_total = rolls
            .iter()
            .fold(0i32, |acc, r| acc.saturating_add_unsigned(*r));

        RollResult {
            rolls,
            modifier: self.modifier,
            total: dice_total.saturating_add(self.modifier),
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl TryFrom<String> for DiceExpression {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DiceExpression::parse(&value)
    }
}

impl From<DiceExpression> for String {
    fn from(expr: DiceExpression) -> Self {
        expr.notation
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.notation)
    }
}

/// Result of rolling a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub rolls: Vec<u32>,
    pub modifier: i32,
    pub total: i32,
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faces = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match self.modifier {
            0 => write!(f, "[{}] = {}", faces, self.total),
            m if m > 0 => write!(f, "[{}] + {} = {}", faces, m, self.total),
            m => write!(f, "[{}] - {} = {}", faces, m.abs(), self.total),
        }
    }
}
