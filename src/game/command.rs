//! Command validation
//!
//! Client orders arrive loosely shaped. They are checked once here and turned
//! into a [`Command`]; nothing untyped reaches the simulation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::equipment::UtilityKind;
use super::geometry::{Rect, Vec2};
use super::soldier::SQUAD_SIZE;

/// Command as received from the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    pub command_type: String,
    #[serde(default)]
    pub soldier_index: Value,
    #[serde(default)]
    pub target_position: Option<Value>,
    #[serde(default)]
    pub utility_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejection {
    #[error("unknown command type `{0}`")]
    UnknownType(String),

    #[error("soldier index {0} is out of range")]
    SoldierIndexOutOfRange(String),

    #[error("{0} requires a target position")]
    MissingTarget(&'static str),

    #[error("target position is malformed")]
    MalformedTarget,

    #[error("use_utility requires a utility type")]
    MissingUtility,

    #[error("unknown utility type `{0}`")]
    UnknownUtility(String),
}

/// Validated order for one soldier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    Move { target: Vec2 },
    Rush { target: Vec2 },
    Hold { facing: Option<Vec2> },
    Retreat { target: Option<Vec2> },
    UseUtility { utility: UtilityKind, target: Vec2 },
    PlantBomb { target: Option<Vec2> },
    DefuseBomb { target: Option<Vec2> },
    Regroup,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Move { .. } => "move",
            CommandKind::Rush { .. } => "rush",
            CommandKind::Hold { .. } => "hold",
            CommandKind::Retreat { .. } => "retreat",
            CommandKind::UseUtility { .. } => "use_utility",
            CommandKind::PlantBomb { .. } => "plant_bomb",
            CommandKind::DefuseBomb { .. } => "defuse_bomb",
            CommandKind::Regroup => "regroup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub soldier_index: usize,
    pub kind: CommandKind,
    /// Client timestamp, informational only
    pub issued_at: u64,
}

/// Checks raw commands against the map they will run on
#[derive(Debug, Clone, Copy)]
pub struct CommandValidator {
    bounds: Rect,
}

impl CommandValidator {
    pub fn new(bounds: Rect) -> Self {
        Self { bounds }
    }

    pub fn validate(&self, raw: &RawCommand) -> Result<Command, CommandRejection> {
        let command_type = raw.command_type.trim().to_ascii_lowercase();
        let soldier_index = parse_soldier_index(&raw.soldier_index)?;
        let target = match &raw.target_position {
            None | Some(Value::Null) => None,
            Some(v) => Some(self.bounds.clamp_point(parse_position(v)?)),
        };

        let kind = match command_type.as_str() {
            "move" => CommandKind::Move {
                target: target.ok_or(CommandRejection::MissingTarget("move"))?,
            },
            "rush" => CommandKind::Rush {
                target: target.ok_or(CommandRejection::MissingTarget("rush"))?,
            },
            "hold" => CommandKind::Hold { facing: target },
            "retreat" => CommandKind::Retreat { target },
            "use_utility" => {
                let name = raw
                    .utility_type
                    .as_deref()
                    .ok_or(CommandRejection::MissingUtility)?;
                let utility = UtilityKind::parse(name)
                    .ok_or_else(|| CommandRejection::UnknownUtility(name.to_string()))?;
                CommandKind::UseUtility {
                    utility,
                    target: target.ok_or(CommandRejection::MissingTarget("use_utility"))?,
                }
            }
            "plant_bomb" => CommandKind::PlantBomb { target },
            "defuse_bomb" => CommandKind::DefuseBomb { target },
            "regroup" => CommandKind::Regroup,
            _ => return Err(CommandRejection::UnknownType(raw.command_type.clone())),
        };

        Ok(Command {
            soldier_index,
            kind,
            issued_at: raw.timestamp.unwrap_or(0),
        })
    }
}

fn parse_soldier_index(value: &Value) -> Result<usize, CommandRejection> {
    match value.as_u64() {
        Some(i) if (i as usize) < SQUAD_SIZE => Ok(i as usize),
        _ => Err(CommandRejection::SoldierIndexOutOfRange(value.to_string())),
    }
}

fn parse_position(value: &Value) -> Result<Vec2, CommandRejection> {
    let obj = value.as_object().ok_or(CommandRejection::MalformedTarget)?;
    let coord = |key: &str| {
        obj.get(key)
            .and_then(Value::as_f64)
            .map(|v| v as f32)
            .filter(|v| v.is_finite())
            .ok_or(CommandRejection::MalformedTarget)
    };
    Ok(Vec2::new(coord("x")?, coord("z")?))
}
