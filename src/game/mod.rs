//! Game simulation modules

pub mod bomb;
pub mod combat;
pub mod command;
pub mod detection;
pub mod economy;
pub mod equipment;
pub mod events;
pub mod fog;
pub mod formulas;
pub mod geometry;
pub mod map;
pub mod movement;
pub mod replay;
pub mod rng;
pub mod room;
pub mod round;
pub mod simulation;
pub mod snapshot;
pub mod soldier;
pub mod utility;

pub use room::{spawn_room, GameRoom, RoomCommand, RoomHandle, RoomRegistry};
pub use round::{MatchEvent, Phase, RoundStateMachine};
pub use simulation::SimulationEngine;
