//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::command::RawCommand;
use crate::game::equipment::{BuyItem, Loadout};
use crate::game::events::{KillRecord, TickEvent};
use crate::game::fog::FilteredGameState;
use crate::game::round::{Phase, RoundEndReason, Score};
use crate::game::soldier::{PlayerNumber, Side};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the matchmaking queue
    FindMatch,

    /// Skip the current buy, strategy or round-end countdown
    Ready,

    /// Order for one soldier; validated by the room
    Command(RawCommand),

    /// Purchase during the buy phase
    Buy { soldier_index: usize, item: BuyItem },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the queue, or forfeit the current match
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: Uuid, server_time: u64 },

    /// Waiting for an opponent
    Queued { position: usize },

    /// Paired into a room
    MatchFound {
        room_id: Uuid,
        player: PlayerNumber,
        /// Seed of the match random stream
        seed: u64,
    },

    /// Phase countdown, sent on every phase change and once per second
    Phase {
        phase: Phase,
        round: u32,
        time_remaining: u32,
        score: Score,
        money: u32,
    },

    /// Fog-filtered state after a simulation tick
    State {
        tick: u32,
        phase: Phase,
        time_remaining: u32,
        state: FilteredGameState,
        events: Vec<TickEvent>,
        kills: Vec<KillRecord>,
    },

    /// Purchase accepted
    Purchase {
        soldier_index: usize,
        loadout: Loadout,
        money: u32,
    },

    RoundEnd {
        round: u32,
        winner: PlayerNumber,
        winning_side: Side,
        reason: RoundEndReason,
        score: Score,
        kills: Vec<KillRecord>,
        /// Money credited to the receiving player
        reward: u32,
    },

    /// Halftime; `side` is the receiving player's new side
    SideSwap { side: Side },

    MatchEnd {
        winner: PlayerNumber,
        score: Score,
        forfeit: bool,
        replay_digest: String,
    },

    OpponentDisconnected { timeout_secs: u64 },

    OpponentReconnected,

    CommandRejected { reason: String },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::equipment::WeaponKind;
    use serde_json::json;

    #[test]
    fn client_messages_parse() {
        let msg: ClientMsg = serde_json::from_value(json!({"type": "find_match"})).unwrap();
        assert_eq!(msg, ClientMsg::FindMatch);

        let msg: ClientMsg = serde_json::from_value(json!({
            "type": "buy",
            "soldier_index": 2,
            "item": {"weapon": "rifle"}
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMsg::Buy {
                soldier_index: 2,
                item: BuyItem::Weapon(WeaponKind::Rifle)
            }
        );

        let msg: ClientMsg = serde_json::from_value(json!({
            "type": "command",
            "command_type": "move",
            "soldier_index": 1,
            "target_position": {"x": 10.0, "z": 20.0},
            "timestamp": 5
        }))
        .unwrap();
        match msg {
            ClientMsg::Command(raw) => {
                assert_eq!(raw.command_type, "move");
                assert_eq!(raw.timestamp, Some(5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMsg::OpponentDisconnected { timeout_secs: 60 }).unwrap();
        assert_eq!(json, json!({"type": "opponent_disconnected", "timeout_secs": 60}));

        let json = serde_json::to_value(ServerMsg::MatchFound {
            room_id: Uuid::nil(),
            player: PlayerNumber::Two,
            seed: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "match_found");
        assert_eq!(json["player"], "two");
    }
}
