//! Snapshot building - turns match events into per-player messages
//!
//! Every message built here has already been through the fog filter for the
//! receiving player.

use crate::ws::protocol::ServerMsg;

use super::events::TickResult;
use super::fog::FogFilter;
use super::round::{MatchEvent, RoundStateMachine};
use super::soldier::{PlayerNumber, Side};

pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// State message for one player after a tick
    pub fn state(machine: &RoundStateMachine, player: PlayerNumber, result: &TickResult) -> ServerMsg {
        let visible = FogFilter::visible_enemies(machine.engine(), player);
        ServerMsg::State {
            tick: result.tick,
            phase: machine.phase(),
            time_remaining: machine.time_remaining(),
            state: machine.filtered_state(player),
            events: FogFilter::filter_events(machine.engine(), &result.events, player, &visible),
            kills: result.kills.clone(),
        }
    }

    /// Current countdown for one player
    pub fn phase(machine: &RoundStateMachine, player: PlayerNumber) -> ServerMsg {
        ServerMsg::Phase {
            phase: machine.phase(),
            round: machine.round(),
            time_remaining: machine.time_remaining(),
            score: machine.score(),
            money: machine.money(player),
        }
    }

    /// Messages for one player describing a batch of match events
    pub fn build(
        machine: &RoundStateMachine,
        player: PlayerNumber,
        events: &[MatchEvent],
    ) -> Vec<ServerMsg> {
        let mut out = Vec::with_capacity(events.len());
        let mut phase_changed = false;
        for event in events {
            match event {
                MatchEvent::Tick(result) => out.push(Self::state(machine, player, result)),
                MatchEvent::PhaseChanged { .. } => phase_changed = true,
                MatchEvent::RoundStarted { .. } => {}
                MatchEvent::RoundEnded(summary) => out.push(ServerMsg::RoundEnd {
                    round: summary.round,
                    winner: summary.winner,
                    winning_side: summary.winning_side,
                    reason: summary.reason,
                    score: summary.score,
                    kills: summary.kills.clone(),
                    reward: summary.payouts[player.index()],
                }),
                MatchEvent::SidesSwapped { attacker } => {
                    let side = if *attacker == player {
                        Side::Attacker
                    } else {
                        Side::Defender
                    };
                    out.push(ServerMsg::SideSwap { side });
                }
                MatchEvent::MatchEnded {
                    winner,
                    score,
                    forfeit,
                    replay_digest,
                } => out.push(ServerMsg::MatchEnd {
                    winner: *winner,
                    score: *score,
                    forfeit: *forfeit,
                    replay_digest: replay_digest.clone(),
                }),
            }
        }
        // Intermediate phases collapse into the one the machine settled in
        if phase_changed {
            out.push(Self::phase(machine, player));
        }
        out
    }
}
