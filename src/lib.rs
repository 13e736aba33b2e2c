//! Squad Tactics Server - authoritative 5v5-soldier bomb defusal simulation
//!
//! Two players each command a squad of five soldiers. The server owns the
//! deterministic tick simulation, the round and economy rules, and the
//! fog-of-war filtered view each player receives over WebSocket.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod util;
pub mod ws;
