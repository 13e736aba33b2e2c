//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::game::map::{MapData, MapError};
use crate::game::RoomRegistry;
use crate::matchmaking::MatchmakingService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub map: Arc<MapData>,
    pub room_registry: Arc<RoomRegistry>,
    pub matchmaking: Arc<MatchmakingService>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, MapError> {
        let config = Arc::new(config);

        // Load the configured map or fall back to the built-in one
        let map = match &config.map_path {
            Some(path) => {
                info!(path = %path.display(), "Loading map file");
                MapData::load_from_file(path)?
            }
            None => MapData::builtin(),
        };
        info!(map = %map.name, sites = map.bomb_sites.len(), "Map ready");
        let map = Arc::new(map);

        let room_registry = Arc::new(RoomRegistry::new());

        // Arc for sharing across cloned AppState
        let matchmaking = Arc::new(MatchmakingService::new(
            room_registry.clone(),
            map.clone(),
            config.match_config.clone(),
        ));

        Ok(Self {
            config,
            map,
            room_registry,
            matchmaking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_map_when_no_path() {
        let config = Config::from_lookup(|_| None).unwrap();
        let state = AppState::new(config).unwrap();
        assert_eq!(*state.map, MapData::builtin());
        assert_eq!(state.room_registry.active_rooms(), 0);
    }

    #[test]
    fn missing_map_file_is_an_error() {
        let config = Config::from_lookup(|key| match key {
            "MAP_PATH" => Some("/nonexistent/map.json".to_string()),
            _ => None,
        })
        .unwrap();
        assert!(matches!(AppState::new(config), Err(MapError::Io(_))));
    }
}
