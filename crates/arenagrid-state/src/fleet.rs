//! Game server fleet storage.
//!
//! Game servers register themselves with their connection info, report
//! utilization and health periodically, and deregister when they exit.
//! A claim marks an available server as taken for `claim_timeout`; the
//! server normally reports `Utilized` once players connect, which ends the
//! claim. A claim that is never followed up simply expires.

use redb::ReadableTable;
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::records::{
    GameServer, GameServerUpdate, Utilization, check_key_part, game_server_key,
};
use crate::store::{StateStore, decode, encode, map_err};
use crate::tables::*;

impl StateStore {
    /// Register a new game server. Fails with `Conflict` if the id is taken.
    pub fn register_game_server(
        &self,
        group: &str,
        server_id: &str,
        connection_info: &str,
        now: u64,
    ) -> StateResult<GameServer> {
        check_key_part("group", group)?;
        check_key_part("server id", server_id)?;
        let server = GameServer {
            group: group.to_string(),
            server_id: server_id.to_string(),
            connection_info: connection_info.to_string(),
            utilization: Utilization::Available,
            health: Default::default(),
            claimed_at: None,
            registered_at: now,
            updated_at: now,
        };
        self.insert_new_json(GAME_SERVERS, &server.table_key(), &server)?;
        info!(%group, %server_id, %connection_info, "game server registered");
        Ok(server)
    }

    /// Apply a heartbeat. Reporting `Utilized` ends any outstanding claim.
    pub fn update_game_server(
        &self,
        group: &str,
        server_id: &str,
        update: &GameServerUpdate,
        now: u64,
    ) -> StateResult<GameServer> {
        let key = game_server_key(group, server_id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let server;
        {
            let mut table = txn.open_table(GAME_SERVERS).map_err(map_err!(Table))?;
            let current: Option<GameServer> = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            let mut s = current.ok_or_else(|| StateError::NotFound(key.clone()))?;

            if let Some(utilization) = update.utilization {
                s.utilization = utilization;
                if utilization == Utilization::Utilized {
                    s.claimed_at = None;
                }
            }
            if let Some(health) = update.health {
                s.health = health;
            }
            if let Some(ref info) = update.connection_info {
                s.connection_info = info.clone();
            }
            s.updated_at = now;

            let value = encode(&s)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            server = s;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%group, %server_id, utilization = ?server.utilization, health = ?server.health, "game server updated");
        Ok(server)
    }

    /// Remove a game server. Returns true if it existed.
    pub fn deregister_game_server(&self, group: &str, server_id: &str) -> StateResult<bool> {
        let existed = self.delete_key(GAME_SERVERS, &game_server_key(group, server_id))?;
        if existed {
            info!(%group, %server_id, "game server deregistered");
        }
        Ok(existed)
    }

    pub fn get_game_server(&self, group: &str, server_id: &str) -> StateResult<Option<GameServer>> {
        self.get_json(GAME_SERVERS, &game_server_key(group, server_id))
    }

    /// All servers of a group, in key order.
    pub fn list_game_servers(&self, group: &str) -> StateResult<Vec<GameServer>> {
        self.list_json(GAME_SERVERS, &format!("{group}/"))
    }

    /// Atomically claim the longest-registered claimable server of `group`.
    pub fn claim_game_server(
        &self,
        group: &str,
        now: u64,
        claim_timeout_ms: u64,
    ) -> StateResult<Option<GameServer>> {
        let prefix = format!("{group}/");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let claimed;
        {
            let mut table = txn.open_table(GAME_SERVERS).map_err(map_err!(Table))?;

            let mut best: Option<GameServer> = None;
            for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                if !key.value().starts_with(&prefix) {
                    break;
                }
                let server: GameServer = decode(value.value())?;
                if !server.is_claimable(now, claim_timeout_ms) {
                    continue;
                }
                if best
                    .as_ref()
                    .is_none_or(|b| server.registered_at < b.registered_at)
                {
                    best = Some(server);
                }
            }

            let Some(mut server) = best else {
                return Ok(None);
            };
            server.claimed_at = Some(now);
            server.updated_at = now;

            let value = encode(&server)?;
            table
                .insert(server.table_key().as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            claimed = server;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%group, server_id = %claimed.server_id, "game server claimed");
        Ok(Some(claimed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::GameServerHealth;

    const TIMEOUT: u64 = 60_000;

    #[test]
    fn register_and_list() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_game_server("duel", "gs-1", "10.0.0.5:7777", 0).unwrap();
        store.register_game_server("duel", "gs-2", "10.0.0.6:7777", 1).unwrap();
        store.register_game_server("other", "gs-3", "10.0.0.7:7777", 2).unwrap();

        let duel = store.list_game_servers("duel").unwrap();
        assert_eq!(duel.len(), 2);
        assert!(duel.iter().all(|s| s.utilization == Utilization::Available));
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_game_server("duel", "gs-1", "10.0.0.5:7777", 0).unwrap();
        assert!(matches!(
            store.register_game_server("duel", "gs-1", "10.0.0.5:7777", 1),
            Err(StateError::Conflict(_))
        ));
    }

    #[test]
    fn claim_prefers_oldest_and_is_exclusive() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_game_server("duel", "b", "10.0.0.6:7777", 5).unwrap();
        store.register_game_server("duel", "a", "10.0.0.5:7777", 9).unwrap();

        let first = store.claim_game_server("duel", 100, TIMEOUT).unwrap().unwrap();
        assert_eq!(first.server_id, "b");
        let second = store.claim_game_server("duel", 100, TIMEOUT).unwrap().unwrap();
        assert_eq!(second.server_id, "a");
        assert!(store.claim_game_server("duel", 100, TIMEOUT).unwrap().is_none());
    }

    #[test]
    fn expired_claim_is_claimable_again() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_game_server("duel", "gs-1", "10.0.0.5:7777", 0).unwrap();

        store.claim_game_server("duel", 0, TIMEOUT).unwrap().unwrap();
        assert!(store.claim_game_server("duel", TIMEOUT - 1, TIMEOUT).unwrap().is_none());
        assert!(store.claim_game_server("duel", TIMEOUT, TIMEOUT).unwrap().is_some());
    }

    #[test]
    fn utilized_and_unhealthy_servers_are_skipped() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_game_server("duel", "busy", "10.0.0.5:7777", 0).unwrap();
        store.register_game_server("duel", "sick", "10.0.0.6:7777", 1).unwrap();

        let busy = GameServerUpdate {
            utilization: Some(Utilization::Utilized),
            ..Default::default()
        };
        store.update_game_server("duel", "busy", &busy, 2).unwrap();
        let sick = GameServerUpdate {
            health: Some(GameServerHealth::Unhealthy),
            ..Default::default()
        };
        store.update_game_server("duel", "sick", &sick, 2).unwrap();

        assert!(store.claim_game_server("duel", 3, TIMEOUT).unwrap().is_none());
    }

    #[test]
    fn utilized_report_clears_claim() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_game_server("duel", "gs-1", "10.0.0.5:7777", 0).unwrap();
        store.claim_game_server("duel", 10, TIMEOUT).unwrap().unwrap();

        let update = GameServerUpdate {
            utilization: Some(Utilization::Utilized),
            ..Default::default()
        };
        let server = store.update_game_server("duel", "gs-1", &update, 20).unwrap();
        assert_eq!(server.claimed_at, None);

        // Back to available after the match: claimable immediately.
        let update = GameServerUpdate {
            utilization: Some(Utilization::Available),
            ..Default::default()
        };
        store.update_game_server("duel", "gs-1", &update, 30).unwrap();
        assert!(store.claim_game_server("duel", 31, TIMEOUT).unwrap().is_some());
    }

    #[test]
    fn update_unknown_server_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(matches!(
            store.update_game_server("duel", "ghost", &GameServerUpdate::default(), 0),
            Err(StateError::NotFound(_))
        ));
    }

    #[test]
    fn deregister_removes_server() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_game_server("duel", "gs-1", "10.0.0.5:7777", 0).unwrap();
        assert!(store.deregister_game_server("duel", "gs-1").unwrap());
        assert!(store.get_game_server("duel", "gs-1").unwrap().is_none());
        assert!(store.claim_game_server("duel", 1, TIMEOUT).unwrap().is_none());
    }

    #[test]
    fn separator_in_group_or_id_is_rejected() {
        let store = StateStore::open_in_memory().unwrap();
        for (group, server_id) in [("a/x", "y"), ("a", "x/y"), ("", "gs-1"), ("duel", "")] {
            assert!(
                matches!(
                    store.register_game_server(group, server_id, "10.0.0.5:7777", 0),
                    Err(StateError::InvalidKey(_))
                ),
                "{group:?}/{server_id:?} accepted"
            );
        }
        // "a/x" + "y" would otherwise share a key with "a" + "x/y".
        store.register_game_server("a", "x", "10.0.0.5:7777", 0).unwrap();
        assert_eq!(store.list_game_servers("a").unwrap().len(), 1);
    }
}
