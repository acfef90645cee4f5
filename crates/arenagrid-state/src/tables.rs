//! redb table definitions for the ArenaGrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Reuse queue messages keyed by a zero-padded sequence number (FIFO order).
pub const MESSAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("messages");

/// Game servers keyed by `{group}/{server_id}`.
pub const GAME_SERVERS: TableDefinition<&str, &[u8]> = TableDefinition::new("game_servers");

/// Worker nodes keyed by `{cluster}/{node_id}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Running tasks keyed by `{cluster}/{task_id}`.
pub const TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");

/// Task definitions keyed by their identifier.
pub const TASK_DEFINITIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("task_definitions");

/// Stack outputs keyed by `{stack}/{key}`.
pub const STACK_OUTPUTS: TableDefinition<&str, &[u8]> = TableDefinition::new("stack_outputs");

/// Counters keyed by name.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key of the reuse queue's sequence counter in [`META`].
pub const QUEUE_SEQ: &str = "queue_seq";
