//! Reuse queue storage.
//!
//! Messages are kept in FIFO order under a zero-padded sequence key. A
//! receive hides the oldest visible message for the visibility timeout and
//! stamps it with a fresh receipt handle; only the holder of the latest
//! receipt can delete it.

use redb::ReadableTable;
use tracing::debug;

use arenagrid_core::QueueMessage;

use crate::error::{StateError, StateResult};
use crate::records::{StoredMessage, message_key};
use crate::store::{StateStore, decode, encode, map_err};
use crate::tables::*;

impl StateStore {
    /// Append a message to the queue.
    pub fn enqueue_message(&self, body: &str, now: u64) -> StateResult<StoredMessage> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let message;
        {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let seq = meta
                .get(QUEUE_SEQ)
                .map_err(map_err!(Read))?
                .map(|g| g.value())
                .unwrap_or(0)
                + 1;
            meta.insert(QUEUE_SEQ, seq).map_err(map_err!(Write))?;

            message = StoredMessage {
                seq,
                message_id: uuid::Uuid::new_v4().to_string(),
                body: body.to_string(),
                sent_at: now,
                visible_at: now,
                receive_count: 0,
                receipt_handle: None,
            };
            let value = encode(&message)?;
            let mut table = txn.open_table(MESSAGES).map_err(map_err!(Table))?;
            table
                .insert(message.table_key().as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(message_id = %message.message_id, seq = message.seq, "message enqueued");
        Ok(message)
    }

    /// Receive the oldest visible message, hiding it until
    /// `now + visibility_timeout_ms`.
    pub fn receive_message(
        &self,
        now: u64,
        visibility_timeout_ms: u64,
    ) -> StateResult<Option<QueueMessage>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let delivered;
        {
            let mut table = txn.open_table(MESSAGES).map_err(map_err!(Table))?;

            let mut found: Option<StoredMessage> = None;
            for entry in table.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let msg: StoredMessage = decode(value.value())?;
                if msg.is_visible(now) {
                    found = Some(msg);
                    break;
                }
            }

            let Some(mut msg) = found else {
                return Ok(None);
            };

            msg.receive_count += 1;
            msg.visible_at = now.saturating_add(visibility_timeout_ms);
            msg.receipt_handle = Some(format!("{}.{}", msg.table_key(), uuid::Uuid::new_v4()));

            let value = encode(&msg)?;
            table
                .insert(msg.table_key().as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            delivered = msg.delivery();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        if let Some(ref m) = delivered {
            debug!(message_id = %m.message_id, receive_count = m.receive_count, "message received");
        }
        Ok(delivered)
    }

    /// Delete the message a receipt handle refers to. Returns false (and
    /// leaves the queue untouched) when the message is gone or the receipt
    /// was superseded by a later receive.
    pub fn delete_message(&self, receipt_handle: &str) -> StateResult<bool> {
        let Some((key, _)) = receipt_handle.split_once('.') else {
            return Ok(false);
        };

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let deleted;
        {
            let mut table = txn.open_table(MESSAGES).map_err(map_err!(Table))?;
            let current: Option<StoredMessage> = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            deleted = match current {
                Some(msg) if msg.receipt_handle.as_deref() == Some(receipt_handle) => {
                    table.remove(key).map_err(map_err!(Write))?;
                    true
                }
                _ => false,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%receipt_handle, deleted, "message delete");
        Ok(deleted)
    }

    /// All messages, visible or not, in FIFO order.
    pub fn list_messages(&self) -> StateResult<Vec<StoredMessage>> {
        self.list_json(MESSAGES, "")
    }

    /// Number of messages in the queue, visible or not.
    pub fn queue_depth(&self) -> StateResult<u64> {
        Ok(self.list_messages()?.len() as u64)
    }

    /// Look up a message by sequence number.
    pub fn get_message(&self, seq: u64) -> StateResult<StoredMessage> {
        let key = message_key(seq);
        self.get_json(MESSAGES, &key)?
            .ok_or(StateError::NotFound(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIS: u64 = 15_000;

    #[test]
    fn fifo_order() {
        let store = StateStore::open_in_memory().unwrap();
        store.enqueue_message("a:1", 0).unwrap();
        store.enqueue_message("b:2", 1).unwrap();

        let first = store.receive_message(10, VIS).unwrap().unwrap();
        let second = store.receive_message(10, VIS).unwrap().unwrap();
        assert_eq!(first.body, "a:1");
        assert_eq!(second.body, "b:2");
        assert!(store.receive_message(10, VIS).unwrap().is_none());
    }

    #[test]
    fn received_message_is_invisible_until_timeout() {
        let store = StateStore::open_in_memory().unwrap();
        store.enqueue_message("10.0.0.5:7777", 0).unwrap();

        let first = store.receive_message(1_000, VIS).unwrap().unwrap();
        assert_eq!(first.receive_count, 1);
        assert!(store.receive_message(1_000 + VIS - 1, VIS).unwrap().is_none());

        let again = store.receive_message(1_000 + VIS, VIS).unwrap().unwrap();
        assert_eq!(again.message_id, first.message_id);
        assert_eq!(again.receive_count, 2);
        assert_ne!(again.receipt_handle, first.receipt_handle);
    }

    #[test]
    fn delete_then_receive_is_empty() {
        let store = StateStore::open_in_memory().unwrap();
        store.enqueue_message("10.0.0.5:7777", 0).unwrap();

        let msg = store.receive_message(0, VIS).unwrap().unwrap();
        assert!(store.delete_message(&msg.receipt_handle).unwrap());

        // Even long after the visibility timeout nothing comes back.
        assert!(store.receive_message(10 * VIS, VIS).unwrap().is_none());
        assert_eq!(store.queue_depth().unwrap(), 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        store.enqueue_message("10.0.0.5:7777", 0).unwrap();
        let msg = store.receive_message(0, VIS).unwrap().unwrap();

        assert!(store.delete_message(&msg.receipt_handle).unwrap());
        assert!(!store.delete_message(&msg.receipt_handle).unwrap());
        assert!(!store.delete_message("garbage").unwrap());
    }

    #[test]
    fn superseded_receipt_cannot_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.enqueue_message("10.0.0.5:7777", 0).unwrap();

        let stale = store.receive_message(0, VIS).unwrap().unwrap();
        let fresh = store.receive_message(VIS, VIS).unwrap().unwrap();

        assert!(!store.delete_message(&stale.receipt_handle).unwrap());
        assert_eq!(store.queue_depth().unwrap(), 1);
        assert!(store.delete_message(&fresh.receipt_handle).unwrap());
    }

    #[test]
    fn invisible_head_does_not_block_later_messages() {
        let store = StateStore::open_in_memory().unwrap();
        store.enqueue_message("a:1", 0).unwrap();
        store.enqueue_message("b:2", 0).unwrap();

        let head = store.receive_message(0, VIS).unwrap().unwrap();
        assert_eq!(head.body, "a:1");
        let next = store.receive_message(1, VIS).unwrap().unwrap();
        assert_eq!(next.body, "b:2");
    }

    #[test]
    fn get_message_by_seq() {
        let store = StateStore::open_in_memory().unwrap();
        let sent = store.enqueue_message("a:1", 5).unwrap();
        assert_eq!(store.get_message(sent.seq).unwrap(), sent);
        assert!(matches!(store.get_message(99), Err(StateError::NotFound(_))));
    }
}
