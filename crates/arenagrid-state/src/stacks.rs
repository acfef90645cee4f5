//! Stack outputs: deployment-time values such as the current task
//! definition of the game server stack.

use tracing::info;

use crate::error::StateResult;
use crate::records::{check_key_part, stack_output_key};
use crate::store::StateStore;
use crate::tables::STACK_OUTPUTS;

impl StateStore {
    pub fn put_stack_output(&self, stack: &str, key: &str, value: &str) -> StateResult<()> {
        check_key_part("stack name", stack)?;
        self.put_json(STACK_OUTPUTS, &stack_output_key(stack, key), &value)?;
        info!(%stack, %key, %value, "stack output set");
        Ok(())
    }

    pub fn get_stack_output(&self, stack: &str, key: &str) -> StateResult<Option<String>> {
        self.get_json(STACK_OUTPUTS, &stack_output_key(stack, key))
    }
}
