use crate::model::TEMP_ID_PREFIX;

/// Tunables for a client [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prefix for client-minted temporary ids.
    pub temp_id_prefix: String,
    /// Optional cap on the number of steps a single transaction may record.
    pub max_transaction_steps: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            temp_id_prefix: TEMP_ID_PREFIX.to_string(),
            max_transaction_steps: None,
        }
    }
}
