//! Raw list records, used for share-link lookups.

use anyhow::Result;

use crate::record_store;
use crate::record_store::RecordStore;
use crate::tables::LISTS;

record_store! {
    /// Raw list records keyed by list ID.
    pub struct ListStorage => LISTS
}

impl ListStorage {
    /// Find the list whose JSON `share_token` equals `token`.
    pub fn find_raw_by_share_token(&self, token: &str) -> Result<Option<(String, Vec<u8>)>> {
        if token.is_empty() {
            return Ok(None);
        }

        for (id, data) in self.entries()? {
            let record: serde_json::Value = serde_json::from_slice(&data)?;
            if record.get("share_token").and_then(|v| v.as_str()) == Some(token) {
                return Ok(Some((id, data)));
            }
        }

        Ok(None)
    }
}
