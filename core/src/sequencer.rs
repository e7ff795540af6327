//! Per-item request stamps.
//!
//! Every remote mutation for an item takes a new stamp. A response is applied
//! only while its stamp is still the newest one for that item, so a slow
//! response cannot overwrite state confirmed by a later request.

use std::collections::HashMap;

use crate::model::ItemId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    item_id: ItemId,
    stamp: u64,
}

impl Ticket {
    pub fn stamp(&self) -> u64 {
        self.stamp
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: HashMap<ItemId, u64>,
}

impl RequestSequencer {
    pub fn issue(&mut self, item_id: &ItemId) -> Ticket {
        let stamp = self.latest.entry(item_id.clone()).or_insert(0);
        *stamp += 1;
        Ticket {
            item_id: item_id.clone(),
            stamp: *stamp,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest.get(&ticket.item_id) == Some(&ticket.stamp)
    }
}
