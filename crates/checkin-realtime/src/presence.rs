//! Client-side presence set.
//!
//! The server sends a full `presence_state` after join and `presence_diff`
//! deltas afterwards. Each key maps to a list of metas; a key is present
//! while it has at least one meta.

use std::collections::BTreeMap;

use serde_json::Value;

const PHX_REF: &str = "phx_ref";

type Entries = BTreeMap<String, Vec<Value>>;

#[derive(Debug, Default, Clone)]
pub struct PresenceState {
    entries: Entries,
    synced: bool,
    pending: Vec<(Entries, Entries)>,
}

impl PresenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set from a `presence_state` payload.
    ///
    /// Diffs that arrived before the first state are applied afterwards.
    pub fn sync_state(&mut self, payload: &Value) {
        self.entries = parse_entries(payload);
        self.synced = true;

        for (joins, leaves) in std::mem::take(&mut self.pending) {
            self.apply_diff(joins, leaves);
        }
    }

    /// Apply a `presence_diff` payload. Returns `false` if the diff was
    /// buffered because no state has been received yet.
    pub fn sync_diff(&mut self, payload: &Value) -> bool {
        let joins = payload.get("joins").map(parse_entries).unwrap_or_default();
        let leaves = payload.get("leaves").map(parse_entries).unwrap_or_default();

        if !self.synced {
            self.pending.push((joins, leaves));
            return false;
        }

        self.apply_diff(joins, leaves);
        true
    }

    fn apply_diff(&mut self, joins: Entries, leaves: Entries) {
        for (key, new_metas) in joins {
            let current = self.entries.entry(key).or_default();
            let joined: Vec<&str> = new_metas.iter().filter_map(phx_ref).collect();
            current.retain(|meta| phx_ref(meta).map_or(true, |r| !joined.contains(&r)));
            current.extend(new_metas);
        }

        for (key, left_metas) in leaves {
            let Some(current) = self.entries.get_mut(&key) else {
                continue;
            };
            let left: Vec<&str> = left_metas.iter().filter_map(phx_ref).collect();
            current.retain(|meta| phx_ref(meta).map_or(true, |r| !left.contains(&r)));
            if current.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// All metas across keys
    pub fn metas(&self) -> Vec<Value> {
        self.entries.values().flatten().cloned().collect()
    }
}

fn phx_ref(meta: &Value) -> Option<&str> {
    meta.get(PHX_REF).and_then(Value::as_str)
}

/// `{ key: { metas: [...] } }` into `key -> metas`
fn parse_entries(value: &Value) -> Entries {
    let Some(object) = value.as_object() else {
        return Entries::new();
    };

    object
        .iter()
        .map(|(key, entry)| {
            let metas = entry
                .get("metas")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            (key.clone(), metas)
        })
        .filter(|(_, metas)| !metas.is_empty())
        .collect()
}
