//! Policy table: the "multistate bit vector" (MsBV) behind admission.
//!
//! Maps a policy id to the highest security level it is allowed to carry.
//! A missing id means "not authorized". There is no default-allow.
//!
//! Lookups are O(1) either way: when the largest configured id is small the
//! table is a directly indexed slice, otherwise a hash map. The table is
//! immutable after construction and is shared between gates via `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::wire::SensitivityLevel;

/// Opaque identifier referencing a governance rule.
pub type PolicyId = u32;

/// Highest id stored in the dense representation.
const DENSE_LIMIT: PolicyId = 4096;

/// Allowed security level for a policy. Small integer, higher is stricter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityLevel(pub u8);

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum Slots {
    Dense(Box<[Option<SecurityLevel>]>),
    Sparse(HashMap<PolicyId, SecurityLevel>),
}

/// Immutable policy-id → security-level table.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    slots: Slots,
    len: usize,
}

impl PolicyTable {
    /// Build a table. Later entries for the same id replace earlier ones.
    pub fn new(entries: impl IntoIterator<Item = (PolicyId, SecurityLevel)>) -> Self {
        let map: HashMap<PolicyId, SecurityLevel> = entries.into_iter().collect();
        let len = map.len();
        let max_id = map.keys().copied().max();

        let slots = match max_id {
            Some(max) if max <= DENSE_LIMIT => {
                let mut dense = vec![None; max as usize + 1];
                for (id, level) in map {
                    dense[id as usize] = Some(level);
                }
                Slots::Dense(dense.into_boxed_slice())
            }
            None => Slots::Dense(Box::new([])),
            Some(_) => Slots::Sparse(map),
        };

        Self { slots, len }
    }

    /// Allowed level for `id`, or `None` if the policy is not authorized.
    pub fn authorize(&self, id: PolicyId) -> Option<SecurityLevel> {
        match &self.slots {
            Slots::Dense(slots) => slots.get(id as usize).copied().flatten(),
            Slots::Sparse(map) => map.get(&id).copied(),
        }
    }

    pub fn contains(&self, id: PolicyId) -> bool {
        self.authorize(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if lookups index a slice directly.
    pub fn is_dense(&self) -> bool {
        matches!(self.slots, Slots::Dense(_))
    }

    /// All entries in ascending id order.
    pub fn entries(&self) -> Vec<(PolicyId, SecurityLevel)> {
        let mut out: Vec<(PolicyId, SecurityLevel)> = match &self.slots {
            Slots::Dense(slots) => slots
                .iter()
                .enumerate()
                .filter_map(|(id, level)| level.map(|l| (id as PolicyId, l)))
                .collect(),
            Slots::Sparse(map) => map.iter().map(|(id, l)| (*id, *l)).collect(),
        };
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }
}

impl Default for PolicyTable {
    /// 0x01 public, 0x02 restricted, 0x03 confidential, 0x04 top secret.
    fn default() -> Self {
        Self::new([
            (0x01, SecurityLevel(0)),
            (0x02, SecurityLevel(1)),
            (0x03, SecurityLevel(2)),
            (0x04, SecurityLevel(3)),
        ])
    }
}

// ── Node classification ───────────────────────────────────────────────────────

/// Trust tier of a distribution point.
///
/// Only `External` filters anything. Every label other than "external"
/// parses as `Internal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeClassification {
    #[default]
    Internal,
    External,
}

impl NodeClassification {
    /// Lowest sensitivity byte this node refuses to forward, if any.
    pub fn blocked_from(self) -> Option<u8> {
        match self {
            NodeClassification::Internal => None,
            NodeClassification::External => Some(SensitivityLevel::LegalProhibited as u8),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeClassification::Internal => "internal",
            NodeClassification::External => "external",
        }
    }
}

impl FromStr for NodeClassification {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("external") {
            Ok(NodeClassification::External)
        } else {
            Ok(NodeClassification::Internal)
        }
    }
}

// Config files accept the same labels as `DOIP_NODE__HOPS`.
impl<'de> Deserialize<'de> for NodeClassification {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(match label.parse::<NodeClassification>() {
            Ok(classification) => classification,
            Err(never) => match never {},
        })
    }
}

impl fmt::Display for NodeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
