//! Grouping of parsed points by series key and timestamp, and promotion of fields into tags.
//!
//! Points that share a key and a timestamp may be arbitrarily far apart in the input, so the
//! whole table is held in memory until it is drained.

use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::{FieldValue, ParsedPoint};

/// Field name to value. A later point overwrites the value of an earlier one.
pub type FieldMap = HashMap<Vec<u8>, FieldValue<'static>>;

/// Ordered list of field names to move from the fields of a point into its tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Promotion {
    names: Vec<Vec<u8>>,
}

impl Promotion {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        Self {
            names: names.into_iter().map(|n| n.as_ref().to_vec()).collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.names.iter().map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Every point seen so far, keyed by canonical key and then by raw timestamp.
#[derive(Debug, Default)]
pub struct AggregationTable {
    series: HashMap<Vec<u8>, HashMap<Vec<u8>, FieldMap>>,
    points: usize,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the fields of `point` into the group for its key and timestamp.
    pub fn insert(&mut self, point: ParsedPoint<'_>) {
        let ParsedPoint {
            key,
            fields,
            timestamp,
        } = point;

        let group = self
            .series
            .entry_ref(key.as_ref())
            .or_default()
            .entry_ref(timestamp)
            .or_default();

        for (name, value) in fields {
            if let Some(previous) = group.insert(name.to_vec(), value.into_owned()) {
                trace!(
                    field = %String::from_utf8_lossy(name),
                    previous = %previous,
                    "field overwritten"
                );
            }
        }
        self.points += 1;
    }

    /// The fields accumulated for one key and timestamp.
    pub fn get(&self, key: &[u8], timestamp: &[u8]) -> Option<&FieldMap> {
        self.series.get(key)?.get(timestamp)
    }

    /// Number of points merged into the table.
    pub fn points(&self) -> usize {
        self.points
    }

    /// Number of distinct (key, timestamp) groups.
    pub fn groups(&self) -> usize {
        self.series.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Consumes the table, yielding every group in no particular order.
    pub fn into_groups(self) -> impl Iterator<Item = AggregationGroup> {
        self.series.into_iter().flat_map(|(key, rows)| {
            rows.into_iter()
                .map(move |(timestamp, fields)| AggregationGroup {
                    key: key.clone(),
                    timestamp,
                    fields,
                })
        })
    }

    /// Consumes the table, yielding the canonical output lines of every group.
    pub fn into_lines(self, promotion: &Promotion) -> impl Iterator<Item = Vec<u8>> {
        self.into_groups()
            .flat_map(move |group| group.into_lines(promotion))
    }
}

/// All points that share one canonical key and timestamp, merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationGroup {
    key: Vec<u8>,
    timestamp: Vec<u8>,
    fields: FieldMap,
}

impl AggregationGroup {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn timestamp(&self) -> &[u8] {
        &self.timestamp
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Turns the group into lines of line protocol, one per field.
    ///
    /// Each promoted field present in the group is removed from the fields and appended to the
    /// key as `,name=value`, in the order of `promotion` and without re-sorting the tags. The
    /// value has its surrounding quotes stripped and nothing else. Every remaining field becomes
    /// its own line sharing the new key and the original timestamp. A group whose fields were all
    /// promoted produces no lines.
    pub fn into_lines(self, promotion: &Promotion) -> impl Iterator<Item = Vec<u8>> + use<> {
        let Self {
            mut key,
            timestamp,
            mut fields,
        } = self;

        for name in promotion.names() {
            if let Some(value) = fields.remove(name) {
                key.push(b',');
                key.extend_from_slice(name);
                key.push(b'=');
                key.extend_from_slice(value.unquoted());
            }
        }

        if fields.is_empty() {
            debug!(
                key = %String::from_utf8_lossy(&key),
                timestamp = %String::from_utf8_lossy(&timestamp),
                "every field promoted, nothing to write"
            );
        }

        fields.into_iter().map(move |(name, value)| {
            let value = value.as_bytes();
            let mut line =
                Vec::with_capacity(key.len() + name.len() + value.len() + timestamp.len() + 3);
            line.extend_from_slice(&key);
            line.push(b' ');
            line.extend_from_slice(&name);
            line.push(b'=');
            line.extend_from_slice(value);
            if !timestamp.is_empty() {
                line.push(b' ');
                line.extend_from_slice(&timestamp);
            }
            line
        })
    }
}
