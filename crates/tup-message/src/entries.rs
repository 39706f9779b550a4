//! Parameter and input entries: `(id, value)` pairs addressed to one effect.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CodecError, Result};

/// Most ids a `GetParameters`/`GetInputs` request can carry (255 args minus the effect id).
pub const MAX_IDS: usize = 254;

/// Most pairs a set request or values response can carry (`(255 - 1) / 2`).
pub const MAX_ENTRIES: usize = 127;

/// One device-tunable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entry {
    pub id: u8,
    pub value: i32,
}

impl Entry {
    pub fn new(id: u8, value: i32) -> Self {
        Self { id, value }
    }
}

impl From<(u8, i32)> for Entry {
    fn from((id, value): (u8, i32)) -> Self {
        Self { id, value }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.id, self.value)
    }
}

/// Parses `id=value`, as accepted on the command line.
impl FromStr for Entry {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        let (id, value) = s.split_once('=').ok_or_else(|| {
            CodecError::InvalidArgument(format!("expected id=value, got {s:?}"))
        })?;
        let id = id
            .trim()
            .parse::<u8>()
            .map_err(|e| CodecError::InvalidArgument(format!("invalid id {id:?}: {e}")))?;
        let value = value
            .trim()
            .parse::<i32>()
            .map_err(|e| CodecError::InvalidArgument(format!("invalid value {value:?}: {e}")))?;
        Ok(Self { id, value })
    }
}

/// Values reported by the device for one effect.
///
/// Entries are keyed by id; wire order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectValues {
    pub effect_id: u8,
    pub entries: BTreeMap<u8, i32>,
}

impl EffectValues {
    pub fn new(effect_id: u8) -> Self {
        Self {
            effect_id,
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: u8) -> Option<i32> {
        self.entries.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending id order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Entry> + '_ {
        self.entries.iter().map(|(&id, &value)| Entry { id, value })
    }
}

fn id_from_int(raw: i32) -> Result<u8> {
    u8::try_from(raw)
        .map_err(|_| CodecError::InvalidArgument(format!("id {raw} is outside 0..=255")))
}

/// Convert a flat `[id, value, id, value, ...]` array into entries.
///
/// Odd-length and empty arrays are rejected rather than truncated.
pub fn entries_from_flat(flat: &[i32]) -> Result<Vec<Entry>> {
    if flat.is_empty() {
        return Err(CodecError::InvalidArgument(
            "at least one id/value pair is required".to_string(),
        ));
    }
    if flat.len() % 2 != 0 {
        return Err(CodecError::InvalidArgument(format!(
            "id/value array has odd length {}",
            flat.len()
        )));
    }
    flat.chunks_exact(2)
        .map(|pair| {
            Ok(Entry {
                id: id_from_int(pair[0])?,
                value: pair[1],
            })
        })
        .collect()
}

/// Convert integer ids into wire ids, rejecting values outside `u8`.
pub fn ids_from_ints(ids: &[i32]) -> Result<Vec<u8>> {
    ids.iter().map(|&raw| id_from_int(raw)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_array_pairs_in_order() {
        let entries = entries_from_flat(&[4, -10, 1, 300]).unwrap();
        assert_eq!(entries, vec![Entry::new(4, -10), Entry::new(1, 300)]);
    }

    #[test]
    fn flat_array_odd_length_rejected() {
        assert!(matches!(
            entries_from_flat(&[1, 2, 3]),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn flat_array_empty_rejected() {
        assert!(matches!(
            entries_from_flat(&[]),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn flat_array_id_out_of_range() {
        assert!(matches!(
            entries_from_flat(&[256, 0]),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(matches!(
            ids_from_ints(&[1, -1]),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn entry_from_str() {
        assert_eq!("3=-42".parse::<Entry>().unwrap(), Entry::new(3, -42));
        assert_eq!(" 7 = 9 ".parse::<Entry>().unwrap(), Entry::new(7, 9));
        assert!("3".parse::<Entry>().is_err());
        assert!("x=1".parse::<Entry>().is_err());
        assert!("1=y".parse::<Entry>().is_err());
        assert_eq!(Entry::new(5, 6).to_string(), "5=6");
    }

    #[test]
    fn effect_values_lookup_by_id() {
        let mut values = EffectValues::new(2);
        values.entries.insert(9, 90);
        values.entries.insert(1, 10);

        assert_eq!(values.get(9), Some(90));
        assert_eq!(values.get(3), None);
        let ids: Vec<u8> = values.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 9]);
    }
}
