//! String table stored after the sentinel of every Genome file

use std::collections::{HashMap, HashSet, VecDeque};

use crate::cursor::{Reader, Writer};
use crate::{Error, Result};

/// Positional pool of strings referenced by `u16` index
///
/// Slots never move: [`StringTable::add`] returns the slot a string already
/// occupies, otherwise it appends. Only [`StringTable::clear`] invalidates
/// indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    present: bool,
    entries: Vec<String>,
    lookup: HashMap<String, u16>,
    /// Strings stored in more than one slot
    repeated: HashSet<String>,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            present: true,
            entries: Vec::new(),
            lookup: HashMap::new(),
            repeated: HashSet::new(),
        }
    }

    pub fn from_strings<I, S>(strings: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for s in strings {
            table.push(s.into())?;
        }
        Ok(table)
    }

    pub fn get(&self, index: u16) -> Result<&str> {
        self.entries
            .get(index as usize)
            .map(String::as_str)
            .ok_or(Error::OutOfRange {
                index: index as usize,
                len: self.entries.len(),
            })
    }

    pub fn find(&self, s: &str) -> Option<u16> {
        self.lookup.get(s).copied()
    }

    /// Index of `s`, appending it if it is not present yet
    pub fn add(&mut self, s: &str) -> Result<u16> {
        match self.find(s) {
            Some(index) => Ok(index),
            None => self.push(s.to_string()),
        }
    }

    fn push(&mut self, s: String) -> Result<u16> {
        let index = u16::try_from(self.entries.len())
            .map_err(|_| Error::Encode("string table is full (65536 entries)".to_string()))?;
        if self.lookup.contains_key(&s) {
            self.repeated.insert(s.clone());
        } else {
            self.lookup.insert(s.clone(), index);
        }
        self.entries.push(s);
        Ok(index)
    }

    /// Drop every entry; indices handed out before are no longer valid
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lookup.clear();
        self.repeated.clear();
    }

    /// Whether `s` occupies more than one slot
    pub fn is_repeated(&self, s: &str) -> bool {
        self.repeated.contains(s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u16, s.as_str()))
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let present = reader.read_bool()?;
        let mut table = Self {
            present,
            ..Self::new()
        };
        if !present {
            return Ok(table);
        }

        let count = reader.read_u32()? as usize;
        if count > u16::MAX as usize + 1 {
            return Err(reader.decode_error(format!("string table count {} too large", count)));
        }
        table.entries.reserve(count);
        for _ in 0..count {
            let s = reader.read_str()?;
            table.push(s)?;
        }
        Ok(table)
    }

    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        if !self.present && self.entries.is_empty() {
            writer.write_u8(0);
            return Ok(());
        }
        writer.write_u8(1);
        writer.write_u32(self.entries.len() as u32);
        for s in &self.entries {
            writer.write_str(s)?;
        }
        Ok(())
    }
}

/// Slots referenced while reading, for strings the table holds more than once
///
/// Writing hands the slots back in the order they were read, so a reference
/// to a repeated entry keeps pointing at the slot the file used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotUsage {
    slots: HashMap<String, VecDeque<u16>>,
}

impl SlotUsage {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn record(&mut self, s: &str, index: u16) {
        self.slots.entry(s.to_string()).or_default().push_back(index);
    }

    pub(crate) fn take(&mut self, s: &str) -> Option<u16> {
        self.slots.get_mut(s)?.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_existing_slot() {
        let mut table = StringTable::new();
        assert_eq!(table.add("Root").unwrap(), 0);
        assert_eq!(table.add("bCGuid").unwrap(), 1);
        assert_eq!(table.add("Root").unwrap(), 0);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).unwrap(), "bCGuid");
    }

    #[test]
    fn test_get_out_of_range() {
        let table = StringTable::from_strings(["a", "b"]).unwrap();
        let err = table.get(2).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn test_index_stable_until_clear() {
        let mut table = StringTable::new();
        let idx = table.add("ContextBox").unwrap();
        for name in ["x", "y", "z"] {
            table.add(name).unwrap();
        }
        assert_eq!(table.get(idx).unwrap(), "ContextBox");

        table.clear();
        assert!(table.is_empty());
        assert!(table.get(idx).is_err());
        assert_eq!(table.add("z").unwrap(), 0);
    }

    #[test]
    fn test_wire_layout() {
        let table = StringTable::from_strings(["ID", "bCBox"]).unwrap();
        let mut w = Writer::new();
        table.write(&mut w).unwrap();
        assert_eq!(
            hex::encode_upper(w.as_slice()),
            "01020000000200494405006243426F78"
        );

        let bytes = w.into_inner();
        let mut r = Reader::new("t", &bytes);
        assert_eq!(StringTable::read(&mut r).unwrap(), table);
        assert!(r.is_empty());
    }

    #[test]
    fn test_absent_table_written_back_absent() {
        let mut r = Reader::new("t", &[0]);
        let table = StringTable::read(&mut r).unwrap();
        assert!(table.is_empty());

        let mut w = Writer::new();
        table.write(&mut w).unwrap();
        assert_eq!(w.as_slice(), &[0]);
    }

    #[test]
    fn test_duplicate_entries_resolve_to_first() {
        let table = StringTable::from_strings(["", "a", ""]).unwrap();
        assert_eq!(table.find(""), Some(0));
        assert_eq!(table.get(2).unwrap(), "");
        assert!(table.is_repeated(""));
        assert!(!table.is_repeated("a"));
    }

    #[test]
    fn test_slot_usage_replays_in_order() {
        let mut usage = SlotUsage::default();
        usage.record("Torch", 3);
        usage.record("Torch", 2);
        assert_eq!(usage.take("Torch"), Some(3));
        assert_eq!(usage.take("Torch"), Some(2));
        assert_eq!(usage.take("Torch"), None);
        assert_eq!(usage.take("Lamp"), None);
    }
}
