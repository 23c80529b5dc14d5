//! Genome file envelope
//!
//! Reading checks the magic, follows the sentinel offset to the string
//! table, then hands the bytes between header and sentinel to the body
//! reader. Writing builds the whole file in memory: header with a
//! placeholder offset, body, marker, patched offset, string table.
//!
//! Bare files drop the header: the body is followed directly by the marker
//! and the string table.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::class::G3Class;
use crate::cursor::{Reader, Writer};
use crate::entity::clear_string_table_safe;
use crate::registry::{ClassRegistry, ReadContext, WriteContext};
use crate::string_table::SlotUsage;
use crate::{
    read_file, source_name, write_file, Error, Result, StringTable, GENOME_MAGIC, HEADER_SIZE,
    LRENTDAT_MAGIC, SENTINEL,
};

/// Format-specific content between the envelope header and the sentinel
pub trait GenomeBody: Sized {
    fn read_body(reader: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Self>;

    fn write_body(&self, writer: &mut Writer, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Top-level classes, used to decide whether the string table may be cleared
    fn classes(&self) -> Box<dyn Iterator<Item = &G3Class> + '_>;
}

/// Result of a non-consuming look at the first bytes of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Too short or wrong magic
    NotGenome,
    /// World archive with the `GENOMEDL` marker
    Lrentdat,
    /// Body starts with a class record (layers, contexts, resources)
    OneClass,
    /// Any other Genome file (`.node` archives, templates)
    Genome,
}

pub fn is_genome_file(data: &[u8]) -> bool {
    data.len() >= GENOME_MAGIC.len() && data[..GENOME_MAGIC.len()] == GENOME_MAGIC
}

pub fn probe(data: &[u8]) -> Probe {
    if !is_genome_file(data) {
        return Probe::NotGenome;
    }
    let r = Reader::new("", data);
    if r.peek_at(HEADER_SIZE, LRENTDAT_MAGIC.len()) == Some(&LRENTDAT_MAGIC[..]) {
        return Probe::Lrentdat;
    }
    // accessor version 1, present flag, singleton version 1
    match r.peek_at(HEADER_SIZE, 5) {
        Some([1, 0, 1, 1, 0]) => Probe::OneClass,
        _ => Probe::Genome,
    }
}

/// How the body and string table sit on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `GENOMFLE` header with the sentinel offset
    #[default]
    Enveloped,
    /// Body, marker and string table without a header
    Bare,
}

/// A body together with the envelope version and string table
#[derive(Debug, Clone)]
pub struct GenomeFile<B> {
    pub version: u16,
    body: B,
    strings: StringTable,
    layout: Layout,
    usage: SlotUsage,
}

impl<B: GenomeBody> GenomeFile<B> {
    pub fn new(body: B) -> Self {
        Self {
            version: 1,
            body,
            strings: StringTable::new(),
            layout: Layout::Enveloped,
            usage: SlotUsage::default(),
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    pub fn into_body(self) -> B {
        self.body
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    pub fn open(path: &Path, registry: &ClassRegistry) -> Result<Self> {
        let data = read_file(path)?;
        Self::from_bytes(&source_name(path), &data, registry)
    }

    pub fn from_bytes(source: &str, data: &[u8], registry: &ClassRegistry) -> Result<Self> {
        if !is_genome_file(data) {
            return Err(Error::format(source, "missing GENOMFLE signature"));
        }
        if data.len() < HEADER_SIZE + SENTINEL.len() {
            return Err(Error::format(
                source,
                format!("{} bytes is too small for a Genome file", data.len()),
            ));
        }

        let mut r = Reader::new(source, data);
        r.skip(GENOME_MAGIC.len())?;
        let version = r.read_u16()?;
        let sentinel = r.read_u32()? as usize;

        if sentinel < HEADER_SIZE || r.peek_at(sentinel, SENTINEL.len()) != Some(&SENTINEL[..]) {
            return Err(Error::format(
                source,
                format!("no DEADBEEF marker at sentinel offset {:#x}", sentinel),
            ));
        }

        let mut file = Self::decode(&mut r, HEADER_SIZE, sentinel, registry)?;
        file.version = version;
        Ok(file)
    }

    /// Read a header-less file whose body is `body_len` bytes long
    pub fn from_bare_bytes(source: &str, data: &[u8], body_len: usize, registry: &ClassRegistry) -> Result<Self> {
        let mut r = Reader::new(source, data);
        if r.peek_at(body_len, SENTINEL.len()) != Some(&SENTINEL[..]) {
            return Err(Error::format(
                source,
                format!("no DEADBEEF marker after {} body bytes", body_len),
            ));
        }
        let mut file = Self::decode(&mut r, 0, body_len, registry)?;
        file.layout = Layout::Bare;
        Ok(file)
    }

    /// Body between `start` and the marker at `sentinel`, then the table after it
    fn decode(r: &mut Reader<'_>, start: usize, sentinel: usize, registry: &ClassRegistry) -> Result<Self> {
        let source = r.source_name();
        r.seek(sentinel + SENTINEL.len())?;
        let strings = StringTable::read(r)?;
        if !r.is_empty() {
            debug!(file = source, bytes = r.remaining(), "Ignoring data after string table");
        }

        r.seek(start)?;
        let mut body_reader = r.sub_reader(sentinel - start)?;
        let usage = RefCell::new(SlotUsage::default());
        let ctx = ReadContext::new(registry, &strings).with_usage(&usage);
        let body = B::read_body(&mut body_reader, &ctx)?;
        body_reader.expect_end("file body")?;

        debug!(file = source, strings = strings.len(), "Opened Genome file");
        Ok(Self {
            version: 1,
            body,
            strings,
            layout: Layout::Enveloped,
            usage: usage.into_inner(),
        })
    }

    /// Serialize without touching the in-memory string table
    pub fn to_bytes(&self, registry: &ClassRegistry) -> Result<Vec<u8>> {
        let mut strings = self.strings.clone();
        let mut w = Writer::with_capacity(4096);
        let enveloped = self.layout == Layout::Enveloped;
        if enveloped {
            w.write_bytes(&GENOME_MAGIC);
            w.write_u16(self.version);
            w.write_u32(u32::MAX);
        }

        let mut ctx = WriteContext::new(registry, &mut strings).with_usage(self.usage.clone());
        self.body.write_body(&mut w, &mut ctx)?;

        let sentinel = w.position();
        w.write_bytes(&SENTINEL);
        if enveloped {
            let offset = u32::try_from(sentinel)
                .map_err(|_| Error::Encode(format!("body of {} bytes is too large", sentinel)))?;
            w.patch_u32(GENOME_MAGIC.len() + 2, offset)?;
        }

        strings.write(&mut w)?;
        Ok(w.into_inner())
    }

    pub fn save(&self, path: &Path, registry: &ClassRegistry) -> Result<()> {
        let data = self.to_bytes(registry)?;
        write_file(path, &data)
    }

    /// Clear the string table unless undecoded class bytes may reference it
    pub fn clear_string_table(&mut self, force: bool) -> std::result::Result<(), BTreeSet<String>> {
        clear_string_table_safe(self.body.classes(), &mut self.strings, force)?;
        self.usage = SlotUsage::default();
        Ok(())
    }
}
