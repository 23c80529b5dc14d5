//! Class codec registry
//!
//! The registry is built once, then shared by reference with every open and
//! save call. Class names missing from it are carried as opaque spans.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::classes::{self, ClassData};
use crate::cursor::{Reader, Writer};
use crate::string_table::SlotUsage;
use crate::{Result, StringTable};

/// Decodes the class data that follows the data version
pub type DecodeFn = fn(&mut Reader<'_>, &ReadContext<'_>, u16) -> Result<ClassData>;

/// Encodes class data (without the data version)
pub type EncodeFn = fn(&ClassData, &mut Writer, &mut WriteContext<'_>) -> Result<()>;

/// Decoder/encoder pair for one class name
#[derive(Clone, Copy)]
pub struct ClassCodec {
    /// Highest data version this codec understands
    pub max_version: u16,
    pub decode: DecodeFn,
    pub encode: EncodeFn,
}

impl std::fmt::Debug for ClassCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassCodec")
            .field("max_version", &self.max_version)
            .finish_non_exhaustive()
    }
}

impl ClassCodec {
    /// Typed properties, class data kept as raw bytes
    pub fn properties_only() -> Self {
        Self {
            max_version: u16::MAX,
            decode: classes::decode_raw,
            encode: classes::encode_untyped,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    codecs: HashMap<String, ClassCodec>,
}

impl ClassRegistry {
    /// Registry with no codecs: every class is opaque
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        classes::register_builtins(&mut registry);
        registry
    }

    /// Add or replace the codec for `name`
    pub fn register(&mut self, name: impl Into<String>, codec: ClassCodec) -> &mut Self {
        self.codecs.insert(name.into(), codec);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&ClassCodec> {
        self.codecs.get(name)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }
}

/// State shared by decoders while reading one file
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    pub registry: &'a ClassRegistry,
    pub strings: &'a StringTable,
    usage: Option<&'a RefCell<SlotUsage>>,
}

impl<'a> ReadContext<'a> {
    pub fn new(registry: &'a ClassRegistry, strings: &'a StringTable) -> Self {
        Self {
            registry,
            strings,
            usage: None,
        }
    }

    /// Record which slot each repeated string was read from
    pub fn with_usage(self, usage: &'a RefCell<SlotUsage>) -> Self {
        Self {
            usage: Some(usage),
            ..self
        }
    }

    /// Read a `u16` string index and resolve it
    pub fn string(&self, r: &mut Reader<'_>) -> Result<String> {
        let index = r.read_u16()?;
        let s = self.strings.get(index)?;
        if let Some(usage) = self.usage {
            if self.strings.is_repeated(s) {
                usage.borrow_mut().record(s, index);
            }
        }
        Ok(s.to_string())
    }
}

/// State shared by encoders while writing one file
#[derive(Debug)]
pub struct WriteContext<'a> {
    pub registry: &'a ClassRegistry,
    pub strings: &'a mut StringTable,
    usage: SlotUsage,
}

impl<'a> WriteContext<'a> {
    pub fn new(registry: &'a ClassRegistry, strings: &'a mut StringTable) -> Self {
        Self {
            registry,
            strings,
            usage: SlotUsage::default(),
        }
    }

    /// Reuse the slots recorded while reading
    pub fn with_usage(self, usage: SlotUsage) -> Self {
        Self { usage, ..self }
    }

    /// Write the index of `s`, interning it when no recorded slot holds it
    pub fn write_string(&mut self, w: &mut Writer, s: &str) -> Result<()> {
        let index = match self.usage.take(s) {
            Some(index) if self.strings.get(index).is_ok_and(|found| found == s) => index,
            _ => self.strings.add(s)?,
        };
        w.write_u16(index);
        Ok(())
    }
}
