//! Class records
//!
//! ```text
//! u16 accessor version, u8 present (0 = null, nothing follows)
//! u16 singleton version, u8 persistable, u16 class name
//! u16 factory version, u8 root, u16 class version, u16 object version
//! u32 span length, span
//! ```
//!
//! The span holds a property set, a `u16` data version and the class data.

use serde::Serialize;
use tracing::{debug, warn};

use crate::classes::{self, ClassData};
use crate::cursor::{Reader, Writer};
use crate::property::{ClassProperty, PropertyValue};
use crate::registry::{ReadContext, WriteContext};
use crate::{Guid, Result};

/// Version fields framing a class record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassHeader {
    pub accessor_version: u16,
    pub singleton_version: u16,
    pub persistable: u8,
    pub factory_version: u16,
    pub root: u8,
    pub class_version: u16,
    pub object_version: u16,
}

impl Default for ClassHeader {
    fn default() -> Self {
        Self {
            accessor_version: 1,
            singleton_version: 1,
            persistable: 1,
            factory_version: 1,
            root: 0,
            class_version: 0x53,
            object_version: 0x53,
        }
    }
}

/// Properties at the start of a class span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySet {
    pub version: u16,
    pub properties: Vec<ClassProperty>,
}

impl Default for PropertySet {
    fn default() -> Self {
        Self {
            version: 0x1E,
            properties: Vec::new(),
        }
    }
}

impl PropertySet {
    pub fn get(&self, name: &str) -> Option<&ClassProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClassProperty> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// Replace the value of an existing property, keeping its slot
    pub fn set_value(&mut self, name: &str, value: PropertyValue) -> bool {
        match self.get_mut(name) {
            Some(prop) => {
                prop.value = value;
                true
            }
            None => false,
        }
    }

    /// Append, or replace a property of the same name in place
    pub fn upsert(&mut self, property: ClassProperty) {
        match self.get_mut(&property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    pub fn read(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Self> {
        let version = r.read_u16()?;
        let count = r.read_u32()? as usize;
        let mut properties = Vec::with_capacity(count.min(r.remaining() / 10));
        for _ in 0..count {
            properties.push(ClassProperty::read(r, ctx)?);
        }
        Ok(Self {
            version,
            properties,
        })
    }

    pub fn write(&self, w: &mut Writer, ctx: &mut WriteContext<'_>) -> Result<()> {
        w.write_u16(self.version);
        w.write_u32(self.properties.len() as u32);
        for prop in &self.properties {
            prop.write(w, ctx)?;
        }
        Ok(())
    }
}

/// Class body: parsed, or the complete span kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClassBody {
    Opaque(#[serde(serialize_with = "serialize_len")] Vec<u8>),
    Parsed {
        properties: PropertySet,
        data_version: u16,
        data: ClassData,
    },
}

fn serialize_len<S: serde::Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{} bytes", bytes.len()))
}

/// A class instance (component) attached to an entity or file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct G3Class {
    pub name: String,
    pub header: ClassHeader,
    pub body: ClassBody,
}

impl G3Class {
    pub fn new(name: impl Into<String>, properties: PropertySet, data_version: u16, data: ClassData) -> Self {
        Self {
            name: name.into(),
            header: ClassHeader::default(),
            body: ClassBody::Parsed {
                properties,
                data_version,
                data,
            },
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.body, ClassBody::Opaque(_))
    }

    pub fn properties(&self) -> Option<&PropertySet> {
        match &self.body {
            ClassBody::Parsed { properties, .. } => Some(properties),
            ClassBody::Opaque(_) => None,
        }
    }

    pub fn properties_mut(&mut self) -> Option<&mut PropertySet> {
        match &mut self.body {
            ClassBody::Parsed { properties, .. } => Some(properties),
            ClassBody::Opaque(_) => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&ClassProperty> {
        self.properties()?.get(name)
    }

    pub fn data(&self) -> Option<&ClassData> {
        match &self.body {
            ClassBody::Parsed { data, .. } => Some(data),
            ClassBody::Opaque(_) => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut ClassData> {
        match &mut self.body {
            ClassBody::Parsed { data, .. } => Some(data),
            ClassBody::Opaque(_) => None,
        }
    }

    /// Collect GUIDs referenced by properties and typed data
    pub fn guid_references(&self, out: &mut Vec<Guid>) {
        if let ClassBody::Parsed {
            properties, data, ..
        } = &self.body
        {
            for prop in &properties.properties {
                prop.value.guid_references(out);
            }
            data.guid_references(out);
        }
    }
}

/// Position holding a class record, which may be null
///
/// Null records keep their accessor version so they are written back as read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClassSlot {
    Null { accessor_version: u16 },
    Class(G3Class),
}

impl ClassSlot {
    /// Null record as the engine writes it
    pub fn null() -> Self {
        ClassSlot::Null { accessor_version: 1 }
    }

    pub fn class(&self) -> Option<&G3Class> {
        match self {
            ClassSlot::Class(class) => Some(class),
            ClassSlot::Null { .. } => None,
        }
    }

    pub fn class_mut(&mut self) -> Option<&mut G3Class> {
        match self {
            ClassSlot::Class(class) => Some(class),
            ClassSlot::Null { .. } => None,
        }
    }

    pub fn into_class(self) -> Option<G3Class> {
        match self {
            ClassSlot::Class(class) => Some(class),
            ClassSlot::Null { .. } => None,
        }
    }
}

impl From<G3Class> for ClassSlot {
    fn from(class: G3Class) -> Self {
        ClassSlot::Class(class)
    }
}

/// Class record framing up to and including the span
pub(crate) struct ClassFrame<'a> {
    pub name: String,
    pub header: ClassHeader,
    pub span: Reader<'a>,
}

pub(crate) enum Frame<'a> {
    Null { accessor_version: u16 },
    Class(ClassFrame<'a>),
}

/// Read the frame of a class record
pub(crate) fn read_class_frame<'a>(r: &mut Reader<'a>, ctx: &ReadContext<'_>) -> Result<Frame<'a>> {
    let accessor_version = r.read_u16()?;
    if !r.read_bool()? {
        return Ok(Frame::Null { accessor_version });
    }
    let singleton_version = r.read_u16()?;
    let persistable = r.read_u8()?;
    let name = ctx.string(r)?;
    let factory_version = r.read_u16()?;
    let root = r.read_u8()?;
    let class_version = r.read_u16()?;
    let object_version = r.read_u16()?;
    let span_len = r.read_u32()? as usize;
    let span = r.sub_reader(span_len)?;

    Ok(Frame::Class(ClassFrame {
        name,
        header: ClassHeader {
            accessor_version,
            singleton_version,
            persistable,
            factory_version,
            root,
            class_version,
            object_version,
        },
        span,
    }))
}

/// Write a class frame and return the span length slot for [`Writer::finish_len`]
pub(crate) fn write_class_frame(
    w: &mut Writer,
    name: &str,
    h: &ClassHeader,
    ctx: &mut WriteContext<'_>,
) -> Result<usize> {
    w.write_u16(h.accessor_version);
    w.write_u8(1);
    w.write_u16(h.singleton_version);
    w.write_u8(h.persistable);
    ctx.write_string(w, name)?;
    w.write_u16(h.factory_version);
    w.write_u8(h.root);
    w.write_u16(h.class_version);
    w.write_u16(h.object_version);
    Ok(w.reserve_len())
}

/// Read one class record; `None` for a null record
pub fn read_class(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Option<G3Class>> {
    Ok(read_class_slot(r, ctx)?.into_class())
}

/// Read one class record, keeping null records
pub fn read_class_slot(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<ClassSlot> {
    match read_class_frame(r, ctx)? {
        Frame::Null { accessor_version } => Ok(ClassSlot::Null { accessor_version }),
        Frame::Class(frame) => decode_frame(frame, ctx).map(ClassSlot::Class),
    }
}

fn decode_frame(frame: ClassFrame<'_>, ctx: &ReadContext<'_>) -> Result<G3Class> {
    let ClassFrame {
        name,
        header,
        mut span,
    } = frame;
    let span_len = span.size();

    let Some(codec) = ctx.registry.lookup(&name) else {
        debug!(class = %name, bytes = span_len, "Unknown class, keeping raw span");
        return Ok(G3Class {
            name,
            header,
            body: ClassBody::Opaque(span.read_bytes(span_len)?.to_vec()),
        });
    };

    let raw = span.peek_at(0, span_len).unwrap_or_default().to_vec();
    let properties = PropertySet::read(&mut span, ctx)?;
    let data_version = span.read_u16()?;
    if data_version > codec.max_version {
        warn!(
            class = %name,
            version = data_version,
            max = codec.max_version,
            "Class data version newer than codec, keeping raw span"
        );
        return Ok(G3Class {
            name,
            header,
            body: ClassBody::Opaque(raw),
        });
    }

    let data = (codec.decode)(&mut span, ctx, data_version)?;
    span.expect_end(&format!("class '{}'", name))?;

    Ok(G3Class {
        name,
        header,
        body: ClassBody::Parsed {
            properties,
            data_version,
            data,
        },
    })
}

/// Write one class record, or a null record for an empty slot
pub fn write_class_slot(w: &mut Writer, slot: &ClassSlot, ctx: &mut WriteContext<'_>) -> Result<()> {
    match slot {
        ClassSlot::Null { accessor_version } => {
            w.write_u16(*accessor_version);
            w.write_u8(0);
            Ok(())
        }
        ClassSlot::Class(class) => write_class(w, class, ctx),
    }
}

/// Write one class record
pub fn write_class(w: &mut Writer, class: &G3Class, ctx: &mut WriteContext<'_>) -> Result<()> {
    let slot = write_class_frame(w, &class.name, &class.header, ctx)?;
    match &class.body {
        ClassBody::Opaque(raw) => w.write_bytes(raw),
        ClassBody::Parsed {
            properties,
            data_version,
            data,
        } => {
            properties.write(w, ctx)?;
            w.write_u16(*data_version);
            match ctx.registry.lookup(&class.name) {
                Some(codec) => (codec.encode)(data, w, ctx)?,
                None => classes::encode_untyped(data, w, ctx)?,
            }
        }
    }
    w.finish_len(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use crate::{ClassRegistry, StringTable};

    fn roundtrip(bytes: &[u8], strings: &StringTable, registry: &ClassRegistry) -> (G3Class, Vec<u8>) {
        let ctx = ReadContext::new(registry, strings);
        let mut r = Reader::new("t", bytes);
        let class = read_class(&mut r, &ctx).unwrap().unwrap();
        assert!(r.is_empty());

        let mut out_strings = strings.clone();
        let mut w = Writer::new();
        let mut wctx = WriteContext::new(registry, &mut out_strings);
        write_class(&mut w, &class, &mut wctx).unwrap();
        assert_eq!(&out_strings, strings);
        (class, w.into_inner())
    }

    // gCTemplateLayer record from an empty .lrtpl
    const LAYER: &str = "0100010100010000010000530053001D0000001E0002000000010002001E0000000000030004001E0001000000010100";

    fn layer_strings() -> StringTable {
        StringTable::from_strings([
            "gCTemplateLayer",
            "SectorPtr",
            "bTPOSmartPtr<class gCSector>",
            "IsPersistable",
            "bool",
        ])
        .unwrap()
    }

    #[test]
    fn test_unknown_class_is_opaque() {
        let bytes = hex::decode(LAYER).unwrap();
        let (class, again) = roundtrip(&bytes, &layer_strings(), &ClassRegistry::new());
        assert!(class.is_opaque());
        match &class.body {
            ClassBody::Opaque(raw) => assert_eq!(raw.len(), 0x1D),
            _ => unreachable!(),
        }
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_known_class_is_parsed() {
        let bytes = hex::decode(LAYER).unwrap();
        let (class, again) = roundtrip(&bytes, &layer_strings(), &ClassRegistry::with_builtins());
        assert_eq!(class.name, "gCTemplateLayer");
        assert_eq!(
            class.property("IsPersistable").map(|p| &p.value),
            Some(&PropertyValue::Bool(true))
        );
        assert_eq!(class.data(), Some(&ClassData::Empty));
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_newer_version_falls_back_to_opaque() {
        let mut bytes = hex::decode(LAYER).unwrap();
        // Bump the data version past anything the layer codec accepts
        let n = bytes.len();
        bytes[n - 2] = 0xFF;
        bytes[n - 1] = 0x7F;
        let (class, again) = roundtrip(&bytes, &layer_strings(), &ClassRegistry::with_builtins());
        assert!(class.is_opaque());
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_null_record() {
        let registry = ClassRegistry::new();
        let strings = StringTable::new();
        let ctx = ReadContext::new(&registry, &strings);
        let mut r = Reader::new("t", &[1, 0, 0]);
        assert!(read_class(&mut r, &ctx).unwrap().is_none());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_null_record_keeps_accessor_version() {
        let registry = ClassRegistry::new();
        let mut strings = StringTable::new();
        let ctx = ReadContext::new(&registry, &strings);
        let slot = read_class_slot(&mut Reader::new("t", &[3, 0, 0]), &ctx).unwrap();
        assert_eq!(slot, ClassSlot::Null { accessor_version: 3 });
        assert!(slot.class().is_none());

        let mut w = Writer::new();
        write_class_slot(&mut w, &slot, &mut WriteContext::new(&registry, &mut strings)).unwrap();
        assert_eq!(w.as_slice(), &[3, 0, 0]);
    }

    #[test]
    fn test_span_overrun_is_error() {
        let mut bytes = hex::decode(LAYER).unwrap();
        bytes[15] = 0x40; // span length larger than the record
        let registry = ClassRegistry::new();
        let strings = layer_strings();
        let ctx = ReadContext::new(&registry, &strings);
        assert!(read_class(&mut Reader::new("t", &bytes), &ctx).is_err());
    }

    #[test]
    fn test_new_class_writes_fresh_strings() {
        let mut props = PropertySet::default();
        props.upsert(ClassProperty::new(
            "ContextBox",
            "bCBox",
            PropertyValue::Box(BoundingBox::default()),
        ));
        let class = G3Class::new("eCEntityTemplateContext", props, 0x38, ClassData::Empty);

        let registry = ClassRegistry::with_builtins();
        let mut strings = StringTable::new();
        let mut w = Writer::new();
        write_class(&mut w, &class, &mut WriteContext::new(&registry, &mut strings)).unwrap();
        assert_eq!(strings.len(), 3);

        let bytes = w.into_inner();
        let back = read_class(&mut Reader::new("t", &bytes), &ReadContext::new(&registry, &strings))
            .unwrap()
            .unwrap();
        assert_eq!(back, class);
    }
}
