//! Typed class properties
//!
//! Every property is framed as `(u16 name, u16 type, u16 version, u32 size)`
//! followed by `size` bytes. The type is a string table entry holding the
//! engine's type name; [`PropertyType::parse`] turns it into a decoder.
//! Types we do not understand keep their bytes verbatim.

use serde::Serialize;

use crate::class::{read_class_slot, write_class_slot, ClassSlot};
use crate::cursor::{Reader, Writer};
use crate::registry::{ReadContext, WriteContext};
use crate::types::{
    BoundingBox, EntityProxy, EulerAngles, FixedBinary, FloatColor, GuidValue, Matrix, Matrix3,
    Quaternion, Range1, Sphere, Vector2, Vector3, Vector4,
};
use crate::{Error, Guid, Result};

/// Decoder selected from a property's type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Int64,
    Float,
    /// String table reference
    String,
    Vector2,
    Vector3,
    Vector4,
    Quaternion,
    Matrix,
    Matrix3,
    Box,
    Sphere,
    Range1,
    EulerAngles,
    FloatColor,
    Guid,
    EntityProxy,
    /// `bTPropertyContainer<enum X>`, carries the enum type name
    Enum(String),
    /// `bTObjArray<T>` / `bTValArray<T>`
    Array(Box<PropertyType>),
    /// `bTRefPtrArray<...>`: nested class records
    ClassArray,
    /// `bTPOSmartPtr<...>`: an empty span or one nested class record
    SmartPtr,
    Unknown,
}

fn strip_qualifier(name: &str) -> &str {
    let name = name.trim();
    ["class ", "struct ", "enum "]
        .iter()
        .find_map(|p| name.strip_prefix(p))
        .map(str::trim)
        .unwrap_or(name)
}

fn generic_arg<'a>(name: &'a str, outer: &str) -> Option<&'a str> {
    name.strip_prefix(outer)?
        .trim_start()
        .strip_prefix('<')?
        .trim_end()
        .strip_suffix('>')
        .map(str::trim)
}

impl PropertyType {
    pub fn parse(type_name: &str) -> Self {
        let name = strip_qualifier(type_name);

        if let Some(inner) = generic_arg(name, "bTPropertyContainer") {
            return PropertyType::Enum(strip_qualifier(inner).to_string());
        }
        if let Some(inner) =
            generic_arg(name, "bTObjArray").or_else(|| generic_arg(name, "bTValArray"))
        {
            return match PropertyType::parse(inner) {
                PropertyType::Unknown
                | PropertyType::ClassArray
                | PropertyType::SmartPtr
                | PropertyType::Array(_) => PropertyType::Unknown,
                element => PropertyType::Array(Box::new(element)),
            };
        }
        if generic_arg(name, "bTRefPtrArray").is_some() {
            return PropertyType::ClassArray;
        }
        if generic_arg(name, "bTPOSmartPtr").is_some() {
            return PropertyType::SmartPtr;
        }

        match name {
            "bool" => PropertyType::Bool,
            "char" => PropertyType::Char,
            "unsigned char" => PropertyType::UChar,
            "short" => PropertyType::Short,
            "unsigned short" => PropertyType::UShort,
            "int" | "long" => PropertyType::Int,
            "unsigned int" | "unsigned long" => PropertyType::UInt,
            "__int64" => PropertyType::Int64,
            "float" => PropertyType::Float,
            "bCString" | "eCLocString" => PropertyType::String,
            n if n.ends_with("ResourceString") => PropertyType::String,
            "bCVector2" => PropertyType::Vector2,
            "bCVector" | "bCVector3" => PropertyType::Vector3,
            "bCVector4" => PropertyType::Vector4,
            "bCQuaternion" => PropertyType::Quaternion,
            "bCMatrix" => PropertyType::Matrix,
            "bCMatrix3" => PropertyType::Matrix3,
            "bCBox" => PropertyType::Box,
            "bCSphere" => PropertyType::Sphere,
            "bCRange1" => PropertyType::Range1,
            "bCEulerAngles" => PropertyType::EulerAngles,
            "bCFloatColor" => PropertyType::FloatColor,
            "bCGuid" => PropertyType::Guid,
            "eCEntityProxy" | "eCTemplateEntityProxy" => PropertyType::EntityProxy,
            _ => PropertyType::Unknown,
        }
    }
}

/// Decoded property value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum PropertyValue {
    Bool(bool),
    Char(i8),
    UChar(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Int64(i64),
    Float(f32),
    String(String),
    Vector2(Vector2),
    Vector3(Vector3),
    Vector4(Vector4),
    Quaternion(Quaternion),
    Matrix(Matrix),
    Matrix3(Matrix3),
    Box(BoundingBox),
    Sphere(Sphere),
    Range1(Range1),
    EulerAngles(EulerAngles),
    FloatColor(FloatColor),
    Guid(GuidValue),
    EntityProxy(EntityProxy),
    Enum { version: u16, value: i32 },
    Array(Vec<PropertyValue>),
    ClassArray(Vec<ClassSlot>),
    /// `None` is an empty span, distinct from a null record
    SmartPtr(Option<Box<ClassSlot>>),
    Raw(#[serde(serialize_with = "serialize_hex")] Vec<u8>),
}

fn serialize_hex<S: serde::Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode_upper(bytes))
}

impl PropertyValue {
    pub fn variant_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "Bool",
            PropertyValue::Char(_) => "Char",
            PropertyValue::UChar(_) => "UChar",
            PropertyValue::Short(_) => "Short",
            PropertyValue::UShort(_) => "UShort",
            PropertyValue::Int(_) => "Int",
            PropertyValue::UInt(_) => "UInt",
            PropertyValue::Int64(_) => "Int64",
            PropertyValue::Float(_) => "Float",
            PropertyValue::String(_) => "String",
            PropertyValue::Vector2(_) => "Vector2",
            PropertyValue::Vector3(_) => "Vector3",
            PropertyValue::Vector4(_) => "Vector4",
            PropertyValue::Quaternion(_) => "Quaternion",
            PropertyValue::Matrix(_) => "Matrix",
            PropertyValue::Matrix3(_) => "Matrix3",
            PropertyValue::Box(_) => "Box",
            PropertyValue::Sphere(_) => "Sphere",
            PropertyValue::Range1(_) => "Range1",
            PropertyValue::EulerAngles(_) => "EulerAngles",
            PropertyValue::FloatColor(_) => "FloatColor",
            PropertyValue::Guid(_) => "Guid",
            PropertyValue::EntityProxy(_) => "EntityProxy",
            PropertyValue::Enum { .. } => "Enum",
            PropertyValue::Array(_) => "Array",
            PropertyValue::ClassArray(_) => "ClassArray",
            PropertyValue::SmartPtr(_) => "SmartPtr",
            PropertyValue::Raw(_) => "Raw",
        }
    }

    /// GUIDs this value points at, skipping nil and invalid ones
    pub fn guid_references(&self, out: &mut Vec<Guid>) {
        match self {
            PropertyValue::Guid(g) if g.valid && !g.guid.is_nil() => out.push(g.guid),
            PropertyValue::EntityProxy(p) => {
                if let Some(guid) = p.guid().filter(|g| !g.is_nil()) {
                    out.push(guid);
                }
            }
            PropertyValue::Array(items) => items.iter().for_each(|v| v.guid_references(out)),
            PropertyValue::ClassArray(slots) => slots
                .iter()
                .filter_map(ClassSlot::class)
                .for_each(|c| c.guid_references(out)),
            PropertyValue::SmartPtr(Some(slot)) => {
                if let Some(class) = slot.class() {
                    class.guid_references(out);
                }
            }
            _ => {}
        }
    }

    fn decode(ty: &PropertyType, r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Self> {
        Ok(match ty {
            PropertyType::Bool => PropertyValue::Bool(r.read_bool()?),
            PropertyType::Char => PropertyValue::Char(r.read_u8()? as i8),
            PropertyType::UChar => PropertyValue::UChar(r.read_u8()?),
            PropertyType::Short => PropertyValue::Short(r.read_i16()?),
            PropertyType::UShort => PropertyValue::UShort(r.read_u16()?),
            PropertyType::Int => PropertyValue::Int(r.read_i32()?),
            PropertyType::UInt => PropertyValue::UInt(r.read_u32()?),
            PropertyType::Int64 => PropertyValue::Int64(r.read_i64()?),
            PropertyType::Float => PropertyValue::Float(r.read_f32()?),
            PropertyType::String => PropertyValue::String(ctx.string(r)?),
            PropertyType::Vector2 => PropertyValue::Vector2(Vector2::read(r)?),
            PropertyType::Vector3 => PropertyValue::Vector3(Vector3::read(r)?),
            PropertyType::Vector4 => PropertyValue::Vector4(Vector4::read(r)?),
            PropertyType::Quaternion => PropertyValue::Quaternion(Quaternion::read(r)?),
            PropertyType::Matrix => PropertyValue::Matrix(Matrix::read(r)?),
            PropertyType::Matrix3 => PropertyValue::Matrix3(Matrix3::read(r)?),
            PropertyType::Box => PropertyValue::Box(BoundingBox::read(r)?),
            PropertyType::Sphere => PropertyValue::Sphere(Sphere::read(r)?),
            PropertyType::Range1 => PropertyValue::Range1(Range1::read(r)?),
            PropertyType::EulerAngles => PropertyValue::EulerAngles(EulerAngles::read(r)?),
            PropertyType::FloatColor => PropertyValue::FloatColor(FloatColor::read(r)?),
            PropertyType::Guid => PropertyValue::Guid(GuidValue::read(r)?),
            PropertyType::EntityProxy => PropertyValue::EntityProxy(EntityProxy::read(r)?),
            PropertyType::Enum(_) => PropertyValue::Enum {
                version: r.read_u16()?,
                value: r.read_i32()?,
            },
            PropertyType::Array(element) => {
                let count = r.read_u32()? as usize;
                let mut items = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    items.push(Self::decode(element, r, ctx)?);
                }
                PropertyValue::Array(items)
            }
            PropertyType::ClassArray => {
                let count = r.read_u32()? as usize;
                let mut slots = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    slots.push(read_class_slot(r, ctx)?);
                }
                PropertyValue::ClassArray(slots)
            }
            PropertyType::SmartPtr => {
                if r.is_empty() {
                    PropertyValue::SmartPtr(None)
                } else {
                    PropertyValue::SmartPtr(Some(Box::new(read_class_slot(r, ctx)?)))
                }
            }
            PropertyType::Unknown => PropertyValue::Raw(r.read_bytes(r.remaining())?.to_vec()),
        })
    }

    fn encode(&self, ty: &PropertyType, w: &mut Writer, ctx: &mut WriteContext<'_>) -> Result<()> {
        match (ty, self) {
            (PropertyType::Bool, PropertyValue::Bool(v)) => w.write_bool(*v),
            (PropertyType::Char, PropertyValue::Char(v)) => w.write_u8(*v as u8),
            (PropertyType::UChar, PropertyValue::UChar(v)) => w.write_u8(*v),
            (PropertyType::Short, PropertyValue::Short(v)) => w.write_i16(*v),
            (PropertyType::UShort, PropertyValue::UShort(v)) => w.write_u16(*v),
            (PropertyType::Int, PropertyValue::Int(v)) => w.write_i32(*v),
            (PropertyType::UInt, PropertyValue::UInt(v)) => w.write_u32(*v),
            (PropertyType::Int64, PropertyValue::Int64(v)) => w.write_i64(*v),
            (PropertyType::Float, PropertyValue::Float(v)) => w.write_f32(*v),
            (PropertyType::String, PropertyValue::String(s)) => ctx.write_string(w, s)?,
            (PropertyType::Vector2, PropertyValue::Vector2(v)) => v.write(w),
            (PropertyType::Vector3, PropertyValue::Vector3(v)) => v.write(w),
            (PropertyType::Vector4, PropertyValue::Vector4(v)) => v.write(w),
            (PropertyType::Quaternion, PropertyValue::Quaternion(v)) => v.write(w),
            (PropertyType::Matrix, PropertyValue::Matrix(v)) => v.write(w),
            (PropertyType::Matrix3, PropertyValue::Matrix3(v)) => v.write(w),
            (PropertyType::Box, PropertyValue::Box(v)) => v.write(w),
            (PropertyType::Sphere, PropertyValue::Sphere(v)) => v.write(w),
            (PropertyType::Range1, PropertyValue::Range1(v)) => v.write(w),
            (PropertyType::EulerAngles, PropertyValue::EulerAngles(v)) => v.write(w),
            (PropertyType::FloatColor, PropertyValue::FloatColor(v)) => v.write(w),
            (PropertyType::Guid, PropertyValue::Guid(v)) => v.write(w),
            (PropertyType::EntityProxy, PropertyValue::EntityProxy(v)) => v.write(w),
            (PropertyType::Enum(_), PropertyValue::Enum { version, value }) => {
                w.write_u16(*version);
                w.write_i32(*value);
            }
            (PropertyType::Array(element), PropertyValue::Array(items)) => {
                w.write_u32(items.len() as u32);
                for item in items {
                    item.encode(element, w, ctx)?;
                }
            }
            (PropertyType::ClassArray, PropertyValue::ClassArray(slots)) => {
                w.write_u32(slots.len() as u32);
                for slot in slots {
                    write_class_slot(w, slot, ctx)?;
                }
            }
            (PropertyType::SmartPtr, PropertyValue::SmartPtr(slot)) => {
                if let Some(slot) = slot {
                    write_class_slot(w, slot, ctx)?;
                }
            }
            (PropertyType::Unknown, PropertyValue::Raw(bytes)) => w.write_bytes(bytes),
            (ty, value) => {
                return Err(Error::Encode(format!(
                    "{} value does not match property type {:?}",
                    value.variant_name(),
                    ty
                )))
            }
        }
        Ok(())
    }
}

/// A named, typed property of a class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProperty {
    pub name: String,
    /// Engine type name as stored in the string table
    pub type_name: String,
    pub version: u16,
    pub value: PropertyValue,
}

impl ClassProperty {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            version: 0x1E,
            value,
        }
    }

    pub fn property_type(&self) -> PropertyType {
        PropertyType::parse(&self.type_name)
    }

    pub fn read(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Self> {
        let name = ctx.string(r)?;
        let type_name = ctx.string(r)?;
        let version = r.read_u16()?;
        let size = r.read_u32()? as usize;
        let mut body = r.sub_reader(size)?;

        let ty = PropertyType::parse(&type_name);
        let value = PropertyValue::decode(&ty, &mut body, ctx).map_err(|e| match e {
            Error::Format { .. } => body.decode_error(format!(
                "property '{}' of type '{}' overruns its {} bytes",
                name, type_name, size
            )),
            other => other,
        })?;
        body.expect_end(&format!("property '{}' of type '{}'", name, type_name))?;

        Ok(Self {
            name,
            type_name,
            version,
            value,
        })
    }

    pub fn write(&self, w: &mut Writer, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_string(w, &self.name)?;
        ctx.write_string(w, &self.type_name)?;
        w.write_u16(self.version);
        let slot = w.reserve_len();
        self.value
            .encode(&self.property_type(), w, ctx)
            .map_err(|e| match e {
                Error::Encode(reason) => Error::Encode(format!("property '{}': {}", self.name, reason)),
                other => other,
            })?;
        w.finish_len(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassRegistry, StringTable};

    fn encode(prop: &ClassProperty) -> (Vec<u8>, StringTable) {
        let registry = ClassRegistry::new();
        let mut strings = StringTable::new();
        let mut w = Writer::new();
        {
            let mut ctx = WriteContext::new(&registry, &mut strings);
            prop.write(&mut w, &mut ctx).unwrap();
        }
        (w.into_inner(), strings)
    }

    fn decode(bytes: &[u8], strings: &StringTable) -> Result<ClassProperty> {
        let registry = ClassRegistry::new();
        let ctx = ReadContext::new(&registry, strings);
        ClassProperty::read(&mut Reader::new("t", bytes), &ctx)
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!(PropertyType::parse("bool"), PropertyType::Bool);
        assert_eq!(PropertyType::parse("bCString"), PropertyType::String);
        assert_eq!(PropertyType::parse("eCMeshResourceString"), PropertyType::String);
        assert_eq!(
            PropertyType::parse("bTPropertyContainer<enum gEEntityType>"),
            PropertyType::Enum("gEEntityType".to_string())
        );
        assert_eq!(
            PropertyType::parse("bTObjArray<class eCEntityProxy>"),
            PropertyType::Array(Box::new(PropertyType::EntityProxy))
        );
        assert_eq!(
            PropertyType::parse("bTObjArray<class bTPropertyContainer<enum gEDirection> >"),
            PropertyType::Array(Box::new(PropertyType::Enum("gEDirection".to_string())))
        );
        assert_eq!(
            PropertyType::parse("bTRefPtrArray<class bCPropertyObjectBase *>"),
            PropertyType::ClassArray
        );
        assert_eq!(
            PropertyType::parse("bTPOSmartPtr<class gCSector>"),
            PropertyType::SmartPtr
        );
        assert_eq!(PropertyType::parse("gCSomethingNew"), PropertyType::Unknown);
        assert_eq!(PropertyType::parse("bTObjArray<class gCSomethingNew>"), PropertyType::Unknown);
    }

    #[test]
    fn test_enum_property_layout() {
        let prop = ClassProperty::new(
            "EntityType",
            "bTPropertyContainer<enum gEEntityType>",
            PropertyValue::Enum { version: 1, value: 0 },
        );
        let (bytes, strings) = encode(&prop);
        assert_eq!(
            hex::encode_upper(&bytes),
            "000001001E0006000000010000000000"
        );
        assert_eq!(strings.get(1).unwrap(), "bTPropertyContainer<enum gEEntityType>");
        assert_eq!(decode(&bytes, &strings).unwrap(), prop);
    }

    #[test]
    fn test_vector_bits_survive() {
        let v = Vector3::new(f32::from_bits(0x3F80_0001), -0.0, f32::from_bits(0x7FC0_1234));
        let prop = ClassProperty::new("Offset", "bCVector", PropertyValue::Vector3(v));
        let (bytes, strings) = encode(&prop);
        let back = decode(&bytes, &strings).unwrap();
        match back.value {
            PropertyValue::Vector3(b) => {
                assert_eq!(b.x.to_bits(), 0x3F80_0001);
                assert_eq!(b.y.to_bits(), (-0.0f32).to_bits());
                assert_eq!(b.z.to_bits(), 0x7FC0_1234);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_size_mismatch_is_decode_error() {
        // bool declared with 2 bytes
        let strings = StringTable::from_strings(["Flag", "bool"]).unwrap();
        let bytes = hex::decode("000001001E00020000000100").unwrap();
        let err = decode(&bytes, &strings).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err}");

        // float declared with 2 bytes
        let strings = StringTable::from_strings(["Scale", "float"]).unwrap();
        let bytes = hex::decode("000001001E00020000000000").unwrap();
        let err = decode(&bytes, &strings).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err}");
    }

    #[test]
    fn test_unknown_type_kept_raw() {
        let strings = StringTable::from_strings(["Shape", "gCFancyShape"]).unwrap();
        let bytes = hex::decode("000001001E0003000000AABBCC").unwrap();
        let prop = decode(&bytes, &strings).unwrap();
        assert_eq!(prop.value, PropertyValue::Raw(vec![0xAA, 0xBB, 0xCC]));
        let (again, _) = encode(&prop);
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_mismatched_value_is_encode_error() {
        let prop = ClassProperty::new("Flag", "bool", PropertyValue::Float(1.0));
        let registry = ClassRegistry::new();
        let mut strings = StringTable::new();
        let mut ctx = WriteContext::new(&registry, &mut strings);
        let err = prop.write(&mut Writer::new(), &mut ctx).unwrap_err();
        assert!(matches!(err, Error::Encode(ref m) if m.contains("'Flag'")));
    }

    #[test]
    fn test_proxy_array_references() {
        let a = Guid::random();
        let value = PropertyValue::Array(vec![
            PropertyValue::EntityProxy(EntityProxy::to(a)),
            PropertyValue::EntityProxy(EntityProxy {
                version: 1,
                target: None,
            }),
        ]);
        let mut refs = Vec::new();
        value.guid_references(&mut refs);
        assert_eq!(refs, vec![a]);
    }

    #[test]
    fn test_null_smart_ptr_is_empty() {
        let prop = ClassProperty::new(
            "SectorPtr",
            "bTPOSmartPtr<class gCSector>",
            PropertyValue::SmartPtr(None),
        );
        let (bytes, strings) = encode(&prop);
        assert_eq!(hex::encode_upper(&bytes), "000001001E0000000000");
        assert_eq!(decode(&bytes, &strings).unwrap(), prop);
    }

    #[test]
    fn test_smart_ptr_null_record_kept() {
        let strings = StringTable::from_strings(["SectorPtr", "bTPOSmartPtr<class gCSector>"]).unwrap();
        let bytes = hex::decode("000001001E0003000000010000").unwrap();
        let prop = decode(&bytes, &strings).unwrap();
        assert_eq!(
            prop.value,
            PropertyValue::SmartPtr(Some(Box::new(ClassSlot::null())))
        );
        let (again, _) = encode(&prop);
        assert_eq!(hex::encode_upper(&again), "000001001E0003000000010000");
    }

    #[test]
    fn test_class_array_null_versions_kept() {
        let strings = StringTable::from_strings([
            "Children",
            "bTRefPtrArray<class bCPropertyObjectBase *>",
        ])
        .unwrap();
        let bytes = hex::decode("000001001E000A00000002000000020000010000").unwrap();
        let prop = decode(&bytes, &strings).unwrap();
        assert_eq!(
            prop.value,
            PropertyValue::ClassArray(vec![
                ClassSlot::Null { accessor_version: 2 },
                ClassSlot::Null { accessor_version: 1 },
            ])
        );
        let (again, _) = encode(&prop);
        assert_eq!(again, bytes);
    }
}
