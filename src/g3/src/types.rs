//! Fixed-layout value types shared by properties and entity records
//!
//! Floats are kept bit-exact: values are read and written through
//! `f32::from_bits`/`to_bits` so NaN payloads and negative zero survive.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::cursor::{Reader, Writer};
use crate::{Guid, Result};

/// A value with a constant on-disk size
pub trait FixedBinary: Sized {
    const SIZE: usize;

    fn read(reader: &mut Reader<'_>) -> Result<Self>;

    fn write(&self, writer: &mut Writer);
}

macro_rules! float_struct {
    ($(#[$meta:meta])* $name:ident { $($field:ident),+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        pub struct $name {
            $(pub $field: f32,)+
        }

        impl FixedBinary for $name {
            const SIZE: usize = 4 * [$(stringify!($field)),+].len();

            fn read(reader: &mut Reader<'_>) -> Result<Self> {
                Ok(Self {
                    $($field: reader.read_f32()?,)+
                })
            }

            fn write(&self, writer: &mut Writer) {
                $(writer.write_f32(self.$field);)+
            }
        }
    };
}

float_struct!(Vector2 { x, y });
float_struct!(Vector3 { x, y, z });
float_struct!(Vector4 { x, y, z, w });
float_struct!(
    /// Stored as x, y, z, w
    Quaternion { x, y, z, w }
);
float_struct!(EulerAngles { yaw, pitch, roll });
float_struct!(FloatColor { r, g, b });
float_struct!(Range1 { min, max });

impl Vector3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_glam(self) -> glam::Vec3 {
        glam::Vec3::new(self.x, self.y, self.z)
    }
}

impl From<glam::Vec3> for Vector3 {
    fn from(v: glam::Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// 4x4 matrix, 16 floats in file order
///
/// The engine uses row vectors with rows stored first, so the translation
/// lives in elements 12..15. Loading the array column-first into glam gives
/// the equivalent column-vector matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix(pub [f32; 16]);

impl Matrix {
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn to_glam(&self) -> Mat4 {
        Mat4::from_cols_array(&self.0)
    }

    pub fn from_glam(m: Mat4) -> Self {
        Self(m.to_cols_array())
    }

    pub fn translation(&self) -> Vector3 {
        Vector3::new(self.0[12], self.0[13], self.0[14])
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FixedBinary for Matrix {
    const SIZE: usize = 64;

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self(reader.read_f32_array::<16>()?))
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_f32_slice(&self.0);
    }
}

/// 3x3 rotation matrix, 9 floats in file order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix3(pub [f32; 9]);

impl FixedBinary for Matrix3 {
    const SIZE: usize = 36;

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self(reader.read_f32_array::<9>()?))
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_f32_slice(&self.0);
    }
}

/// Axis-aligned box (min, max)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vector3,
    pub max: Vector3,
}

impl BoundingBox {
    pub const fn new(min: Vector3, max: Vector3) -> Self {
        Self { min, max }
    }

    /// Inverted box that any `extend` call will replace
    pub const fn empty() -> Self {
        Self {
            min: Vector3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vector3::new(-f32::MAX, -f32::MAX, -f32::MAX),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn extend(&mut self, other: &BoundingBox) {
        if !other.is_valid() {
            return;
        }
        self.min = self.min.to_glam().min(other.min.to_glam()).into();
        self.max = self.max.to_glam().max(other.max.to_glam()).into();
    }
}

impl FixedBinary for BoundingBox {
    const SIZE: usize = 24;

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            min: Vector3::read(reader)?,
            max: Vector3::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.min.write(writer);
        self.max.write(writer);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vector3,
    pub radius: f32,
}

impl FixedBinary for Sphere {
    const SIZE: usize = 16;

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            center: Vector3::read(reader)?,
            radius: reader.read_f32()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.center.write(writer);
        writer.write_f32(self.radius);
    }
}

/// `bCGuid`: raw GUID plus a validity flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GuidValue {
    pub guid: Guid,
    pub valid: bool,
}

impl GuidValue {
    pub fn new(guid: Guid) -> Self {
        Self { guid, valid: true }
    }
}

impl FixedBinary for GuidValue {
    const SIZE: usize = 20;

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let guid = Guid::from_bytes(reader.read_array::<16>()?);
        let valid = reader.read_u32()? != 0;
        Ok(Self { guid, valid })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(self.guid.as_bytes());
        writer.write_u32(u32::from(self.valid));
    }
}

/// Reference to another entity by GUID (`eCEntityProxy`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityProxy {
    pub version: u16,
    pub target: Option<GuidValue>,
}

impl EntityProxy {
    pub fn to(guid: Guid) -> Self {
        Self {
            version: 1,
            target: Some(GuidValue::new(guid)),
        }
    }

    pub fn guid(&self) -> Option<Guid> {
        self.target.map(|t| t.guid)
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.read_u16()?;
        let target = if reader.read_bool()? {
            Some(GuidValue::read(reader)?)
        } else {
            None
        };
        Ok(Self { version, target })
    }

    pub fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.version);
        match &self.target {
            Some(target) => {
                writer.write_u8(1);
                target.write(writer);
            }
            None => writer.write_u8(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sizes() {
        assert_eq!(Vector3::SIZE, 12);
        assert_eq!(Quaternion::SIZE, 16);
        assert_eq!(BoundingBox::SIZE, 24);
        assert_eq!(GuidValue::SIZE, 20);
    }

    #[test]
    fn test_matrix_translation_maps_to_glam() {
        let mut m = Matrix::IDENTITY;
        m.0[12] = 5.0;
        m.0[13] = -2.0;
        m.0[14] = 3.0;
        let g = m.to_glam();
        assert_eq!(g.w_axis.truncate(), glam::Vec3::new(5.0, -2.0, 3.0));
        assert_eq!(Matrix::from_glam(g), m);
        assert_eq!(m.translation(), Vector3::new(5.0, -2.0, 3.0));
    }

    #[test]
    fn test_empty_box_is_invalid_until_extended() {
        let mut b = BoundingBox::empty();
        assert!(!b.is_valid());
        b.extend(&BoundingBox::new(Vector3::new(-1.0, 0.0, 0.0), Vector3::new(1.0, 2.0, 3.0)));
        assert!(b.is_valid());
        assert_eq!(b.min, Vector3::new(-1.0, 0.0, 0.0));
        assert!(BoundingBox::default().is_valid());
    }

    #[test]
    fn test_entity_proxy_null_and_set() {
        let mut w = Writer::new();
        EntityProxy { version: 1, target: None }.write(&mut w);
        assert_eq!(w.as_slice(), &[1, 0, 0]);

        let proxy = EntityProxy::to(Guid::random());
        let mut w = Writer::new();
        proxy.write(&mut w);
        assert_eq!(w.position(), 23);
        let bytes = w.into_inner();
        let mut r = Reader::new("t", &bytes);
        assert_eq!(EntityProxy::read(&mut r).unwrap(), proxy);
    }

    proptest! {
        #[test]
        fn prop_vector_bits_preserved(x in any::<u32>(), y in any::<u32>(), z in any::<u32>()) {
            let v = Vector3::new(f32::from_bits(x), f32::from_bits(y), f32::from_bits(z));
            let mut w = Writer::new();
            v.write(&mut w);
            let bytes = w.into_inner();
            let back = Vector3::read(&mut Reader::new("t", &bytes)).unwrap();
            prop_assert_eq!(back.x.to_bits(), x);
            prop_assert_eq!(back.y.to_bits(), y);
            prop_assert_eq!(back.z.to_bits(), z);
        }
    }
}
