//! Empty files built from known-good bytes
//!
//! Each template is a complete Genome file as hex text. Archives are
//! decoded and get a fresh root GUID; the auxiliary layer and context files
//! are written out unchanged.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::archive::{open_archive_bytes, ArchiveFile};
use crate::cursor::decode_hex;
use crate::oneclass::{open_one_class_resource_bytes, ResourceKind};
use crate::property::PropertyValue;
use crate::registry::ClassRegistry;
use crate::types::BoundingBox;
use crate::{write_file, Error, Guid, Result};

/// Empty `.lrentdat` archive holding one `RootEntity`
pub const LRENTDAT_HEX: &str = "\
    47454E4F4D464C450100CF01000047454E4F4D45444C5300010001010001000001000053005300A40100001E\
    0002000000010002001E0014000000696E2F446174612F50726F6A656374730047335F030004001E00180000\
    000000000000000000000000000000000000000000000000005300000000803F0000803F0000000000000000\
    0000000000000000000000000000000001000000400053000053000100000000000000000000000000000000\
    0000000000010100010001010000803F00000000000005000000803F00000000000000000000000000000000\
    0000803F000000000000000000000000000000000000803F000000000000000000000000000000000000803F\
    0000803F000000000000000000000000000000000000803F000000000000000000000000000000000000803F\
    000000000000000000000000000000000000803F000000000000000000000000000000000000000000000000\
    FFFF7F7FFFFF7F7FFFFF7F7FFFFF7FFFFFFF7FFFFFFF7FFFFFFF7F7FFFFF7F7FFFFF7F7FFFFF7FFFFFFF7FFF\
    FFFF7FFF00000000000000000000000000000000FFFF7FFF0000000000000000000000000000803F00000080\
    3FFFFFFFFF0000803F000000000000FFFFFFFFFFFFFFFFEFBEADDE010600000016006543456E746974794479\
    6E616D6963436F6E746578740200494406006243477569640A00436F6E74657874426F7805006243426F780A\
    00526F6F74456E74697479";

/// Empty `.node` archive holding one `Root` entity
pub const NODE_HEX: &str = "\
    47454E4F4D464C4501009F0100005300010000000000230000FFFF7F7FFFFF7F7FFFFF7F7FFFFF7FFFFFFF7F\
    FFFFFF7FFF000000000000000000000000FFFF7FFFFFFF7FFFFFFF7FFF000000000000000000000000000000\
    0000000000000000000000000000000000000000005300010000000000000000000000000000000000000000\
    00010100010001010000803F00000000000000000000803F000000000000000000000000000000000000803F\
    000000000000000000000000000000000000803F000000000000000000000000000000000000803F0000803F\
    000000000000000000000000000000000000803F000000000000000000000000000000000000803F00000000\
    0000000000000000000000000000803F3E442AC64160A345C65B13468CDEC545F0133346060BCE46FFFF7F7F\
    FFFF7F7FFFFF7F7FFFFF7FFFFFFF7FFFFFFF7FFFFFFF7F7FFFFF7F7FFFFF7F7FFFFF7FFFFFFF7FFFFFFF7FFF\
    4DF54246F0A90EC50862024674DC8B46FFFF7FFF0000000000000000000000000000803F000000803FFFFFFF\
    FF0000803F000000000000FFFFFFFFFFFFFFFFEFBEADDE01010000000400526F6F74";

/// `gCDynamicLayer` file (`.lrent`)
pub const LRENT_HEX: &str = "\
    47454E4F4D464C4501004E0000000100010100010000010000530053002D0000001E0003000000010002001E\
    0006000000010000000000030004001E0000000000050006001E0001000000010100EFBEADDE01070000000E\
    00674344796E616D69634C617965720A00456E74697479547970652600625450726F7065727479436F6E7461\
    696E65723C656E756D206745456E74697479547970653E0900536563746F725074721C006254504F536D6172\
    745074723C636C617373206743536563746F723E0D0049735065727369737461626C650400626F6F6C";

/// `gCSector` file (`.sec`)
pub const SEC_HEX: &str = "\
    47454E4F4D464C450100900000000100010100010000010000530053006F0000001E0009000000010002001E\
    0000000000030004001E0000000000050004001E0000000000060007001E000100000000080007001E000100\
    000000090007001E0001000000000A000B001E00040000000000803F0C000B001E00040000000000803F0D00\
    07001E0001000000011B0001EFBEADDE010E00000008006743536563746F720800576F726C645074721B0062\
    54504F536D6172745074723C636C617373206743576F726C643E0E0047656F6D657472794C61796572732B00\
    625452656650747241727261793C636C61737320624350726F70657274794F626A65637442617365202A3E0C\
    00456E746974794C617965727306004D61726B65640400626F6F6C0700467265657A656406004C6F636B6564\
    0F0056697375616C4C6F44466163746F720500666C6F617410004F626A65637443756C6C466163746F720D00\
    49735065727369737461626C65";

/// `gCGeometryLayer` file (`.lrgeo`)
pub const LRGEO_HEX: &str = "\
    47454E4F4D464C4501005A000000010001010001000001000053005300390000001E0004000000010002001E\
    00020000000300040005001E0006000000010000000000060007001E0000000000080009001E000100000001\
    0100EFBEADDE010A0000000F00674347656F6D657472794C6179657210004F726967696E496D706F72744E61\
    6D6508006243537472696E6700000C0047656F6D65747279547970652800625450726F7065727479436F6E74\
    61696E65723C656E756D20674547656F6D65747279547970653E0900536563746F725074721C006254504F53\
    6D6172745074723C636C617373206743536563746F723E0D0049735065727369737461626C650400626F6F6C";

/// `eCGeometrySpatialContext` file (`.lrgeodat`)
pub const LRGEODAT_HEX: &str = "\
    47454E4F4D464C45010083000000010001010001000001000053005300620000001E0002000000010002001E\
    0014000000435350476C7267656F6461743133333700000000030004001E0018000000FFFF7F7FFFFF7F7FFF\
    FF7F7FFFFF7FFFFFFF7FFFFFFF7FFF53000101FFFF7F7FFFFF7F7FFFFF7F7FFFFF7FFFFFFF7FFFFFFF7FFFEF\
    BEADDE01050000001800654347656F6D657472795370617469616C436F6E7465787402004944060062434775\
    69640A00436F6E74657874426F7805006243426F78";

/// `gCTemplateLayer` file (`.lrtpl`)
pub const LRTPL_HEX: &str = "\
    47454E4F4D464C4501003E0000000100010100010000010000530053001D0000001E0002000000010002001E\
    0000000000030004001E0001000000010100EFBEADDE01050000000F00674354656D706C6174654C61796572\
    0900536563746F725074721C006254504F536D6172745074723C636C617373206743536563746F723E0D0049\
    735065727369737461626C650400626F6F6C";

/// `eCEntityTemplateContext` file (`.lrtpldat`)
pub const LRTPLDAT_HEX: &str = "\
    47454E4F4D464C45010069000000010001010001000001000053005300480000001E0002000000010002001E\
    00140000000000000000000000000000000000000000000000030004001E0018000000000000000000000000\
    0000000000000000000000000000003800EFBEADDE010500000017006543456E7469747954656D706C617465\
    436F6E746578740200494406006243477569640A00436F6E74657874426F7805006243426F78";

/// Decode an archive template and give its root entity a random GUID
pub fn create_archive(hex: &str, registry: &ClassRegistry) -> Result<ArchiveFile> {
    let data = decode_hex(hex)?;
    let mut archive = open_archive_bytes("<embedded>", &data, registry)?;
    archive.set_root_guid(Guid::random())?;
    Ok(archive)
}

pub fn create_empty_lrentdat(registry: &ClassRegistry) -> Result<ArchiveFile> {
    create_archive(LRENTDAT_HEX, registry)
}

pub fn create_empty_node(registry: &ClassRegistry) -> Result<ArchiveFile> {
    create_archive(NODE_HEX, registry)
}

/// Auxiliary files that accompany a world sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuxKind {
    Lrent,
    Sector,
    Lrgeo,
    Lrgeodat,
    Lrtpl,
    Lrtpldat,
}

impl AuxKind {
    pub const ALL: [AuxKind; 6] = [
        AuxKind::Lrent,
        AuxKind::Sector,
        AuxKind::Lrgeo,
        AuxKind::Lrgeodat,
        AuxKind::Lrtpl,
        AuxKind::Lrtpldat,
    ];

    pub fn resource_kind(self) -> ResourceKind {
        match self {
            AuxKind::Lrent => ResourceKind::DynamicLayer,
            AuxKind::Sector => ResourceKind::Sector,
            AuxKind::Lrgeo => ResourceKind::GeometryLayer,
            AuxKind::Lrgeodat => ResourceKind::GeometryContext,
            AuxKind::Lrtpl => ResourceKind::TemplateLayer,
            AuxKind::Lrtpldat => ResourceKind::TemplateContext,
        }
    }

    pub fn extension(self) -> &'static str {
        self.resource_kind().extension()
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let kind = ResourceKind::from_extension(ext)?;
        Self::ALL.into_iter().find(|a| a.resource_kind() == kind)
    }

    pub fn hex(self) -> &'static str {
        match self {
            AuxKind::Lrent => LRENT_HEX,
            AuxKind::Sector => SEC_HEX,
            AuxKind::Lrgeo => LRGEO_HEX,
            AuxKind::Lrgeodat => LRGEODAT_HEX,
            AuxKind::Lrtpl => LRTPL_HEX,
            AuxKind::Lrtpldat => LRTPLDAT_HEX,
        }
    }

    pub fn bytes(self) -> Result<Vec<u8>> {
        decode_hex(self.hex())
    }
}

/// Write the template for `kind` next to `path`, replacing its extension.
/// Returns the path actually written.
pub fn create_file(path: &Path, kind: AuxKind) -> Result<PathBuf> {
    let target = path.with_extension(kind.extension());
    write_file(&target, &kind.bytes()?)?;
    debug!(file = %target.display(), kind = ?kind, "Created file");
    Ok(target)
}

/// Write an `.lrgeodat` whose `ContextBox` is `content_box`
pub fn create_lrgeodat(path: &Path, content_box: BoundingBox, registry: &ClassRegistry) -> Result<PathBuf> {
    let data = AuxKind::Lrgeodat.bytes()?;
    let mut file = open_one_class_resource_bytes("<embedded>", &data, ResourceKind::GeometryContext, registry)?;
    let updated = file
        .class_mut()
        .properties_mut()
        .map(|props| props.set_value("ContextBox", PropertyValue::Box(content_box)))
        .unwrap_or(false);
    if !updated {
        return Err(Error::Encode(
            "geometry context template has no ContextBox property".to_string(),
        ));
    }

    let target = path.with_extension(AuxKind::Lrgeodat.extension());
    file.save(&target, registry)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3;

    #[test]
    fn test_templates_are_genome_files() {
        for hex in [LRENTDAT_HEX, NODE_HEX] {
            assert!(crate::is_genome_file(&decode_hex(hex).unwrap()));
        }
        for kind in AuxKind::ALL {
            assert!(crate::is_genome_file(&kind.bytes().unwrap()), "{:?}", kind);
        }
    }

    #[test]
    fn test_empty_archives_get_distinct_guids() {
        let registry = ClassRegistry::with_builtins();
        let a = create_empty_node(&registry).unwrap();
        let b = create_empty_node(&registry).unwrap();
        let guid = |f: &ArchiveFile| f.graph().get(f.graph().roots()[0]).unwrap().guid();
        assert_ne!(guid(&a), guid(&b));
        assert!(!guid(&a).is_nil());
    }

    #[test]
    fn test_aux_extensions() {
        assert_eq!(AuxKind::Sector.extension(), "sec");
        assert_eq!(AuxKind::from_extension("lrtpldat"), Some(AuxKind::Lrtpldat));
        assert_eq!(AuxKind::from_extension("xcmsh"), None);
    }

    #[test]
    fn test_create_file_changes_extension() {
        let dir = tempfile::tempdir().unwrap();
        let written = create_file(&dir.path().join("G3_World_01.node"), AuxKind::Lrtpl).unwrap();
        assert_eq!(written, dir.path().join("G3_World_01.lrtpl"));
        assert_eq!(std::fs::read(&written).unwrap(), AuxKind::Lrtpl.bytes().unwrap());
    }

    #[test]
    fn test_create_lrgeodat() {
        let registry = ClassRegistry::with_builtins();
        let dir = tempfile::tempdir().unwrap();
        let bounds = BoundingBox::new(Vector3::new(-10.0, 0.0, -10.0), Vector3::new(10.0, 5.0, 10.0));
        let written = create_lrgeodat(&dir.path().join("Sector"), bounds, &registry).unwrap();
        assert_eq!(written.extension().and_then(|e| e.to_str()), Some("lrgeodat"));

        let file = crate::open_one_class_resource(&written, ResourceKind::GeometryContext, &registry).unwrap();
        assert_eq!(
            file.class().property("ContextBox").map(|p| &p.value),
            Some(&PropertyValue::Box(bounds))
        );
    }
}
