use crate::SegmentList;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};

static INBUILT_MAPS: LazyLock<Vec<Arc<RomMap>>> = LazyLock::new(|| {
    const INBUILT_MAP_SRC: &[&str] = &[include_str!("zero_mission_map.toml")];
    INBUILT_MAP_SRC
        .iter()
        .map(|&map| Arc::new(RomMap::parse(map).expect("Failed to parse inbuilt map")))
        .collect()
});

/// Where the compressed streams of a known container live.
#[derive(Debug, Clone, Deserialize)]
pub struct RomMap {
    pub supported_roms: Vec<RomMetadata>,

    #[serde(rename = "segment")]
    pub segments: SegmentList,
}

impl RomMap {
    pub fn parse(map: &str) -> Result<RomMap, toml::de::Error> {
        toml::de::from_str(map)
    }

    pub fn is_compatible_with(&self, rom: &[u8]) -> bool {
        let crc = crc32fast::hash(rom);
        self.supported_roms.iter().any(|rom_type| rom_type.crc == crc)
    }

    pub fn metadata_for(&self, rom: &[u8]) -> Option<&RomMetadata> {
        let crc = crc32fast::hash(rom);
        self.supported_roms.iter().find(|rom_type| rom_type.crc == crc)
    }

    pub fn find_inbuilt_for(rom: &[u8]) -> Option<Arc<RomMap>> {
        Self::find_for_rom(rom, &[])
    }

    pub fn find_for_rom(rom: &[u8], additional_maps: &[Arc<RomMap>]) -> Option<Arc<RomMap>> {
        let crc = crc32fast::hash(rom);

        INBUILT_MAPS
            .iter()
            .chain(additional_maps.iter())
            .find(|map| {
                map.supported_roms
                    .iter()
                    .any(|rom_type| rom_type.crc == crc)
            })
            .cloned()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RomMetadata {
    pub name: String,
    pub crc: u32,
}
