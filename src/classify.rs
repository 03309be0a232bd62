//! Content-based type detection for decompressed payloads.
//!
//! Detection runs an ordered first-match chain. Some checks are loose (DDS
//! only looks at three bytes), so the order is fixed in [`DETECTION_ORDER`].

use std::fmt;

use serde::Serialize;

pub const MESH_MAGIC: [u8; 4] = [0x34, 0x80, 0xC8, 0xBB];
pub const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];
pub const KTX_MAGIC: [u8; 8] = [0xAB, b'K', b'T', b'X', b' ', b'1', b'1', 0xBB];
pub const DDS_MAGIC: [u8; 3] = *b"DDS";
pub const BANK_MAGIC: [u8; 4] = *b"BKHD";
pub const PACKAGE_MAGIC: [u8; 4] = *b"AKPK";
pub const TGA_FOOTER: [u8; 18] = *b"TRUEVISION-XFILE.\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Audio,
    Image,
    Mesh,
    Package,
    Compressed,
    Unknown,
}

impl Category {
    /// Directory name under the output root.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Audio => "audio",
            Category::Image => "image",
            Category::Mesh => "mesh",
            Category::Package => "package",
            Category::Compressed => "compressed",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct DetectionRule {
    pub label: &'static str,
    pub category: Category,
    pub matches: fn(&[u8]) -> bool,
}

fn is_mesh(data: &[u8]) -> bool {
    data.starts_with(&MESH_MAGIC)
}

fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_MAGIC)
}

fn is_ktx(data: &[u8]) -> bool {
    data.starts_with(&KTX_MAGIC)
}

fn is_dds(data: &[u8]) -> bool {
    data.starts_with(&DDS_MAGIC)
}

fn is_wem(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

fn is_bank(data: &[u8]) -> bool {
    data.starts_with(&BANK_MAGIC)
}

fn is_package(data: &[u8]) -> bool {
    data.starts_with(&PACKAGE_MAGIC)
}

fn is_zstd(data: &[u8]) -> bool {
    data.starts_with(&crate::scanner::ZSTD_MAGIC)
}

fn is_tga(data: &[u8]) -> bool {
    data.ends_with(&TGA_FOOTER)
}

/// Evaluated top to bottom; the first match wins. TGA is a trailer check
/// and only runs once every prefix check has failed.
pub const DETECTION_ORDER: [DetectionRule; 9] = [
    DetectionRule { label: "mesh", category: Category::Mesh, matches: is_mesh },
    DetectionRule { label: "png", category: Category::Image, matches: is_png },
    DetectionRule { label: "ktx", category: Category::Image, matches: is_ktx },
    DetectionRule { label: "dds", category: Category::Image, matches: is_dds },
    DetectionRule { label: "wem", category: Category::Audio, matches: is_wem },
    DetectionRule { label: "bnk", category: Category::Audio, matches: is_bank },
    DetectionRule { label: "npk", category: Category::Package, matches: is_package },
    DetectionRule { label: "zst", category: Category::Compressed, matches: is_zstd },
    DetectionRule { label: "tga", category: Category::Image, matches: is_tga },
];

/// Extension label for `payload`, or `""` when nothing matches.
pub fn classify(payload: &[u8]) -> &'static str {
    if payload.is_empty() {
        return "";
    }
    DETECTION_ORDER
        .iter()
        .find(|rule| (rule.matches)(payload))
        .map(|rule| rule.label)
        .unwrap_or("")
}

pub fn category_for(label: &str) -> Category {
    DETECTION_ORDER
        .iter()
        .find(|rule| rule.label == label)
        .map(|rule| rule.category)
        .unwrap_or(Category::Unknown)
}
