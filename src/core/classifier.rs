//! Maps a file extension to its category, icon tag and color tag.
//!
//! This is the single source of truth for category display data. File
//! creation, profile apply, load and import all go through [`classify`].

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A fixed file category. Declaration order is the sort rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Documents,
    Images,
    Video,
    Audio,
    Archives,
    Applications,
    Shortcuts,
    Other,
}

/// An RGB color tag for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorTag(pub u8, pub u8, pub u8);

/// The result of classifying one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub icon: &'static str,
    pub color: ColorTag,
}

const CATEGORY_TABLE: &[(Category, &[&str])] = &[
    (Category::Documents, &["doc", "docx", "pdf", "txt", "xlsx", "pptx"]),
    (Category::Images, &["jpg", "png", "gif", "bmp", "svg"]),
    (Category::Video, &["mp4", "avi", "mkv", "mov"]),
    (Category::Audio, &["mp3", "wav", "flac", "aac"]),
    (Category::Archives, &["zip", "rar", "7z", "tar"]),
    (Category::Applications, &["exe", "msi"]),
    (Category::Shortcuts, &["lnk", "url"]),
];

impl Category {
    /// Every category, in rank order.
    pub const ALL: [Category; 8] = [
        Category::Documents,
        Category::Images,
        Category::Video,
        Category::Audio,
        Category::Archives,
        Category::Applications,
        Category::Shortcuts,
        Category::Other,
    ];

    /// Position in the sort order; `Other` ranks last.
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Display label, also used as the category folder name.
    pub fn label(self) -> &'static str {
        match self {
            Category::Documents => "Documents",
            Category::Images => "Images",
            Category::Video => "Video",
            Category::Audio => "Audio",
            Category::Archives => "Archives",
            Category::Applications => "Applications",
            Category::Shortcuts => "Shortcuts",
            Category::Other => "Other",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Category::Documents => "📄",
            Category::Images => "🖼️",
            Category::Video => "🎥",
            Category::Audio => "🎵",
            Category::Archives => "📦",
            Category::Applications => "⚙️",
            Category::Shortcuts => "🔗",
            Category::Other => "📁",
        }
    }

    pub fn color(self) -> ColorTag {
        match self {
            Category::Documents => ColorTag(59, 130, 246),
            Category::Images => ColorTag(16, 185, 129),
            Category::Video => ColorTag(239, 68, 68),
            Category::Audio => ColorTag(245, 158, 11),
            Category::Archives => ColorTag(139, 92, 246),
            Category::Applications => ColorTag(34, 197, 94),
            Category::Shortcuts => ColorTag(251, 191, 36),
            Category::Other => ColorTag(100, 116, 139),
        }
    }

    /// The extensions that map to this category. Empty for `Other`.
    pub fn extensions(self) -> &'static [&'static str] {
        CATEGORY_TABLE
            .iter()
            .find(|(category, _)| *category == self)
            .map(|(_, exts)| *exts)
            .unwrap_or(&[])
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies an extension. Case-insensitive, a leading dot is ignored, and
/// anything unrecognized (including the empty string) is `Other`.
pub fn classify(extension: &str) -> Classification {
    let ext = extension.trim_start_matches('.').to_lowercase();
    let category = CATEGORY_TABLE
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other);

    Classification {
        category,
        icon: category.icon(),
        color: category.color(),
    }
}

/// Classifies a path by its extension.
pub fn classify_path(path: &Path) -> Classification {
    classify(
        path.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default(),
    )
}
