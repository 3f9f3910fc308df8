//! Typed transformation options
//!
//! Every knob the edit panel exposes is a named field. All fields are
//! optional and independent; unset fields contribute nothing to the encoded
//! URL. Options deserialize from the camelCase JSON the UI keeps in state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformationOptions {
    // Geometry
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Ratio such as `16:9` or `1.5`
    pub aspect_ratio: Option<String>,

    pub crop: Option<CropMode>,
    pub gravity: Option<Gravity>,
    /// Target format extension (`webp`, `png`, ...)
    pub format: Option<String>,
    /// 1..=100
    pub quality: Option<u8>,
    /// Raw effect directive, e.g. `blur:300`
    pub effect: Option<String>,
    pub radius: Option<Radius>,
    pub angle: Option<Rotation>,
    /// 0..=100
    pub opacity: Option<u8>,
    pub background: Option<String>,
    pub color: Option<String>,
    pub density: Option<u32>,

    /// Named one-word filters, encoded in canonical order
    pub filters: BTreeSet<NamedFilter>,

    pub text: Option<TextOverlay>,
    pub overlay: Option<ImageOverlay>,
    pub artistic: Option<ArtisticEffect>,

    pub optimize: Optimization,
}

impl TransformationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resize(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_crop(mut self, crop: CropMode) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = Some(gravity);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_filter(mut self, filter: NamedFilter) -> Self {
        self.filters.insert(filter);
        self
    }

    pub fn with_text(mut self, text: TextOverlay) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_overlay(mut self, overlay: ImageOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    Scale,
    Fit,
    Limit,
    Mfit,
    Fill,
    Lfill,
    Pad,
    Lpad,
    Crop,
    Thumb,
}

impl CropMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropMode::Scale => "scale",
            CropMode::Fit => "fit",
            CropMode::Limit => "limit",
            CropMode::Mfit => "mfit",
            CropMode::Fill => "fill",
            CropMode::Lfill => "lfill",
            CropMode::Pad => "pad",
            CropMode::Lpad => "lpad",
            CropMode::Crop => "crop",
            CropMode::Thumb => "thumb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    Auto,
    Center,
    Face,
    Faces,
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Gravity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gravity::Auto => "auto",
            Gravity::Center => "center",
            Gravity::Face => "face",
            Gravity::Faces => "faces",
            Gravity::North => "north",
            Gravity::South => "south",
            Gravity::East => "east",
            Gravity::West => "west",
            Gravity::NorthEast => "north_east",
            Gravity::NorthWest => "north_west",
            Gravity::SouthEast => "south_east",
            Gravity::SouthWest => "south_west",
        }
    }
}

/// Corner rounding: `{"pixels": 20}` or `"max"` for a circle/ellipse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Radius {
    Pixels(u32),
    Max,
}

/// Rotation or orientation change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Degrees(i32),
    /// Rotate to match EXIF orientation, clockwise when ambiguous
    AutoRight,
    AutoLeft,
    Hflip,
    Vflip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedFilter {
    Grayscale,
    Blackwhite,
    Sepia,
    Negate,
    Sharpen,
    Pixelate,
    Vignette,
    Cartoonify,
    Improve,
    AutoBrightness,
    AutoContrast,
    AutoColor,
}

impl NamedFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamedFilter::Grayscale => "grayscale",
            NamedFilter::Blackwhite => "blackwhite",
            NamedFilter::Sepia => "sepia",
            NamedFilter::Negate => "negate",
            NamedFilter::Sharpen => "sharpen",
            NamedFilter::Pixelate => "pixelate",
            NamedFilter::Vignette => "vignette",
            NamedFilter::Cartoonify => "cartoonify",
            NamedFilter::Improve => "improve",
            NamedFilter::AutoBrightness => "auto_brightness",
            NamedFilter::AutoContrast => "auto_contrast",
            NamedFilter::AutoColor => "auto_color",
        }
    }
}

pub const DEFAULT_FONT_FAMILY: &str = "Arial";
pub const DEFAULT_FONT_SIZE: u32 = 32;

/// Text drawn over the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextOverlay {
    pub text: String,
    pub font_family: String,
    pub font_size: u32,
    /// `bold`, `italic`, ...
    pub font_style: Option<String>,
    pub color: Option<String>,
    pub gravity: Option<Gravity>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    /// Wrap width for long captions
    pub width: Option<u32>,
    pub opacity: Option<u8>,
}

impl TextOverlay {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            font_style: None,
            color: None,
            gravity: None,
            x: None,
            y: None,
            width: None,
            opacity: None,
        }
    }
}

/// Another uploaded asset layered on top
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageOverlay {
    /// Asset id of the layer, folders separated by `/`
    pub public_id: String,
    pub gravity: Option<Gravity>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub opacity: Option<u8>,
}

impl ImageOverlay {
    pub fn new(public_id: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
            ..Self::default()
        }
    }
}

/// One of the provider's artistic filters (`e_art:<filter>`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArtisticEffect {
    /// Filter name such as `zorro`, `audrey` or `incognito`
    pub filter: String,
}

impl ArtisticEffect {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Optimization {
    pub auto_format: bool,
    pub auto_quality: bool,
    pub progressive: bool,
    pub strip_profile: bool,
}

impl Optimization {
    pub fn all() -> Self {
        Self {
            auto_format: true,
            auto_quality: true,
            progressive: true,
            strip_profile: true,
        }
    }
}
