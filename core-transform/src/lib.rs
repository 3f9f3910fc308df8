//! # Transformation Encoder
//!
//! Pure mapping from typed image-edit options to Transform-provider delivery
//! URLs. No I/O and no error path: the presentation layer re-derives a
//! preview URL from options state on every change.
//!
//! ```
//! use core_transform::{CropMode, TransformEncoder, TransformationOptions};
//!
//! let encoder = TransformEncoder::new("demo");
//! let options = TransformationOptions::new()
//!     .resize(320, 240)
//!     .with_crop(CropMode::Fill);
//!
//! assert_eq!(
//!     encoder.encode("sample.jpg", &options),
//!     "https://res.cloudinary.com/demo/image/upload/w_320,h_240,c_fill/sample.jpg"
//! );
//! ```

pub mod encoder;
pub mod options;

pub use encoder::{encode_tokens, TransformEncoder};
pub use options::{
    ArtisticEffect, CropMode, Gravity, ImageOverlay, NamedFilter, Optimization, Radius, Rotation,
    TextOverlay, TransformationOptions,
};
