//! Palette recoloring and palette classification for themed event images
//!
//! [`convert_image`] recolors PNG, JPEG or GIF input with a theme palette;
//! [`check_image`] scores how much of an image is made of palette colors.
//! Both take a [`Registry`] built once with [`Registry::builtin`].

pub mod animation;
pub mod classify;
pub mod color;
pub mod edge;
pub mod error;
pub mod image_processing;
pub mod palette;
pub mod remap;
pub mod themes;
pub mod variation;

pub use classify::{Classification, ColorShare};
pub use error::RemapError;
pub use image_processing::{
    check_image, check_image_with, convert_image, ConvertedImage, OutputFormat,
};
pub use palette::Registry;
pub use remap::Method;
