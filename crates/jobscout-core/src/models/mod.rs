//! Data models for the jobscout service.
//!
//! - `Profile`, `AccessToken`, `TokenResponse`: authentication and identity
//! - Image types: `GenerateImageRequest`, `GeneratedImage`, `ImageStyles`,
//!   `ImageServiceStatus`

pub mod image;
pub mod profile;

pub use image::{GenerateImageRequest, GeneratedImage, ImageServiceStatus, ImageStyle, ImageStyles};
pub use profile::{AccessToken, Credentials, Profile, TokenResponse};
