use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};

/// Body for `POST /images/generate`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateImageRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl GenerateImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// A generated image, delivered as a base64 payload.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedImage {
    #[serde(alias = "image", alias = "image_data")]
    pub image_base64: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl GeneratedImage {
    /// Decode the payload into raw image bytes.
    /// Accepts both a bare base64 string and a `data:<mime>;base64,` URL.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let payload = match self.image_base64.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => self.image_base64.as_str(),
        };
        STANDARD.decode(payload.trim())
    }

    /// File extension suggested by the payload, defaulting to png.
    /// Only plain ASCII alphanumeric extensions are accepted.
    pub fn extension(&self) -> &str {
        let candidate = match self.format {
            Some(ref format) => Some(format.trim_start_matches('.')),
            None => self
                .image_base64
                .strip_prefix("data:image/")
                .and_then(|rest| rest.split(';').next()),
        };
        match candidate {
            Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => ext,
            _ => "png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStyle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Styles offered by `GET /images/styles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageStyles {
    pub styles: Vec<ImageStyle>,
}

impl<'de> Deserialize<'de> for ImageStyles {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StyleEntry {
            Full(ImageStyle),
            Name(String),
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Wrapped { styles: Vec<StyleEntry> },
            Bare(Vec<StyleEntry>),
        }

        let entries = match Wire::deserialize(deserializer)? {
            Wire::Wrapped { styles } => styles,
            Wire::Bare(styles) => styles,
        };

        let styles = entries
            .into_iter()
            .map(|entry| match entry {
                StyleEntry::Full(style) => style,
                StyleEntry::Name(name) => ImageStyle {
                    id: name.clone(),
                    name,
                    description: None,
                },
            })
            .collect();

        Ok(Self { styles })
    }
}

/// Availability of the generation backend, from `GET /images/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageServiceStatus {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_skips_absent_fields() {
        let body = serde_json::to_value(GenerateImageRequest::new("a lighthouse"))
            .expect("request should serialize");
        assert_eq!(body, serde_json::json!({ "prompt": "a lighthouse" }));

        let body = serde_json::to_value(
            GenerateImageRequest::new("a lighthouse").with_style("watercolor").with_size(512, 512),
        )
        .expect("request should serialize");
        assert_eq!(body["style"], "watercolor");
        assert_eq!(body["width"], 512);
    }

    #[test]
    fn test_generated_image_decode_plain_and_data_url() {
        let plain: GeneratedImage = serde_json::from_str(r#"{"image_base64":"aGVsbG8="}"#)
            .expect("image should parse");
        assert_eq!(plain.decode().expect("valid base64"), b"hello");
        assert_eq!(plain.extension(), "png");

        let data_url: GeneratedImage =
            serde_json::from_str(r#"{"image":"data:image/jpeg;base64,aGVsbG8=","prompt":"p"}"#)
                .expect("image should parse");
        assert_eq!(data_url.decode().expect("valid base64"), b"hello");
        assert_eq!(data_url.extension(), "jpeg");
    }

    #[test]
    fn test_generated_image_extension_is_sanitized() {
        let svg: GeneratedImage =
            serde_json::from_str(r#"{"image_base64":"data:image/svg+xml;base64,aGVsbG8="}"#)
                .expect("image should parse");
        assert_eq!(svg.extension(), "png");

        let traversal: GeneratedImage =
            serde_json::from_str(r#"{"image_base64":"aGVsbG8=","format":"../../etc/x"}"#)
                .expect("image should parse");
        assert_eq!(traversal.extension(), "png");

        let webp: GeneratedImage = serde_json::from_str(r#"{"image_base64":"aGVsbG8=","format":".webp"}"#)
            .expect("image should parse");
        assert_eq!(webp.extension(), "webp");
    }

    #[test]
    fn test_generated_image_decode_rejects_garbage() {
        let image: GeneratedImage = serde_json::from_str(r#"{"image_base64":"!!not base64!!"}"#)
            .expect("image should parse");
        assert!(image.decode().is_err());
    }

    #[test]
    fn test_image_styles_accepts_all_shapes() {
        let full: ImageStyles = serde_json::from_str(
            r#"{"styles":[{"id":"photo","name":"Photographic","description":"Realistic"}]}"#,
        )
        .expect("styles should parse");
        assert_eq!(full.styles[0].name, "Photographic");

        let names: ImageStyles = serde_json::from_str(r#"{"styles":["anime","sketch"]}"#)
            .expect("styles should parse");
        assert_eq!(names.styles.len(), 2);
        assert_eq!(names.styles[1].id, "sketch");

        let bare: ImageStyles = serde_json::from_str(r#"["pixel"]"#).expect("styles should parse");
        assert_eq!(bare.styles[0].name, "pixel");
    }
}
