//! Parsing of `name` and `name@gallery` model references.

use std::fmt;
use std::str::FromStr;

use crate::config::GalleryConfig;
use crate::error::{GalleryError, Result};

/// A model reference, optionally pinned to one catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryReference {
    pub name: String,
    pub gallery: Option<String>,
}

impl GalleryReference {
    /// Parse a reference. The gallery is whatever follows the last `@`.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(GalleryError::validation("reference", "must not be empty"));
        }

        match reference.rsplit_once(GalleryConfig::REFERENCE_SEPARATOR) {
            Some((name, gallery)) => {
                let (name, gallery) = (name.trim(), gallery.trim());
                if name.is_empty() || gallery.is_empty() {
                    return Err(GalleryError::validation(
                        "reference",
                        format!("'{}' is not of the form name@gallery", reference),
                    ));
                }
                Ok(Self {
                    name: name.to_string(),
                    gallery: Some(gallery.to_string()),
                })
            }
            None => Ok(Self {
                name: reference.to_string(),
                gallery: None,
            }),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.gallery.is_some()
    }
}

impl FromStr for GalleryReference {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for GalleryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.gallery {
            Some(gallery) => write!(
                f,
                "{}{}{}",
                self.name,
                GalleryConfig::REFERENCE_SEPARATOR,
                gallery
            ),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name() {
        let r = GalleryReference::parse("llama").unwrap();
        assert_eq!(r.name, "llama");
        assert!(!r.is_qualified());
    }

    #[test]
    fn test_qualified_name() {
        let r: GalleryReference = "llama@default".parse().unwrap();
        assert_eq!(r.name, "llama");
        assert_eq!(r.gallery.as_deref(), Some("default"));
        assert_eq!(r.to_string(), "llama@default");
    }

    #[test]
    fn test_last_separator_wins() {
        let r = GalleryReference::parse("org@model@local").unwrap();
        assert_eq!(r.name, "org@model");
        assert_eq!(r.gallery.as_deref(), Some("local"));
    }

    #[test]
    fn test_malformed_references() {
        for bad in ["", "   ", "@default", "llama@", "@"] {
            let err = GalleryReference::parse(bad).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation, "{bad:?}");
        }
    }
}
