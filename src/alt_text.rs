use lazy_static::lazy_static;
use regex::Regex;

use crate::model::GalleryItem;

lazy_static! {
    static ref EXTENSION: Regex = Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|mp4|mov|avi)$").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[-_]").unwrap();
    static ref CAMERA_PREFIX: Regex = Regex::new(r"(?i)^(img|dsc|dcim|photo|image|vid|video)[\s_-]*").unwrap();
    static ref DATE_RUN: Regex = Regex::new(r"\d{4}[-_]?\d{2}[-_]?\d{2}").unwrap();
    static ref TIMESTAMP_RUN: Regex = Regex::new(r"\d{6,}").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Accessible label for a gallery item: a manually supplied description wins
/// verbatim; otherwise a readable label is derived from the filename.
pub fn alt_text_for(item: &GalleryItem, album_title: &str) -> String {
    match &item.description {
        Some(description) if !description.trim().is_empty() => description.clone(),
        _ => derive_from_filename(&item.name, album_title),
    }
}

/// Strips camera-filename conventions (IMG/DSC prefixes, date and timestamp
/// digit runs, separators) and capitalizes what is left. When nothing
/// readable survives, falls back to a generic label.
pub fn derive_from_filename(filename: &str, album_title: &str) -> String {
    if filename.is_empty() {
        return generic_label(album_title);
    }

    let name = EXTENSION.replace(filename, "");
    let name = SEPARATORS.replace_all(&name, " ");
    let name = CAMERA_PREFIX.replace(&name, "");
    let name = DATE_RUN.replace_all(&name, "");
    let name = TIMESTAMP_RUN.replace_all(&name, "");
    let name = WHITESPACE.replace_all(&name, " ");
    let name = name.trim();

    if name.is_empty() {
        return generic_label(album_title);
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => generic_label(album_title),
    }
}

fn generic_label(album_title: &str) -> String {
    if album_title.is_empty() {
        "Photo".to_string()
    } else {
        format!("Photo from {}", album_title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, description: Option<&str>) -> GalleryItem {
        GalleryItem {
            name: name.into(),
            id: "file-1".into(),
            mime: "image/jpeg".into(),
            size: 1024,
            created: None,
            description: description.map(Into::into),
            src: "https://example.com/file-1".into(),
        }
    }

    #[test]
    fn manual_description_wins_verbatim() {
        let it = item("IMG_20230815_142233.jpg", Some("Sunset over the Seine"));
        assert_eq!(alt_text_for(&it, "Paris 2023"), "Sunset over the Seine");
    }

    #[test]
    fn camera_filename_yields_readable_fallback() {
        let label = derive_from_filename("IMG_20230815_142233.jpg", "Paris 2023");
        assert!(!label.is_empty());
        assert!(!label.contains("IMG"));
        assert!(!label.contains("20230815"));
        assert!(!label.contains("142233"));
        assert_eq!(label, "Photo from Paris 2023");
    }

    #[test]
    fn descriptive_filename_survives_cleanup() {
        assert_eq!(
            derive_from_filename("beach-sunset-family.jpg", "Paris 2023"),
            "Beach sunset family"
        );
    }

    #[test]
    fn date_only_filename_falls_back_without_album() {
        assert_eq!(derive_from_filename("DSC_20230815.jpg", ""), "Photo");
    }

    #[test]
    fn empty_description_does_not_win() {
        let it = item("beach.jpg", Some("   "));
        assert_eq!(alt_text_for(&it, ""), "Beach");
    }
}
