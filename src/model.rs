use serde::{Deserialize, Serialize};

/// One travel album, backed by a remote Drive folder.
///
/// `id` is derived deterministically from the folder name (see [`slugify`]),
/// so cached and freshly fetched copies of the same album compare equal on
/// `id` even when other fields changed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Album {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default, rename = "folderId")]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
}

impl Album {
    /// Albums without coordinates are listed but never placed on the map.
    pub fn has_location(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

/// One media file from an album's manifest.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GalleryItem {
    pub name: String,
    pub id: String,
    pub mime: String,
    pub size: u64,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub src: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MediaKind {
    Image,
    Video,
}

impl GalleryItem {
    pub fn media_kind(&self) -> MediaKind {
        media_kind_of(&self.mime)
    }
}

/// Classifies a manifest MIME string. Anything that is not a video is
/// treated as an image, matching how the gallery groups its sections.
pub fn media_kind_of(mime_str: &str) -> MediaKind {
    match mime_str.parse::<mime::Mime>() {
        Ok(m) if m.type_() == mime::VIDEO => MediaKind::Video,
        Ok(_) => MediaKind::Image,
        // Manifest entries occasionally carry malformed types; fall back to
        // the same prefix test the endpoint itself uses.
        Err(_) if mime_str.starts_with("video/") => MediaKind::Video,
        Err(_) => MediaKind::Image,
    }
}

/// Derives the URL-safe album id from a folder name, exactly as the listing
/// endpoint does: lowercase, runs of non-alphanumerics collapsed to `-`.
pub fn slugify(folder_name: &str) -> String {
    let mut slug = String::with_capacity(folder_name.len());
    let mut pending_dash = false;
    for c in folder_name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Reverses [`slugify`] approximately, for a provisional title while the
/// real album record is still loading: `paris-2023` becomes `Paris 2023`.
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_matches_endpoint_derivation() {
        assert_eq!(slugify("Paris Trip 2023"), "paris-trip-2023");
        assert_eq!(slugify("  Ein Gedi (Oct 2025) "), "ein-gedi-oct-2025");
        assert_eq!(slugify("Tel-Aviv"), "tel-aviv");
    }

    #[test]
    fn slugify_is_stable_across_repeated_calls() {
        let name = "Dead Sea, March 2024";
        assert_eq!(slugify(name), slugify(name));
    }

    #[test]
    fn provisional_title_from_slug() {
        assert_eq!(title_from_slug("paris-2023"), "Paris 2023");
        assert_eq!(title_from_slug("ein-gedi"), "Ein Gedi");
    }

    #[test]
    fn media_kind_prefix_test() {
        assert_eq!(media_kind_of("video/mp4"), MediaKind::Video);
        assert_eq!(media_kind_of("image/jpeg"), MediaKind::Image);
        assert_eq!(media_kind_of("application/octet-stream"), MediaKind::Image);
        assert_eq!(media_kind_of("video/"), MediaKind::Video);
    }

    #[test]
    fn album_without_coordinates_is_not_mappable() {
        let album = Album {
            id: "x".into(),
            title: "X".into(),
            date: None,
            description: None,
            lat: Some(1.0),
            lng: None,
            folder_id: None,
            cover: None,
        };
        assert!(!album.has_location());
    }
}
