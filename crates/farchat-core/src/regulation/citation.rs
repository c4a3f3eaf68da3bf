//! Citation URLs
//!
//! Maps a regulation code plus section number to its acquisition.gov page.

/// Known regulation codes and their acquisition.gov base URLs
const REGULATION_URLS: &[(&str, &str)] = &[
    ("FAR", "https://www.acquisition.gov/far/"),
    ("DFARS", "https://www.acquisition.gov/dfars/"),
    ("VAAR", "https://www.acquisition.gov/vaar/"),
    ("GSAM", "https://www.acquisition.gov/gsam/"),
    ("AFARS", "https://www.acquisition.gov/afars/"),
    ("DARS", "https://www.acquisition.gov/dars/"),
    ("DLAD", "https://www.acquisition.gov/dlad/"),
    ("DOLAR", "https://www.acquisition.gov/dolar/"),
    ("DOSAR", "https://www.acquisition.gov/dosar/"),
    ("EDAR", "https://www.acquisition.gov/edar/"),
    ("EPAAR", "https://www.acquisition.gov/epaar/"),
    ("HHSAR", "https://www.acquisition.gov/hhsar/"),
    ("HSAR", "https://www.acquisition.gov/hsar/"),
    ("HUDAR", "https://www.acquisition.gov/hudar/"),
    ("IAAR", "https://www.acquisition.gov/iaar/"),
    ("JAR", "https://www.acquisition.gov/jar/"),
    ("LIFAR", "https://www.acquisition.gov/lifar/"),
    ("NFS", "https://www.acquisition.gov/nfs/"),
    ("NRCAR", "https://www.acquisition.gov/nrcar/"),
    ("TAR", "https://www.acquisition.gov/tar/"),
    ("TRANSFAR", "https://www.acquisition.gov/transfar/"),
    ("AIDAR", "https://www.acquisition.gov/aidar/"),
    ("AGAR", "https://www.acquisition.gov/agar/"),
    ("CAR", "https://www.acquisition.gov/car/"),
    ("DEAR", "https://www.acquisition.gov/dear/"),
    ("DIAR", "https://www.acquisition.gov/diar/"),
];

fn base_url(regulation: &str) -> Option<&'static str> {
    let code = regulation.trim().to_uppercase();
    REGULATION_URLS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, url)| *url)
}

/// Canonical URL for `section` of `regulation`.
///
/// The code is matched case-insensitively after trimming. The section is
/// lowercased with every whitespace run replaced by a single hyphen.
/// Unknown codes log a warning and return `None`.
///
/// ```
/// use farchat_core::regulation::citation_url;
///
/// assert_eq!(
///     citation_url("FAR", "52.212-1").as_deref(),
///     Some("https://www.acquisition.gov/far/52.212-1"),
/// );
/// assert_eq!(citation_url("XYZ", "1.1"), None);
/// ```
pub fn citation_url(regulation: &str, section: &str) -> Option<String> {
    let Some(base) = base_url(regulation) else {
        tracing::warn!(regulation = %regulation, "Unknown regulation type");
        return None;
    };

    Some(format!("{base}{}", format_section(section)))
}

/// Whether `regulation` is a recognised code
pub fn is_known_regulation(regulation: &str) -> bool {
    base_url(regulation).is_some()
}

fn format_section(section: &str) -> String {
    let mut formatted = String::with_capacity(section.len());
    let mut in_whitespace = false;

    for ch in section.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                formatted.push('-');
            }
            in_whitespace = true;
        } else {
            formatted.extend(ch.to_lowercase());
            in_whitespace = false;
        }
    }

    formatted
}
