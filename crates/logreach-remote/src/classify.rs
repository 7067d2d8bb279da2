use logreach_types::PathType;

/// Known image file extensions
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tif", "tiff",
];

/// Known text/log file extensions
pub const TEXT_EXTENSIONS: &[&str] = &["log", "txt", "md"];

/// Guess the content type of a path or glob from extension hints.
///
/// Checks image extensions first, then text extensions, anywhere in the
/// pattern (wildcard suffix, plain suffix or inline token); defaults to
/// [`PathType::Text`]. This is a heuristic; callers may pin a type
/// explicitly instead.
pub fn classify(pattern: &str) -> PathType {
    let p = pattern.to_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| has_extension(&p, ext)) {
        return PathType::Image;
    }
    if TEXT_EXTENSIONS.iter().any(|ext| has_extension(&p, ext)) {
        return PathType::Text;
    }
    PathType::Text
}

fn has_extension(pattern: &str, ext: &str) -> bool {
    pattern.contains(&format!("*.{ext}"))
        || pattern.ends_with(&format!(".{ext}"))
        || pattern.contains(&format!(".{ext}"))
}

/// Extension set used to filter listed file names by resolved kind
#[derive(Clone, Copy, Debug)]
pub struct ExtensionFilter(&'static [&'static str]);

impl ExtensionFilter {
    /// True when `name` carries one of the set's extensions
    pub fn matches(&self, name: &str) -> bool {
        name_has_extension(name, self.0)
    }
}

/// The extension set matching a resolved path type
pub fn name_extensions_for(kind: PathType) -> ExtensionFilter {
    match kind {
        PathType::Image => ExtensionFilter(IMAGE_EXTENSIONS),
        PathType::Text => ExtensionFilter(TEXT_EXTENSIONS),
    }
}

/// True when `name` carries one of the extensions, case-insensitively
fn name_has_extension(name: &str, extensions: &[&str]) -> bool {
    let lower = name.to_lowercase();
    extensions
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}
