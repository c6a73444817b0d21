/*!
 * Extension to category lookup
 */

/// Category used when neither the extension nor the file name says anything
pub const DEFAULT_CATEGORY: &str = "General";

/// Resolve a category label for a file.
///
/// `extension` is matched case-insensitively with its leading dot. When the
/// extension is unknown, a few file-name keywords are tried before falling
/// back to [`DEFAULT_CATEGORY`].
pub fn categorize(extension: &str, file_name: &str) -> &'static str {
    if let Some(category) = by_extension(extension) {
        return category;
    }

    let lower = file_name.to_lowercase();
    if lower.contains("invoice") || lower.contains("receipt") {
        return "Finance";
    }
    if lower.contains("contract") || lower.contains("legal") {
        return "Legal";
    }
    if lower.contains("backup") || lower.contains("archive") {
        return "Backups";
    }

    DEFAULT_CATEGORY
}

fn by_extension(extension: &str) -> Option<&'static str> {
    let category = match extension.to_ascii_lowercase().as_str() {
        ".doc" | ".docx" | ".pdf" | ".txt" => "Documents",
        ".xls" | ".xlsx" | ".csv" => "Spreadsheets",
        ".ppt" | ".pptx" => "Presentations",
        ".zip" | ".rar" | ".7z" | ".tar" | ".gz" => "Archives",
        ".mp4" | ".mov" | ".avi" | ".mkv" => "Video",
        ".mp3" | ".wav" | ".flac" => "Audio",
        ".cs" | ".js" | ".ts" | ".java" | ".py" => "SourceCode",
        ".exe" | ".msi" | ".dll" => "Software",
        ".bat" => "Automation",
        _ => return None,
    };
    Some(category)
}
