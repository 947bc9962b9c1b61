//! Output formatting for CLI commands.
//!
//! Results go to stdout as text or JSON; errors go to stderr.

use anyhow::Result;
use serde::Serialize;
use shelf_core::{DeleteReport, FileLeaf, FolderId, Listing, PageMove, VertexRef};
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write `data` as JSON, or the text produced by `text_fn`.
    ///
    /// `text_fn` only runs in text mode.
    pub fn write<T: Serialize>(
        &self,
        data: &T,
        text_fn: impl FnOnce() -> String,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error to stderr, as a JSON body with `success: false` in
    /// JSON mode.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init`.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub chat_id: i64,
    pub root: FolderId,
    pub database: String,
}

/// Output for `ls`.
#[derive(Debug, Serialize)]
pub struct LsOutput {
    pub success: bool,
    pub result_code: u8,
    #[serde(flatten)]
    pub listing: Listing,
}

/// Output for `mkdir` and `add-file`.
#[derive(Debug, Serialize)]
pub struct CreatedOutput {
    pub success: bool,
    pub result_code: u8,
    pub created: VertexRef,
    pub name: String,
}

/// Output for `cd` and `back`.
#[derive(Debug, Serialize)]
pub struct MoveOutput {
    pub success: bool,
    pub result_code: u8,
    pub moved: bool,
    pub folder: FolderId,
    pub path: String,
}

/// Output for `page`.
#[derive(Debug, Serialize)]
pub struct PageOutput {
    pub success: bool,
    pub result_code: u8,
    pub result: PageMove,
}

/// Output for `rm`.
#[derive(Debug, Serialize)]
pub struct RmOutput {
    pub success: bool,
    pub result_code: u8,
    pub removed: VertexRef,
    #[serde(flatten)]
    pub report: DeleteReport,
}

/// Output for `delete-mode`.
#[derive(Debug, Serialize)]
pub struct DeleteModeOutput {
    pub success: bool,
    pub result_code: u8,
    pub delete_mode: bool,
}

/// Output for `note`.
#[derive(Debug, Serialize)]
pub struct NoteOutput {
    pub success: bool,
    pub result_code: u8,
    pub folder: FolderId,
    pub head_text: String,
}

/// Output for `link`.
#[derive(Debug, Serialize)]
pub struct LinkOutput {
    pub success: bool,
    pub result_code: u8,
    pub folder: FolderId,
    pub link: String,
}

/// Output for `attach`.
#[derive(Debug, Serialize)]
pub struct AttachOutput {
    pub success: bool,
    pub result_code: u8,
    pub folder: FolderId,
    pub name: String,
}

/// Output for `file`.
#[derive(Debug, Serialize)]
pub struct FileOutput {
    pub success: bool,
    pub result_code: u8,
    #[serde(flatten)]
    pub file: FileLeaf,
}

/// Render a listing the way `ls` prints it.
pub fn render_listing(listing: &Listing) -> String {
    let mut out = String::new();

    let mut flags = Vec::new();
    if listing.private {
        flags.push("private".to_string());
    }
    if listing.share_count > 1 {
        flags.push(format!("shared x{}", listing.share_count));
    }
    if !listing.editable {
        flags.push("read-only".to_string());
    }
    if listing.delete_mode {
        flags.push("delete mode".to_string());
    }

    out.push_str(&format!("{} (F:{})", listing.name, listing.folder));
    if !flags.is_empty() {
        out.push_str(&format!(" [{}]", flags.join(", ")));
    }
    out.push('\n');

    if !listing.head_text.is_empty() {
        out.push_str(&listing.head_text);
        out.push('\n');
    }

    if listing.entries.is_empty() {
        out.push_str("  (empty)\n");
        return out;
    }

    for entry in &listing.entries {
        let suffix = match entry.reference {
            VertexRef::Folder(_) => "/",
            VertexRef::File(_) => "",
        };
        out.push_str(&format!(
            "  {:<8} {}{}\n",
            entry.reference.to_string(),
            entry.name,
            suffix
        ));
    }

    if listing.page_count > 1 {
        out.push_str(&format!(
            "page {}/{} ({} entries)\n",
            listing.page, listing.page_count, listing.total
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::{FileId, ListingEntry};

    fn listing(entries: Vec<ListingEntry>) -> Listing {
        Listing {
            folder: FolderId(1),
            name: "alice".to_string(),
            head_text: String::new(),
            private: true,
            share_count: 1,
            is_root: true,
            editable: true,
            delete_mode: false,
            page: 1,
            page_count: 1,
            total: entries.len(),
            entries,
        }
    }

    #[test]
    fn test_render_empty_listing() {
        let text = render_listing(&listing(Vec::new()));
        assert_eq!(text, "alice (F:1) [private]\n  (empty)\n");
    }

    #[test]
    fn test_render_entries() {
        let text = render_listing(&listing(vec![
            ListingEntry {
                reference: VertexRef::Folder(FolderId(2)),
                name: "Trips".to_string(),
            },
            ListingEntry {
                reference: VertexRef::File(FileId(3)),
                name: "scan".to_string(),
            },
        ]));
        assert!(text.contains("F:2      Trips/\n"));
        assert!(text.contains("D:3      scan\n"));
        assert!(!text.contains("page"));
    }

    #[test]
    fn test_json_listing_is_flattened() {
        let output = LsOutput {
            success: true,
            result_code: 0,
            listing: listing(Vec::new()),
        };
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["name"], "alice");
        assert_eq!(value["folder"], 1);
        assert_eq!(value["success"], true);
    }
}
