use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::info;

use super::JobError;
use crate::task::FileRef;

const EXPORT_FORMATS: &[(&str, &str)] = &[
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("pdf", "application/pdf"),
];

/// Document export via the pandoc binary.
pub struct PandocExporter {
    binary: PathBuf,
}

impl PandocExporter {
    pub fn new() -> Self {
        let binary = std::env::var("ADOC_PANDOC_PATH").unwrap_or_else(|_| "pandoc".to_string());
        Self {
            binary: PathBuf::from(binary),
        }
    }

    /// Renders the markdown body into one file per export format inside
    /// `out_dir`, named after the document title.
    pub async fn export(
        &self,
        title: &str,
        markdown: &str,
        out_dir: &Path,
    ) -> Result<Vec<FileRef>, JobError> {
        let mut source = tempfile::Builder::new()
            .suffix(".md")
            .tempfile()
            .map_err(|e| JobError::Fatal(format!("failed to create scratch file: {}", e)))?;
        source
            .write_all(markdown.as_bytes())
            .and_then(|_| source.flush())
            .map_err(|e| JobError::Fatal(format!("failed to write scratch file: {}", e)))?;

        let stem = slugify(title);
        let mut artifacts = Vec::with_capacity(EXPORT_FORMATS.len());

        for (ext, media_type) in EXPORT_FORMATS {
            let name = format!("{}.{}", stem, ext);
            let out_path = out_dir.join(&name);

            let output = Command::new(&self.binary)
                .arg(source.path())
                .arg("--standalone")
                .arg("-o")
                .arg(&out_path)
                .stdin(std::process::Stdio::null())
                .output()
                .await
                .map_err(|e| JobError::Fatal(format!("failed to run pandoc: {}", e)))?;

            if !output.status.success() {
                let tail = last_stderr_line(&output.stderr)
                    .unwrap_or_else(|| "pandoc failed without stderr".to_string());
                return Err(JobError::Fatal(format!(
                    "pandoc export to {} failed: {}",
                    ext, tail
                )));
            }

            info!("Exported {:?}", out_path);
            artifacts.push(FileRef {
                name,
                path: out_path,
                media_type: (*media_type).to_string(),
            });
        }

        Ok(artifacts)
    }
}

impl Default for PandocExporter {
    fn default() -> Self {
        Self::new()
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug.to_string()
    }
}

fn last_stderr_line(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
}
