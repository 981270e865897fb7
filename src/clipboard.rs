//! Copying the share link with whatever clipboard tool the platform has.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use linkcal_core::StatusBoard;

pub const COPIED: &str = "Link copied to clipboard";
pub const COPY_FAILED: &str = "Failed to copy link";

/// Copy tools to try, in order, with the arguments that make them read stdin.
const TOOLS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("clip.exe", &[]),
    ("clip", &[]),
];

#[derive(Debug)]
pub enum ClipboardError {
    /// None of the known copy tools is installed.
    NoTool,
    Io(std::io::Error),
    /// The copy tool exited unsuccessfully.
    Failed(PathBuf, std::process::ExitStatus),
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipboardError::NoTool => write!(f, "No clipboard tool found"),
            ClipboardError::Io(e) => write!(f, "Clipboard I/O error: {}", e),
            ClipboardError::Failed(tool, status) => {
                write!(f, "{} exited with {}", tool.display(), status)
            }
        }
    }
}

impl std::error::Error for ClipboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClipboardError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClipboardError {
    fn from(e: std::io::Error) -> Self {
        ClipboardError::Io(e)
    }
}

/// The first available copy tool and its arguments.
fn find_tool() -> Option<(PathBuf, &'static [&'static str])> {
    TOOLS
        .iter()
        .find_map(|(name, args)| which::which(name).ok().map(|path| (path, *args)))
}

/// Writes `text` to the system clipboard.
pub async fn copy(text: &str) -> Result<(), ClipboardError> {
    let (tool, args) = find_tool().ok_or(ClipboardError::NoTool)?;
    tracing::debug!("Copying with {}", tool.display());

    let mut child = Command::new(&tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
        // Closing stdin lets the tool finish
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(ClipboardError::Failed(tool, status));
    }
    Ok(())
}

/// Copies the share link and reports the outcome on the status line.
pub async fn copy_link(link: &str, status: &StatusBoard) -> bool {
    match copy(link).await {
        Ok(()) => {
            status.info(COPIED);
            true
        }
        Err(e) => {
            tracing::warn!("Clipboard write failed: {}", e);
            status.error(COPY_FAILED);
            false
        }
    }
}
