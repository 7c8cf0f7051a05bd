//! Extraction of generated files from a code listing.
//!
//! A listing names each file on its own line, immediately followed by a fenced
//! code block:
//!
//! ````text
//! main.py
//! ```python
//! print("hello")
//! ```
//! ````

use regex::Regex;
use std::result::Result as StdResult;
use std::sync::LazyLock;

use crate::env::ProducedFile;

/// Filename line (optionally decorated) followed by a fenced block.
static FILE_BLOCK: LazyLock<StdResult<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:FILENAME:?[ \t]*)?[`*#\s]*([A-Za-z0-9_][A-Za-z0-9_./-]*\.[A-Za-z0-9]+)[`*]*[ \t]*:?[ \t]*\r?\n```[^\n]*\n((?s:.*?))^[ \t]*```",
    )
});

/// Parses every named file out of `listing`.
///
/// Later blocks for the same path replace earlier ones while keeping the
/// first position. Paths that are absolute or climb out of the project
/// directory are skipped.
pub fn parse_files(listing: &str) -> Vec<ProducedFile> {
    let Ok(pattern) = FILE_BLOCK.as_ref() else {
        return Vec::new();
    };

    let mut files: Vec<ProducedFile> = Vec::new();
    for caps in pattern.captures_iter(listing) {
        let (Some(path), Some(body)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let path = path.as_str();
        if !is_safe_path(path) {
            tracing::warn!(path, "skipping generated file with unsafe path");
            continue;
        }
        let content = body.as_str().to_owned();
        if let Some(existing) = files.iter_mut().find(|file| file.path == path) {
            existing.content = content;
        } else {
            files.push(ProducedFile {
                path: path.to_owned(),
                content,
            });
        }
    }
    files
}

/// Renders files back into a listing that [`parse_files`] accepts.
pub fn render_listing(files: &[ProducedFile]) -> String {
    files
        .iter()
        .map(|file| {
            let language = file.path.rsplit_once('.').map_or("", |(_, ext)| ext);
            let newline = if file.content.ends_with('\n') { "" } else { "\n" };
            format!("{}\n```{language}\n{}{newline}```\n", file.path, file.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether `path` is relative and stays inside the directory it is joined to.
pub fn is_safe_path(path: &str) -> bool {
    !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|part| !part.is_empty() && part != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Here is the game.\n\nmain.py\n```python\nimport game\n\ngame.run()\n```\n\n**game.py**\n```python\ndef run():\n    pass\n```\n";

    #[test]
    fn test_parse_named_blocks() {
        let files = parse_files(LISTING);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "main.py");
        assert_eq!(files[0].content, "import game\n\ngame.run()\n");
        assert_eq!(files[1].path, "game.py");
    }

    #[test]
    fn test_filename_prefix_and_nested_path() {
        let files = parse_files("FILENAME: src/lib.rs\n```rust\npub fn a() {}\n```\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/lib.rs");
    }

    #[test]
    fn test_last_block_wins() {
        let listing = "a.py\n```python\nold\n```\nb.py\n```python\nb\n```\na.py\n```python\nnew\n```\n";
        let files = parse_files(listing);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "a.py");
        assert_eq!(files[0].content, "new\n");
    }

    #[test]
    fn test_unnamed_and_unsafe_blocks_skipped() {
        let listing = "```python\nx = 1\n```\n../evil.sh\n```sh\nrm -rf /\n```\n";
        assert!(parse_files(listing).is_empty());
    }

    #[test]
    fn test_safe_path_rules() {
        assert!(is_safe_path("main.py"));
        assert!(is_safe_path("snake_game"));
        assert!(is_safe_path("src/game/board.rs"));
        assert!(!is_safe_path("../x"));
        assert!(!is_safe_path("src/../../x"));
        assert!(!is_safe_path("/etc/passwd"));
        assert!(!is_safe_path("src//main.rs"));
        assert!(!is_safe_path("..\\x"));
        assert!(!is_safe_path(""));
    }

    #[test]
    fn test_render_listing_reparses() {
        let files = parse_files(LISTING);
        assert_eq!(parse_files(&render_listing(&files)), files);
    }
}
