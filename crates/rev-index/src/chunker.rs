//! Markdown document chunking.
//!
//! A document is split at H2/H3 headings that appear outside fenced code
//! blocks. The first H1 within the first five non-blank lines becomes the
//! document title; content before the first boundary forms a heading-less
//! prelude chunk. Line numbers are 1-based and refer to the source document.

/// One chunk of a markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// H2/H3 heading text; `None` for the prelude chunk.
    pub heading: Option<String>,
    /// 1-based line of the chunk's first line (the heading line for
    /// heading-bounded chunks).
    pub start_line: usize,
    /// Chunk body, trimmed, heading markup excluded.
    pub content: String,
}

/// Result of chunking one document.
#[derive(Debug, Clone)]
pub struct ChunkedDocument {
    pub chunks: Vec<Chunk>,
    /// First H1, or the base filename without extension.
    pub document_h1: String,
}

/// How many leading non-blank lines may hold the document H1.
const H1_SCAN_WINDOW: usize = 5;

/// Split markdown `content` into heading-bounded chunks.
#[must_use]
pub fn chunk_markdown(content: &str, rel_path: &str) -> ChunkedDocument {
    let lines: Vec<&str> = content.lines().collect();

    let h1 = find_document_h1(&lines);
    let document_h1 = h1
        .map(|(_, title)| title.to_string())
        .unwrap_or_else(|| filename_stem(rel_path));
    let h1_line = h1.map(|(line, _)| line);

    let mut chunks = Vec::new();
    let mut in_fence = false;
    let mut current_heading: Option<String> = None;
    let mut current_start = 1usize;
    let mut current_body: Vec<&str> = Vec::new();

    let flush =
        |heading: Option<String>, start: usize, body: &mut Vec<&str>, out: &mut Vec<Chunk>| {
            let content = body.join("\n").trim().to_string();
            body.clear();
            if !content.is_empty() {
                out.push(Chunk {
                    heading,
                    start_line: start,
                    content,
                });
            }
        };

    for (index, line) in lines.iter().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            current_body.push(line);
            continue;
        }

        if !in_fence
            && let Some(heading) = heading_text(trimmed)
        {
            flush(
                current_heading.take(),
                current_start,
                &mut current_body,
                &mut chunks,
            );
            current_heading = Some(heading.to_string());
            current_start = line_number;
            continue;
        }

        // The H1 line belongs to the title, not to any chunk body.
        if Some(line_number) == h1_line {
            continue;
        }

        current_body.push(line);
    }
    // When no H2/H3 ever opened a boundary this final flush emits the whole
    // body (minus the H1 line) as a single heading-less chunk.
    flush(current_heading, current_start, &mut current_body, &mut chunks);

    ChunkedDocument {
        chunks,
        document_h1,
    }
}

/// H2/H3 heading text, or `None` when the line is not a boundary.
fn heading_text(trimmed: &str) -> Option<&str> {
    trimmed
        .strip_prefix("## ")
        .or_else(|| trimmed.strip_prefix("### "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// First H1 within the first [`H1_SCAN_WINDOW`] non-blank lines, as
/// `(1-based line, title)`.
fn find_document_h1(lines: &[&str]) -> Option<(usize, String)> {
    let mut non_blank_seen = 0usize;
    let mut in_fence = false;
    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence
            && let Some(title) = trimmed.strip_prefix("# ")
        {
            let title = title.trim();
            if !title.is_empty() {
                return Some((index + 1, title.to_string()));
            }
        }
        non_blank_seen += 1;
        if non_blank_seen >= H1_SCAN_WINDOW {
            return None;
        }
    }
    None
}

/// Base filename without its extension.
fn filename_stem(rel_path: &str) -> String {
    std::path::Path::new(rel_path)
        .file_stem()
        .map_or_else(|| rel_path.to_string(), |s| s.to_string_lossy().to_string())
}
