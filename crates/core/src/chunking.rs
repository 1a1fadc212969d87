use crate::loader::PageText;
use crate::models::{ChunkMetadata, ChunkingOptions, DocumentChunk, DocumentType};

/// Separator preference for the general policy: paragraph break, then
/// line break, then space, then a hard character cut.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

pub const HEADER_KEYS: [&str; 3] = ["header_1", "header_2", "header_3"];
pub const PAGE_NUMBER_KEY: &str = "page_number";

/// Splits extracted pages into chunks according to the document-type
/// policy. Policy selection is explicit; there is no content sniffing.
pub fn chunk_pages(
    document_id: &str,
    pages: &[PageText],
    doc_type: DocumentType,
    options: &ChunkingOptions,
) -> Vec<DocumentChunk> {
    match doc_type {
        DocumentType::StructuredPolicy => chunk_structured(document_id, pages),
        DocumentType::General => chunk_general(document_id, pages, options),
    }
}

/// Structured policy: chunk boundaries follow markdown heading markers
/// (levels 1-3); the nearest enclosing heading at each level is attached
/// as metadata. Chunk size is not bounded.
fn chunk_structured(document_id: &str, pages: &[PageText]) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let mut headers: [Option<String>; 3] = [None, None, None];
    let mut buffer = String::new();
    let mut section_page = pages.first().map(|page| page.number).unwrap_or(1);
    let mut sequence = 0usize;

    for page in pages {
        for line in page.text.lines() {
            if let Some((level, title)) = heading_line(line) {
                flush_section(
                    &mut chunks,
                    &mut buffer,
                    &headers,
                    section_page,
                    document_id,
                    &mut sequence,
                );
                headers[level - 1] = Some(title.to_string());
                for slot in headers.iter_mut().skip(level) {
                    *slot = None;
                }
                section_page = page.number;
            } else {
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(line);
            }
        }
    }

    flush_section(
        &mut chunks,
        &mut buffer,
        &headers,
        section_page,
        document_id,
        &mut sequence,
    );
    chunks
}

fn heading_line(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    for (level, marker) in [(3usize, "### "), (2, "## "), (1, "# ")] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some((level, rest.trim()));
        }
    }
    None
}

fn flush_section(
    chunks: &mut Vec<DocumentChunk>,
    buffer: &mut String,
    headers: &[Option<String>; 3],
    section_page: u32,
    document_id: &str,
    sequence: &mut usize,
) {
    let text = buffer.trim().to_string();
    buffer.clear();
    if text.is_empty() {
        return;
    }

    let mut metadata = ChunkMetadata::new();
    metadata.insert(PAGE_NUMBER_KEY.to_string(), section_page.to_string());
    for (slot, key) in headers.iter().zip(HEADER_KEYS) {
        if let Some(title) = slot {
            metadata.insert(key.to_string(), title.clone());
        }
    }

    chunks.push(DocumentChunk {
        text,
        document_id: document_id.to_string(),
        metadata,
        sequence: *sequence,
    });
    *sequence += 1;
}

/// General policy: fixed target size with fixed overlap, breaking on the
/// preferred separators before falling back to an arbitrary cut. Chunks
/// are produced per page so page provenance survives.
fn chunk_general(
    document_id: &str,
    pages: &[PageText],
    options: &ChunkingOptions,
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let mut sequence = 0usize;

    for page in pages {
        for piece in split_recursive(&page.text, options) {
            let mut metadata = ChunkMetadata::new();
            metadata.insert(PAGE_NUMBER_KEY.to_string(), page.number.to_string());

            chunks.push(DocumentChunk {
                text: piece,
                document_id: document_id.to_string(),
                metadata,
                sequence,
            });
            sequence += 1;
        }
    }

    chunks
}

pub fn split_recursive(text: &str, options: &ChunkingOptions) -> Vec<String> {
    split_level(text, &SEPARATORS, options)
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn split_level(text: &str, separators: &[&str], options: &ChunkingOptions) -> Vec<String> {
    if char_len(text) <= options.chunk_size {
        return vec![text.to_string()];
    }

    match separators.split_first() {
        Some((separator, rest)) => {
            let mut units = Vec::new();
            for piece in text.split(separator) {
                if char_len(piece) > options.chunk_size {
                    units.extend(split_level(piece, rest, options));
                } else {
                    units.push(piece.to_string());
                }
            }
            merge_units(units, separator, options)
        }
        None => hard_cut(text, options),
    }
}

fn merge_units(units: Vec<String>, separator: &str, options: &ChunkingOptions) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for unit in units {
        let unit_len = char_len(&unit);

        if current_len > 0 && current_len + sep_len + unit_len > options.chunk_size {
            let finished = std::mem::take(&mut current);
            current = overlap_tail(&finished, options.chunk_overlap);
            current_len = char_len(&current);
            chunks.push(finished);

            // The carried tail is dropped when it would push the next
            // chunk over the size limit.
            if current_len > 0 && current_len + sep_len + unit_len > options.chunk_size {
                current.clear();
                current_len = 0;
            }
        }

        if current_len > 0 {
            current.push_str(separator);
            current_len += sep_len;
        }
        current.push_str(&unit);
        current_len += unit_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn overlap_tail(chunk: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let chars: Vec<char> = chunk.chars().collect();
    let start = chars.len().saturating_sub(overlap);
    chars[start..].iter().collect()
}

fn hard_cut(text: &str, options: &ChunkingOptions) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let stride = options
        .chunk_size
        .saturating_sub(options.chunk_overlap)
        .max(1);

    let mut pieces = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + options.chunk_size).min(chars.len());
        pieces.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn unbroken_text_is_cut_with_exact_overlap() {
        let options = ChunkingOptions {
            chunk_size: 1_000,
            chunk_overlap: 200,
        };
        let text: String = (0..2_500)
            .map(|index| char::from(b'a' + (index % 26) as u8))
            .collect();

        let chunks = split_recursive(&text, &options);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= options.chunk_size);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .skip(pair[0].chars().count() - options.chunk_overlap)
                .collect();
            let head: String = pair[1].chars().take(options.chunk_overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn general_chunks_never_exceed_the_size_limit() {
        let options = ChunkingOptions {
            chunk_size: 100,
            chunk_overlap: 20,
        };
        let paragraphs: Vec<String> = (0..12)
            .map(|index| format!("paragraph {index} with a handful of words in it"))
            .collect();
        let text = paragraphs.join("\n\n");

        let chunks = split_recursive(&text, &options);
        assert!(chunks.len() > 1);
        for chunk in chunks {
            assert!(chunk.chars().count() <= options.chunk_size);
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let options = ChunkingOptions::default();
        let chunks = split_recursive("one short paragraph", &options);
        assert_eq!(chunks, vec!["one short paragraph".to_string()]);
    }

    #[test]
    fn structured_chunks_carry_nearest_enclosing_headers() {
        let text = "# Coverage\nintro text\n## Hospitalisation\nroom rent rules\n\
                    ### Sub-limits\ncapped amounts\n## Exclusions\nwaiting periods";
        let pages = vec![page(1, text)];
        let chunks = chunk_pages(
            "policy.pdf",
            &pages,
            DocumentType::StructuredPolicy,
            &ChunkingOptions::default(),
        );

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].metadata["header_1"], "Coverage");
        assert!(!chunks[0].metadata.contains_key("header_2"));

        assert_eq!(chunks[1].metadata["header_1"], "Coverage");
        assert_eq!(chunks[1].metadata["header_2"], "Hospitalisation");

        assert_eq!(chunks[2].metadata["header_2"], "Hospitalisation");
        assert_eq!(chunks[2].metadata["header_3"], "Sub-limits");

        // A new level-2 heading clears the stale level-3 header.
        assert_eq!(chunks[3].metadata["header_2"], "Exclusions");
        assert!(!chunks[3].metadata.contains_key("header_3"));
    }

    #[test]
    fn structured_chunks_reconstruct_the_body_text() {
        let text = "# A\nfirst body\n## B\nsecond body\nmore of it\n# C\nthird body";
        let pages = vec![page(1, text)];
        let chunks = chunk_pages(
            "doc.txt",
            &pages,
            DocumentType::StructuredPolicy,
            &ChunkingOptions::default(),
        );

        let rebuilt = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rebuilt, "first body\nsecond body\nmore of it\nthird body");
    }

    #[test]
    fn one_heading_per_page_yields_one_chunk_per_page() {
        let pages = vec![
            page(1, "# Part One\nbody of part one"),
            page(2, "# Part Two\nbody of part two"),
            page(3, "# Part Three\nbody of part three"),
        ];
        let chunks = chunk_pages(
            "manual.pdf",
            &pages,
            DocumentType::StructuredPolicy,
            &ChunkingOptions::default(),
        );

        assert_eq!(chunks.len(), 3);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata["page_number"], (index + 1).to_string());
            assert_eq!(chunk.sequence, index);
        }
    }

    #[test]
    fn general_chunks_record_their_source_page() {
        let pages = vec![page(1, "first page text"), page(2, "second page text")];
        let chunks = chunk_pages(
            "doc.pdf",
            &pages,
            DocumentType::General,
            &ChunkingOptions::default(),
        );

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata["page_number"], "1");
        assert_eq!(chunks[1].metadata["page_number"], "2");
        assert_eq!(chunks[1].sequence, 1);
    }
}
