//! Story input: reading the chapter file and cutting it into scenes.

use std::path::Path;

use tracing::info;

use crate::error::MangaError;
use crate::progress::ProgressStore;

/// Reads the whole story file.
pub fn load_story_text(path: &Path) -> Result<String, MangaError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(MangaError::InputNotFound(path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}

/// A word as byte offsets into the text plus its length in characters.
#[derive(Clone, Copy, Debug)]
struct Word {
    start: usize,
    end: usize,
    chars: usize,
}

fn words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<Word> = None;
    for (offset, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(word) = current.take() {
                words.push(word);
            }
            continue;
        }
        match current.as_mut() {
            Some(word) => {
                word.end = offset + ch.len_utf8();
                word.chars += 1;
            }
            None => {
                current = Some(Word {
                    start: offset,
                    end: offset + ch.len_utf8(),
                    chars: 1,
                });
            }
        }
    }
    words.extend(current);
    words
}

/// Splits `text` into scenes of at most `chunk_size` characters, breaking
/// only at whitespace.
///
/// Whitespace between words of a scene is kept as written, whitespace where a
/// scene ends is dropped. A single word longer than `chunk_size` becomes a
/// scene of its own.
pub fn paginate_story(text: &str, chunk_size: usize) -> Vec<String> {
    let limit = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current: Option<Word> = None;

    for word in words(text) {
        current = match current {
            None => Some(word),
            Some(chunk) => {
                let gap = text[chunk.end..word.start].chars().count();
                if chunk.chars + gap + word.chars <= limit {
                    Some(Word {
                        start: chunk.start,
                        end: word.end,
                        chars: chunk.chars + gap + word.chars,
                    })
                } else {
                    chunks.push(text[chunk.start..chunk.end].to_string());
                    Some(word)
                }
            }
        };
    }
    if let Some(chunk) = current {
        chunks.push(text[chunk.start..chunk.end].to_string());
    }

    info!("Split story into {} scenes", chunks.len());
    chunks
}

/// Gets the workspace ready: the input file's directory exists and the
/// progress document is initialized.
pub fn setup_editor(input: &Path, store: &ProgressStore, title: &str) -> Result<(), MangaError> {
    if let Some(parent) = input.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    store.initialize(title)
}
