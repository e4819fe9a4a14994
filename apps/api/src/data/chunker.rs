/// Line based splitter.
///
/// The documents are joined with a space and split on `\n`. Lines of at most
/// one character are dropped. Lines accumulate (each followed by `\n`) until
/// the buffer reaches `chunk_size` characters, then the buffer is flushed as a
/// trimmed chunk. A non-empty remainder becomes the last chunk.
pub fn split_lines<S: AsRef<str>>(texts: &[S], chunk_size: usize) -> Vec<String> {
    let full_text = texts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in full_text
        .split('\n')
        .map(str::trim)
        .filter(|l| l.chars().count() > 1)
    {
        current.push_str(line);
        current.push('\n');
        current_len += line.chars().count() + 1;

        if current_len >= chunk_size {
            chunks.push(current.trim().to_string());
            current.clear();
            current_len = 0;
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}
