use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

/// Block size for backward reads
const BLOCK_SIZE: u64 = 1024;

/// Return the last `n` lines of the file at `path`, in original order.
///
/// Reads fixed-size blocks backward from the end of the file and stops as
/// soon as enough newlines have been accumulated, so memory stays bounded by
/// the requested window rather than the file size. Invalid UTF-8 is replaced,
/// not rejected.
///
/// A missing file yields an empty result instead of an error so the tail
/// operation stays idempotent against log-rotation races.
pub fn tail(path: impl AsRef<Path>, n: usize) -> io::Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut file = match File::open(path.as_ref()) {
        Ok(f) => f,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.as_ref().display(), "tail on missing file");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err),
    };

    let mut end = file.seek(SeekFrom::End(0))?;
    let mut data: Vec<u8> = Vec::new();
    let mut newlines = 0usize;

    while end > 0 && newlines <= n {
        let size = BLOCK_SIZE.min(end);
        end -= size;
        file.seek(SeekFrom::Start(end))?;
        let mut chunk = vec![0u8; size as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&data);
        data = chunk;
        newlines = data.iter().filter(|&&b| b == b'\n').count();
    }

    let text = String::from_utf8_lossy(&data);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn tail_returns_last_n_lines_in_order() {
        let file = fixture(&["one", "two", "three", "four"]);
        let result = tail(file.path(), 2).unwrap();
        assert_eq!(result, ["three", "four"]);
    }

    #[test]
    fn tail_more_than_file_returns_all_lines() {
        let file = fixture(&["a", "b"]);
        let result = tail(file.path(), 100).unwrap();
        assert_eq!(result, ["a", "b"]);
    }

    #[test]
    fn tail_zero_lines_is_empty() {
        let file = fixture(&["a", "b"]);
        assert!(tail(file.path(), 0).unwrap().is_empty());
    }

    #[test]
    fn tail_missing_file_is_empty_not_error() {
        let result = tail("/nonexistent/definitely/missing.log", 10).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn tail_spans_multiple_blocks() {
        // Lines long enough that 5 of them exceed one 1 KiB block
        let lines: Vec<String> = (0..50).map(|i| format!("line-{i:04}{}", "x".repeat(300))).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = fixture(&refs);
        let result = tail(file.path(), 5).unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result, refs[45..]);
    }

    #[test]
    fn tail_file_without_trailing_newline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "first\nsecond\nlast").unwrap();
        file.flush().unwrap();
        let result = tail(file.path(), 2).unwrap();
        assert_eq!(result, ["second", "last"]);
    }

    #[test]
    fn tail_replaces_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ok\nbad\xff\xfebytes\n").unwrap();
        file.flush().unwrap();
        let result = tail(file.path(), 2).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], "ok");
        assert!(result[1].contains('\u{FFFD}'));
    }
}
