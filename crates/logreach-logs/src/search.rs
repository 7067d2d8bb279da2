use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind};
use std::path::Path;

use regex::RegexBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use logreach_types::{SearchOptions, SearchResult};

/// Result of a streaming search
#[derive(Clone, Debug, Default)]
pub struct SearchOutcome {
    /// Matches in file order
    pub matches: Vec<SearchResult>,

    /// True when more matches existed past the result limit, or the scan
    /// was cancelled before the stream was exhausted
    pub truncated: bool,
}

enum Matcher {
    /// Empty query: every line matches
    All,
    Regex(regex::Regex),
    Substring { needle: String, case_sensitive: bool },
    /// Unparsable regex degrades to zero matches instead of failing
    Never,
}

impl Matcher {
    fn compile(query: &str, options: &SearchOptions) -> Self {
        if query.is_empty() {
            return Self::All;
        }
        if options.use_regex {
            return match RegexBuilder::new(query)
                .case_insensitive(!options.case_sensitive)
                .build()
            {
                Ok(re) => Self::Regex(re),
                Err(err) => {
                    warn!(%query, %err, "invalid search regex, degrading to no matches");
                    Self::Never
                }
            };
        }
        let needle = if options.case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };
        Self::Substring {
            needle,
            case_sensitive: options.case_sensitive,
        }
    }

    fn matches(&self, line: &str) -> bool {
        match self {
            Self::All => true,
            Self::Regex(re) => re.is_match(line),
            Self::Substring {
                needle,
                case_sensitive,
            } => {
                if *case_sensitive {
                    line.contains(needle.as_str())
                } else {
                    line.to_lowercase().contains(needle.as_str())
                }
            }
            Self::Never => false,
        }
    }
}

/// Stream the file line by line and collect matching lines with leading
/// context, capped at `options.limit`.
///
/// The file is never materialized in memory; a sliding window of
/// `context_lines + 1` lines is retained regardless of match outcome. A
/// missing file yields an empty, non-truncated outcome. The token lets a
/// caller abort a scan over a huge file; a cancelled scan reports
/// `truncated` since the stream was not exhausted.
pub fn search(
    path: impl AsRef<Path>,
    query: &str,
    options: &SearchOptions,
    cancel: &CancellationToken,
) -> io::Result<SearchOutcome> {
    let limit = options.limit.max(1);
    let matcher = Matcher::compile(query, options);

    let file = match File::open(path.as_ref()) {
        Ok(f) => f,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.as_ref().display(), "search on missing file");
            return Ok(SearchOutcome::default());
        }
        Err(err) => return Err(err),
    };

    let mut outcome = SearchOutcome::default();
    let mut window: VecDeque<String> = VecDeque::with_capacity(options.context_lines + 1);

    for (idx, line) in lossy_lines(file).enumerate() {
        if cancel.is_cancelled() {
            debug!(path = %path.as_ref().display(), "search cancelled");
            outcome.truncated = true;
            return Ok(outcome);
        }
        let line = line?;

        if matcher.matches(&line) {
            if outcome.matches.len() >= limit {
                // One match past the cap is enough to know we truncated
                outcome.truncated = true;
                break;
            }
            let context_before: Vec<String> = window
                .iter()
                .rev()
                .take(options.context_lines)
                .rev()
                .cloned()
                .collect();
            outcome.matches.push(SearchResult {
                line: idx as u64 + 1,
                text: line.clone(),
                context_before,
            });
        }

        window.push_back(line);
        if window.len() > options.context_lines + 1 {
            window.pop_front();
        }
    }

    Ok(outcome)
}

/// Line iterator that replaces invalid UTF-8 instead of erroring
fn lossy_lines(file: File) -> impl Iterator<Item = io::Result<String>> {
    let mut reader = BufReader::new(file);
    std::iter::from_fn(move || {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&buf).into_owned()))
            }
            Err(err) => Some(Err(err)),
        }
    })
}
