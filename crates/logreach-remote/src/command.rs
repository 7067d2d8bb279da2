//! Remote command construction
//!
//! Commands are built as plain strings on purpose: the path pattern is left
//! unquoted so the remote shell expands globs server-side, which is the
//! documented trust boundary: patterns come from values the operator
//! registered, not from arbitrary external input. Everything else that enters
//! the command line goes through [`sh_quote`].

use logreach_types::FilterChain;

/// Hard server-side ceiling on line counts, regardless of caller input
pub const COMMAND_LINE_CEILING: usize = 5000;

/// Single-quote `value` for a POSIX shell.
///
/// Embedded single quotes are escaped by closing the quoted span, emitting
/// an escaped quote, and reopening it, so the value always parses back as
/// one literal argument.
pub fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

fn clamp_lines(n: usize) -> usize {
    n.clamp(1, COMMAND_LINE_CEILING)
}

/// Build the remote "cat" command: tail the pattern to at most `max_lines`
/// lines, then pipe through one fixed-string grep stage per filter.
///
/// The line cap is applied before any filter stage so filters only ever see
/// already-capped output.
pub fn build_cat(pattern: &str, filters: &FilterChain, max_lines: usize) -> String {
    let mut inner = format!("tail -n {} -- {}", clamp_lines(max_lines), pattern);
    for stage in filters.stages() {
        inner.push_str(&format!(" | grep -F -- {}", sh_quote(stage)));
    }
    format!("bash -lc {}", sh_quote(&inner))
}

/// Build the remote listing command: expand the glob, keep regular files
/// only, and cap the output at `limit` names.
///
/// Extension filtering by kind happens on the returned names, not in the
/// shell.
pub fn build_list(pattern: &str, limit: usize) -> String {
    let script = format!(
        "shopt -s nullglob dotglob; for f in {}; do [ -f \"$f\" ] && echo \"$f\"; done | head -n {}",
        pattern,
        clamp_lines(limit),
    );
    format!("bash -lc {}", sh_quote(&script))
}
