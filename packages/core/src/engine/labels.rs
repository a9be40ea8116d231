/// Parse a newline-delimited label file.
///
/// Line `i` names probability index `i`, so blank lines inside the file are
/// kept as empty labels; only a trailing newline is ignored.
pub fn parse_labels(text: &str) -> Vec<String> {
    text.lines().map(|line| line.trim().to_string()).collect()
}
