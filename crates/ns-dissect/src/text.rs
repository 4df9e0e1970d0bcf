//! Helpers shared by the line-oriented text protocol dissectors.

/// True when more than `threshold_percent` of the bytes are printable
/// ASCII (counting CR, LF and TAB as printable). Empty input never passes.
pub(crate) fn is_printable_ascii(data: &[u8], threshold_percent: usize) -> bool {
    if data.is_empty() {
        return false;
    }
    let printable = data
        .iter()
        .filter(|&&b| (32..=126).contains(&b) || b == b'\r' || b == b'\n' || b == b'\t')
        .count();
    printable * 100 / data.len() > threshold_percent
}

/// Split a payload into non-empty lines on CR/LF.
pub(crate) fn crlf_lines(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}
