/// Splits a thinking fragment into the lines that may be shown to the client.
///
/// Line breaks are kept by reattaching `"\n"` to the start of every part after
/// the first. Parts that look like action formatting (braces, `#`, or the
/// `Action` marker) are dropped, as are empty parts.
pub fn thinking_lines(fragment: &str) -> Vec<String> {
    fragment
        .split('\n')
        .enumerate()
        .map(|(idx, part)| {
            if idx == 0 {
                part.to_string()
            } else {
                format!("\n{part}")
            }
        })
        .filter(|line| !line.is_empty() && !is_formatting_noise(line))
        .collect()
}

fn is_formatting_noise(line: &str) -> bool {
    line.contains(['{', '}', '#']) || line.contains("Action")
}
