/// One row of `lsblk -b -o NAME,SIZE,MOUNTPOINT,TYPE,FSTYPE,MODEL --noheadings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRow {
    pub name: String,
    pub size: u64,
    pub mountpoint: Option<String>,
    pub kind: String,
    pub fstype: String,
    pub model: String,
}

/// Strip the tree drawing lsblk puts in front of child devices.
///
/// Handles both the Unicode glyphs (`├─`, `└─`, `│`) and the ASCII fallback
/// (`|-`, `` `- ``) used when the locale is not UTF-8.
pub fn clean_device_name(raw: &str) -> String {
    strip_tree_prefix(raw).to_string()
}

fn strip_tree_prefix(raw: &str) -> &str {
    raw.trim_start_matches(|c: char| c == ' ' || !c.is_ascii() || matches!(c, '|' | '`' | '-'))
}

/// Parse the topology listing, one row per non-blank line.
pub fn parse_topology(text: &str) -> Vec<TopologyRow> {
    text.lines().filter_map(parse_row).collect()
}

fn parse_row(line: &str) -> Option<TopologyRow> {
    // Nested children are drawn as "│ └─name", so the prefix is stripped
    // from the line rather than from the first token.
    let mut tokens = strip_tree_prefix(line).split_whitespace();
    let name = tokens.next()?.to_string();
    let size = tokens.next().and_then(|s| s.parse().ok()).unwrap_or(0);

    // Empty columns vanish under whitespace splitting, so a leading '/'
    // is the only way to tell a mountpoint from the TYPE column.
    let rest: Vec<&str> = tokens.collect();
    let (mountpoint, rest) = match rest.split_first() {
        Some((first, tail)) if first.starts_with('/') => (Some(first.to_string()), tail),
        _ => (None, rest.as_slice()),
    };

    let kind = rest.first().copied().unwrap_or_default().to_string();
    let fstype = rest.get(1).copied().unwrap_or_default().to_string();
    let model = rest.get(2..).map(|words| words.join(" ")).unwrap_or_default();

    Some(TopologyRow {
        name,
        size,
        mountpoint,
        kind,
        fstype,
        model,
    })
}
