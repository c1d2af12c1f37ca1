//! Session catalog listing and selection.

use crate::api::history::HistoryEntry;

/// Numbered listing grouped by recency bucket. Numbers start at 1 and follow
/// catalog order so `/open <n>` can refer to them.
pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No stored sessions.\n".to_string();
    }

    let mut out = String::new();
    let mut bucket: Option<&str> = None;
    for (index, entry) in entries.iter().enumerate() {
        if bucket != Some(entry.bucket.as_str()) {
            bucket = Some(entry.bucket.as_str());
            out.push_str(&format!("📂 {}\n", entry.bucket));
        }
        if entry.title == entry.handle {
            out.push_str(&format!("  {:>3}. {}\n", index + 1, entry.title));
        } else {
            out.push_str(&format!(
                "  {:>3}. {} ({})\n",
                index + 1,
                entry.title,
                entry.handle
            ));
        }
    }
    out
}

/// Resolve a listing number or a literal handle.
pub fn resolve_handle(entries: &[HistoryEntry], choice: &str) -> String {
    let choice = choice.trim();
    choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| entries.get(index))
        .map(|entry| entry.handle.clone())
        .unwrap_or_else(|| choice.to_string())
}

pub fn print_history(entries: &[HistoryEntry]) {
    println!("🗂️  Stored sessions");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print!("{}", format_history(entries));
}
