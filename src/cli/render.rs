use checkin_feed::{EnrichedActivity, Priority};

fn marker(priority: Priority) -> &'static str {
    match priority {
        Priority::Normal => "[ ok ]",
        Priority::Warning => "[warn]",
        Priority::Critical => "[CRIT]",
    }
}

pub fn entry_line(entry: &EnrichedActivity) -> String {
    let email = entry
        .email
        .as_deref()
        .map(|e| format!(" <{e}>"))
        .unwrap_or_default();
    format!(
        "{} {}{} | {}",
        marker(entry.priority),
        entry.display_name,
        email,
        entry.status_line()
    )
}

pub fn print_feed(title: &str, entries: &[EnrichedActivity]) {
    println!("== {title} ({} entries)", entries.len());
    if entries.is_empty() {
        println!("   (no activity)");
    }
    for entry in entries {
        println!("   {}", entry_line(entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_line_includes_email_and_marker() {
        let entry = EnrichedActivity {
            user_id: "A".into(),
            display_name: "Alice".into(),
            email: Some("a@x.com".into()),
            last_checkin: None,
            priority: Priority::Critical,
        };
        assert_eq!(entry_line(&entry), "[CRIT] Alice <a@x.com> | no activity yet");
    }
}
