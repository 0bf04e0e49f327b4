use std::io::{self, IsTerminal};

use crate::tagging::SyncSummary;

pub fn print_summary(summary: &SyncSummary) {
    let palette = Palette::auto();
    let heading = if summary.dry_run {
        "Notebook tags (dry run)"
    } else {
        "Notebook tags"
    };
    println!("{}", palette.heading(heading));
    println!(
        "{}",
        palette.dim(&format!("{} prefix={}", summary.base_url, summary.prefix))
    );

    for (label, value) in summary_rows(summary) {
        println!("  {:<26} {}", label, palette.count(&value.to_string()));
    }

    for name in &summary.planned_tags {
        println!("{}", palette.dim(&format!("  would create {name}")));
    }
    for name in &summary.tag_conflicts {
        println!(
            "{}",
            palette.warn(&format!("  conflict: {name} exists but its id is unknown"))
        );
    }
    for name in &summary.tag_failures {
        println!("{}", palette.warn(&format!("  failed to create {name}")));
    }
}

fn summary_rows(summary: &SyncSummary) -> Vec<(&'static str, u64)> {
    let mut rows = vec![
        ("notebooks found", summary.notebooks_found),
        ("unique tags required", summary.required_tags),
        ("existing tags", summary.tags_found),
    ];
    if summary.dry_run {
        rows.push(("tags to create", summary.planned_tags.len() as u64));
        rows.push(("notes", summary.notes_processed));
        rows.push(("notes to tag", summary.notes_to_tag));
        return rows;
    }
    rows.push(("tags created", summary.tags_created));
    if summary.conflicts_resolved > 0 {
        rows.push(("conflicts resolved", summary.conflicts_resolved));
    }
    rows.push(("notes", summary.notes_processed));
    rows.push(("tags applied", summary.tags_applied));
    rows.push(("notes outside notebooks", summary.notes_skipped_unmapped));
    rows.push(("notes without tag id", summary.notes_skipped_unresolved));
    rows.push(("tagging failures", summary.tag_apply_failures));
    rows
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn count(&self, text: &str) -> String {
        self.paint("1;32", text)
    }

    fn warn(&self, text: &str) -> String {
        self.paint("33", text)
    }
}
