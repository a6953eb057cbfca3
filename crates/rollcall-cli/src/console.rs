//! Terminal output: notices and the roster table.

use rollcall_core::models::Student;
use rollcall_core::notify::{NoticeKind, Notifier};
use rollcall_core::roster::Page;

/// Column widths for the roster table
const MATRIC_WIDTH: usize = 16;
const NAME_WIDTH: usize = 28;
const EMAIL_WIDTH: usize = 28;
const PHONE_WIDTH: usize = 14;
const DEPARTMENT_WIDTH: usize = 10;

/// Prints notices to stderr so they never mix with table output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        let marker = match kind {
            NoticeKind::Success => "✓",
            NoticeKind::Info => "i",
            NoticeKind::Error => "✗",
        };
        eprintln!("{} {}", marker, message);
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

fn cell(value: Option<&str>, width: usize) -> String {
    let text = truncate_string(value.unwrap_or("-"), width);
    format!("{:<width$}", text, width = width)
}

pub fn render_page(page: &Page<'_, Student>) -> String {
    if page.total == 0 {
        return "No students uploaded yet.".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {} {} {}\n",
        cell(Some("Matric Number"), MATRIC_WIDTH),
        cell(Some("Name"), NAME_WIDTH),
        cell(Some("Email"), EMAIL_WIDTH),
        cell(Some("Phone Number"), PHONE_WIDTH),
        cell(Some("Department"), DEPARTMENT_WIDTH),
    ));
    for student in page.items {
        let name = student.display_name();
        out.push_str(&format!(
            "{} {} {} {} {}\n",
            cell(Some(student.matric_no.as_str()), MATRIC_WIDTH),
            cell((!name.is_empty()).then_some(name.as_str()), NAME_WIDTH),
            cell(student.email.as_deref(), EMAIL_WIDTH),
            cell(student.phone.as_deref(), PHONE_WIDTH),
            cell(student.department_name.as_deref(), DEPARTMENT_WIDTH),
        ));
    }

    if page.items.is_empty() {
        out.push_str("(no rows on this page)\n");
    }
    out.push_str(&format!(
        "Page {} of {} ({} students)",
        page.index + 1,
        page.page_count,
        page.total
    ));
    out
}
