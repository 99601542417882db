use hearth_core::domain::{ShoppingItem, Task, TaskStatus, Voucher, VoucherKind};
use hearth_sync::{DispatchReport, UrgentTask};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

// ============================================================================
// Record rendering
// ============================================================================

fn checkbox(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

pub fn describe_item(item: &ShoppingItem) -> String {
    let mut line = format!("{} {}", checkbox(item.completed), item.text);
    if let Some(category) = &item.category {
        line.push_str(&format!(" ({category})"));
    }
    line.push_str(&format!("  #{}", item.id));
    line
}

pub fn describe_task(task: &Task) -> String {
    let mut line = format!("{} {}", checkbox(task.is_done()), task.name);
    if task.status == TaskStatus::InProgress {
        line.push_str(" (in progress)");
    }
    if let Some(urgency) = task.urgency {
        line.push_str(&format!(" !{urgency}"));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {due}"));
    }
    if let Some(assignee) = &task.assignee {
        line.push_str(&format!(" @{assignee}"));
    }
    line.push_str(&format!("  #{}", task.id));
    line
}

pub fn describe_voucher(voucher: &Voucher) -> String {
    let kind = match voucher.kind {
        VoucherKind::Voucher => "voucher",
        VoucherKind::Reservation => "reservation",
    };
    let mut line = format!("{} {} [{kind}]", checkbox(voucher.redeemed), voucher.name);
    if let Some(value) = &voucher.value {
        line.push_str(&format!(" {value}"));
    }
    if let Some(code) = &voucher.code {
        line.push_str(&format!(" code {code}"));
    }
    if let Some(expiry) = voucher.expiry {
        line.push_str(&format!(" expires {expiry}"));
    }
    line.push_str(&format!("  #{}", voucher.id));
    line
}

pub fn describe_urgent(entry: &UrgentTask) -> String {
    format!("{}  <{}>", describe_task(&entry.task), entry.source_list_name)
}

/// Print the outcome of a commit's remote writes
pub fn print_report(formatter: &dyn OutputFormatter, format: OutputFormat, report: &DispatchReport) {
    if matches!(format, OutputFormat::Json) {
        let failures: Vec<serde_json::Value> = report
            .failures
            .iter()
            .map(|f| {
                serde_json::json!({
                    "record_id": f.record_id.as_str(),
                    "operation": f.operation.to_string(),
                    "error": f.error,
                })
            })
            .collect();
        formatter.print_json(&serde_json::json!({
            "list_id": report.list_id.as_str(),
            "created": report.created,
            "patched": report.patched,
            "deleted": report.deleted,
            "failures": failures,
            "duration_ms": report.duration_ms,
        }));
        return;
    }

    if report.is_clean() {
        formatter.success(&format!(
            "Saved to {} ({} created, {} updated, {} deleted)",
            report.list_id, report.created, report.patched, report.deleted
        ));
    } else {
        for failure in &report.failures {
            formatter.warn(&format!(
                "{} of {} failed: {}",
                failure.operation, failure.record_id, failure.error
            ));
        }
        formatter.warn(&format!(
            "{} of {} remote writes failed; the local copy was kept",
            report.failures.len(),
            report.attempted()
        ));
    }
}
