use crate::formatter::{MarkdownContent, TimezoneOffset, format_datetime_with_timezone_offset};
use crate::services::SyncReport;

pub fn sync_report_markdown_with_timezone(
    report: &SyncReport,
    timezone: Option<&TimezoneOffset>,
) -> MarkdownContent {
    let mut content = String::new();

    content.push_str(&format!("# {}\n", report.operation));
    content.push_str(&format!("- Pass: {}\n", report.pass_id));
    content.push_str(&format!(
        "- Started: {}\n",
        format_datetime_with_timezone_offset(report.started_at, timezone)
    ));
    content.push_str(&format!(
        "- Finished: {}\n",
        format_datetime_with_timezone_offset(report.finished_at, timezone)
    ));
    content.push_str(&format!(
        "- Result: {}\n",
        if report.succeeded() { "succeeded" } else { "failed" }
    ));

    if report.servers.is_empty() {
        content.push_str("\nNothing to sync\n");
        return MarkdownContent(content);
    }

    for server in &report.servers {
        content.push_str(&format!("\n## {}\n", server.label));
        content.push_str(&format!(
            "- Status: {}\n",
            if server.succeeded { "ok" } else { "failed" }
        ));
        content.push_str(&format!("- Nodes stored: {}\n", server.nodes_ingested));
        content.push_str(&format!(
            "- Requests: {} (cost {})\n",
            server.usage.requests, server.usage.cost
        ));
        if let (Some(remaining), Some(limit)) = (server.usage.remaining, server.usage.limit) {
            content.push_str(&format!("- API budget left: {}/{}", remaining, limit));
            if let Some(reset_at) = server.usage.reset_at {
                content.push_str(&format!(
                    ", resets {}",
                    format_datetime_with_timezone_offset(reset_at, timezone)
                ));
            }
            content.push('\n');
        }
        if let Some(error) = &server.error {
            content.push_str(&format!("- Error: {}\n", error));
        }
    }

    MarkdownContent(content)
}
