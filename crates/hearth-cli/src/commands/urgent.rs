//! Urgent command - tasks due soon or marked high across all task lists

use anyhow::Result;
use clap::Args;

use crate::context::AppContext;
use crate::output::describe_urgent;

#[derive(Debug, Args)]
pub struct UrgentCommand {}

impl UrgentCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let window = ctx.config.urgent.window_days;

        ctx.with_household(|household| async move {
            let view = household.urgent_view();
            let formatter = ctx.formatter();

            if ctx.is_json() {
                let entries: Vec<serde_json::Value> = view
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "task": entry.task,
                            "list_id": entry.source_list_id.as_str(),
                            "list_name": entry.source_list_name,
                        })
                    })
                    .collect();
                formatter.print_json(&serde_json::json!({
                    "window_days": window,
                    "tasks": entries,
                }));
                return Ok(());
            }

            if view.is_empty() {
                formatter.success(&format!("Nothing urgent in the next {window} days"));
                return Ok(());
            }
            formatter.success(&format!("{} urgent tasks", view.len()));
            for entry in view.iter() {
                formatter.info(&describe_urgent(entry));
            }
            Ok(())
        })
        .await
    }
}
