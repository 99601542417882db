//! List index commands
//!
//! `hearth lists`, `hearth create-list` and `hearth delete-list`.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use hearth_core::domain::ListDomain;
use hearth_sync::Household;

use crate::context::{resolve_list, AppContext};

/// Show the household's lists
#[derive(Debug, Args)]
pub struct ListsCommand {
    /// Only lists of this kind (shopping, tasks, vouchers)
    #[arg(long)]
    pub domain: Option<ListDomain>,
}

impl ListsCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.with_household(|household| async move { self.show(&household, ctx) })
            .await
    }

    fn show(&self, household: &Household, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let lists = match self.domain {
            Some(domain) => household.lists_in(domain),
            None => household.lists().as_ref().clone(),
        };

        if ctx.is_json() {
            let json = serde_json::to_value(&lists).context("Failed to serialize lists")?;
            formatter.print_json(&json);
            return Ok(());
        }

        if lists.is_empty() {
            formatter.info("No lists yet. Create one with 'hearth create-list'.");
            return Ok(());
        }

        formatter.success(&format!("Lists of {}", household.household_id()));
        for domain in ListDomain::ALL {
            let in_domain: Vec<_> = lists.iter().filter(|m| m.domain == domain).collect();
            if in_domain.is_empty() {
                continue;
            }
            formatter.info("");
            formatter.info(&format!("{domain}:"));
            for meta in in_domain {
                formatter.info(&format!("  {}  ({})", meta.name, meta.id));
            }
        }
        Ok(())
    }
}

/// Create a new list
#[derive(Debug, Args)]
pub struct CreateListCommand {
    /// Kind of list (shopping, tasks, vouchers)
    pub domain: ListDomain,
    /// Display name
    pub name: String,
}

impl CreateListCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let meta = ctx
            .with_household(|household| async move {
                household
                    .create_list(&self.name, self.domain)
                    .await
                    .context("Failed to create list")
            })
            .await?;

        info!(list_id = %meta.id, domain = %meta.domain, "List created");
        let formatter = ctx.formatter();
        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&meta)?);
        } else {
            formatter.success(&format!("Created {} list '{}' ({})", meta.domain, meta.name, meta.id));
        }
        Ok(())
    }
}

/// Delete a list with all its entries
#[derive(Debug, Args)]
pub struct DeleteListCommand {
    /// List id or name
    pub list: String,
}

impl DeleteListCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let meta = ctx
            .with_household(|household| async move {
                let meta = resolve_list(&household, &self.list)?;
                household
                    .delete_list(&meta.id)
                    .await
                    .context("Failed to delete list")?;
                Ok(meta)
            })
            .await?;

        let formatter = ctx.formatter();
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({"deleted": meta.id.as_str()}));
        } else {
            formatter.success(&format!("Deleted list '{}'", meta.name));
        }
        Ok(())
    }
}
