//! Entry commands
//!
//! Everything that reads or edits the entries of one list. Each edit is an
//! optimistic commit against the local collection; the command waits for
//! the remote writes only to report their outcome.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;

use hearth_core::domain::{
    ListDomain, ListId, ListMeta, ShoppingItem, Task, Urgency, Voucher, VoucherKind,
};
use hearth_sync::Household;

use crate::context::{resolve_list, resolve_record, AppContext};
use crate::output::{describe_item, describe_task, describe_voucher};

/// Load `list` and return its metadata together with the collection to act on
async fn open(household: &Household, list: &str, master: bool) -> Result<(ListMeta, ListId)> {
    let meta = resolve_list(household, list)?;
    household
        .open_list(&meta.id)
        .await
        .with_context(|| format!("Failed to open list '{}'", meta.name))?;

    if !master {
        return Ok((meta.clone(), meta.id));
    }
    if meta.domain != ListDomain::Shopping {
        bail!("Only shopping lists have a master template");
    }
    let master_id = household
        .load_master(&meta.id)
        .await
        .context("Failed to load master template")?;
    Ok((meta, master_id))
}

// ============================================================================
// show
// ============================================================================

/// Show the entries of a list
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// List id or name
    pub list: String,
    /// Show the shopping list's master template instead
    #[arg(long)]
    pub master: bool,
}

impl ShowCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.with_household(|household| async move {
            let (meta, collection) = open(&household, &self.list, self.master).await?;
            let formatter = ctx.formatter();

            let (json, lines) = match meta.domain {
                ListDomain::Shopping => {
                    let items = household.shopping().collection(&collection);
                    (
                        serde_json::to_value(items.as_ref())?,
                        items.iter().map(describe_item).collect::<Vec<_>>(),
                    )
                }
                ListDomain::Tasks => {
                    let tasks = household.tasks().collection(&collection);
                    (
                        serde_json::to_value(tasks.as_ref())?,
                        tasks.iter().map(describe_task).collect(),
                    )
                }
                ListDomain::Vouchers => {
                    let vouchers = household.vouchers().collection(&collection);
                    (
                        serde_json::to_value(vouchers.as_ref())?,
                        vouchers.iter().map(describe_voucher).collect(),
                    )
                }
            };

            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "list": meta,
                    "collection": collection.as_str(),
                    "entries": json,
                }));
                return Ok(());
            }

            let title = if self.master {
                format!("{} (master template)", meta.name)
            } else {
                meta.name.clone()
            };
            formatter.success(&format!("{title}: {} entries", lines.len()));
            for line in &lines {
                formatter.info(line);
            }
            Ok(())
        })
        .await
    }
}

// ============================================================================
// add
// ============================================================================

/// Add an entry to a shopping or voucher list
#[derive(Debug, Args)]
pub struct AddCommand {
    /// List id or name
    pub list: String,
    /// Entry text (shopping) or name (vouchers)
    pub text: String,
    /// Shopping category, e.g. "Dairy"
    #[arg(long)]
    pub category: Option<String>,
    /// Add to the shopping list's master template
    #[arg(long)]
    pub master: bool,
    /// Voucher code
    #[arg(long)]
    pub code: Option<String>,
    /// Voucher expiry date (YYYY-MM-DD)
    #[arg(long)]
    pub expiry: Option<NaiveDate>,
    /// Store the voucher entry as a reservation
    #[arg(long)]
    pub reservation: bool,
}

impl AddCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.with_household(|household| async move {
            let (meta, collection) = open(&household, &self.list, self.master).await?;

            let handle = match meta.domain {
                ListDomain::Shopping => {
                    let item = ShoppingItem::new(self.text.trim(), self.category.clone());
                    household
                        .shopping()
                        .update(&collection, |items| items.push(item))?
                }
                ListDomain::Vouchers => {
                    let kind = if self.reservation {
                        VoucherKind::Reservation
                    } else {
                        VoucherKind::Voucher
                    };
                    let mut voucher = Voucher::new(self.text.trim(), kind);
                    voucher.code = self.code.clone();
                    voucher.expiry = self.expiry;
                    household
                        .vouchers()
                        .update(&collection, |vouchers| vouchers.push(voucher))?
                }
                ListDomain::Tasks => bail!("Use 'hearth task' to add to a task list"),
            };

            ctx.finish_commit(handle).await
        })
        .await
    }
}

// ============================================================================
// task
// ============================================================================

/// Add a task to a task list
#[derive(Debug, Args)]
pub struct TaskCommand {
    /// List id or name
    pub list: String,
    /// Task name
    pub name: String,
    /// Urgency label (high, medium, low)
    #[arg(long)]
    pub urgency: Option<Urgency>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<NaiveDate>,
    /// Household member responsible for the task
    #[arg(long)]
    pub assignee: Option<String>,
}

impl TaskCommand {
    fn build(&self) -> Task {
        let mut task = Task::new(self.name.trim());
        task.urgency = self.urgency;
        task.due_date = self.due;
        task.assignee = self.assignee.clone();
        task
    }

    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.with_household(|household| async move {
            let (meta, collection) = open(&household, &self.list, false).await?;
            if meta.domain != ListDomain::Tasks {
                bail!("'{}' is a {} list, not a task list", meta.name, meta.domain);
            }

            let task = self.build();
            let handle = household
                .tasks()
                .update(&collection, |tasks| tasks.push(task))?;
            ctx.finish_commit(handle).await
        })
        .await
    }
}

// ============================================================================
// toggle / remove
// ============================================================================

/// Mark an entry done, bought or redeemed (or undo it)
#[derive(Debug, Args)]
pub struct ToggleCommand {
    /// List id or name
    pub list: String,
    /// Entry id or exact text
    pub entry: String,
}

impl ToggleCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.with_household(|household| async move {
            let (meta, collection) = open(&household, &self.list, false).await?;

            let handle = match meta.domain {
                ListDomain::Shopping => {
                    let sync = household.shopping();
                    let items = sync.collection(&collection);
                    let id = resolve_record(&items, &self.entry, |i| i.text.as_str())?;
                    sync.update(&collection, |items| {
                        for item in items.iter_mut().filter(|i| i.id == id) {
                            *item = item.toggled();
                        }
                    })?
                }
                ListDomain::Tasks => {
                    let sync = household.tasks();
                    let tasks = sync.collection(&collection);
                    let id = resolve_record(&tasks, &self.entry, |t| t.name.as_str())?;
                    sync.update(&collection, |tasks| {
                        for task in tasks.iter_mut().filter(|t| t.id == id) {
                            *task = task.toggled();
                        }
                    })?
                }
                ListDomain::Vouchers => {
                    let sync = household.vouchers();
                    let vouchers = sync.collection(&collection);
                    let id = resolve_record(&vouchers, &self.entry, |v| v.name.as_str())?;
                    sync.update(&collection, |vouchers| {
                        for voucher in vouchers.iter_mut().filter(|v| v.id == id) {
                            voucher.redeemed = !voucher.redeemed;
                        }
                    })?
                }
            };

            ctx.finish_commit(handle).await
        })
        .await
    }
}

/// Remove an entry from a list
#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// List id or name
    pub list: String,
    /// Entry id or exact text
    pub entry: String,
    /// Remove from the shopping list's master template
    #[arg(long)]
    pub master: bool,
}

impl RemoveCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.with_household(|household| async move {
            let (meta, collection) = open(&household, &self.list, self.master).await?;

            let handle = match meta.domain {
                ListDomain::Shopping => {
                    let sync = household.shopping();
                    let id = resolve_record(&sync.collection(&collection), &self.entry, |i| {
                        i.text.as_str()
                    })?;
                    sync.update(&collection, |items| items.retain(|i| i.id != id))?
                }
                ListDomain::Tasks => {
                    let sync = household.tasks();
                    let id = resolve_record(&sync.collection(&collection), &self.entry, |t| {
                        t.name.as_str()
                    })?;
                    sync.update(&collection, |tasks| tasks.retain(|t| t.id != id))?
                }
                ListDomain::Vouchers => {
                    let sync = household.vouchers();
                    let id = resolve_record(&sync.collection(&collection), &self.entry, |v| {
                        v.name.as_str()
                    })?;
                    sync.update(&collection, |vouchers| vouchers.retain(|v| v.id != id))?
                }
            };

            ctx.finish_commit(handle).await
        })
        .await
    }
}
