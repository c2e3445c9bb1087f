//! Finance info command - retrieve FI info and advance sync cursors

use anyhow::Result;
use colored::Colorize;
use fininfo_core::services::ResponseBody;
use fininfo_core::{FinanceInfoRequest, FinancialInst, LogEvent};

use super::{get_context, log_event};
use crate::output;

pub fn run(id: &str, user_id: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_event(
        &ctx.logger,
        LogEvent::new("command_executed").with_command("finance-info"),
    );

    let mut request = FinanceInfoRequest::new(id);
    if let Some(user_id) = user_id {
        request = request.with_user_id(user_id);
    }

    let response = ctx.finance_info(&request);

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        if !response.is_success() {
            anyhow::bail!("Request failed with status {}", response.status);
        }
        return Ok(());
    }

    match &response.body {
        ResponseBody::FinanceInfo { user_fis } => {
            print_user_fis(user_fis);
            output::success(&format!(
                "Synced {} institution(s) via {}",
                user_fis.len(),
                ctx.finance_info_service.provider_name()
            ));
            Ok(())
        }
        ResponseBody::Empty {} => anyhow::bail!("User '{}' not found", id),
        ResponseBody::Error(message) => anyhow::bail!("{}", message),
    }
}

fn print_user_fis(user_fis: &[FinancialInst]) {
    if user_fis.is_empty() {
        output::warning("No institutions linked. Use 'fi user link' to add one.");
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec![
        "Item", "Institution", "Accounts", "Added", "Modified", "Removed", "Next cursor",
    ]);

    for fi in user_fis {
        let sync = &fi.transaction_sync;
        table.add_row(vec![
            fi.item_id.clone(),
            fi.institution
                .as_ref()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| "-".to_string()),
            fi.accounts.len().to_string(),
            sync.added.len().to_string(),
            sync.modified.len().to_string(),
            sync.removed.len().to_string(),
            sync.next_cursor.clone(),
        ]);
    }

    println!("{}", table);

    for fi in user_fis {
        for account in &fi.accounts {
            let current = account
                .balances
                .current
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} {} {} {}",
                fi.item_id.dimmed(),
                account.name,
                account.mask.as_deref().map(|m| format!("(..{})", m)).unwrap_or_default(),
                current.bold()
            );
        }
    }
}
