//! User command - manage users and their linked institutions

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use fininfo_core::{FiKey, LogEvent, User};

use super::{get_user_service, log_event};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user with no linked institutions
    Create {
        /// User id
        id: String,
    },
    /// Link an institution to a user
    Link {
        /// User id
        id: String,
        /// Provider item id
        #[arg(long)]
        item_id: String,
        /// Provider access token
        #[arg(long)]
        access_token: String,
        /// Provider institution id
        #[arg(long)]
        institution_id: Option<String>,
    },
    /// Unlink an institution from a user
    Unlink {
        /// User id
        id: String,
        /// Provider item id
        item_id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Show a user and their linked institutions
    Show {
        /// User id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: UserCommands) -> Result<()> {
    let (users, logger) = get_user_service()?;

    match command {
        UserCommands::Create { id } => {
            let user = users.create_user(&id)?;
            log_event(&logger, LogEvent::new("user_created").with_command("user create"));
            output::success(&format!("Created user '{}'", user.id));
        }
        UserCommands::Link {
            id,
            item_id,
            access_token,
            institution_id,
        } => {
            let mut key = FiKey::new(item_id, access_token);
            key.institution_id = institution_id;
            let user = users.link_fi(&id, key)?;
            log_event(&logger, LogEvent::new("fi_linked").with_command("user link"));
            output::success(&format!(
                "Linked institution to '{}' ({} linked)",
                user.id,
                user.fi_keys.len()
            ));
        }
        UserCommands::Unlink { id, item_id, force } => {
            if !force
                && !Confirm::new()
                    .with_prompt(format!("Unlink item '{}' from '{}'?", item_id, id))
                    .default(false)
                    .interact()?
            {
                println!("{}", "Cancelled".dimmed());
                return Ok(());
            }

            users.unlink_fi(&id, &item_id)?;
            log_event(&logger, LogEvent::new("fi_unlinked").with_command("user unlink"));
            output::success(&format!("Unlinked item '{}' from '{}'", item_id, id));
        }
        UserCommands::Show { id, json } => {
            let user = users.get_user(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&masked(&user))?);
            } else {
                print_user(&user);
            }
        }
        UserCommands::List { json } => {
            let all = users.list_users()?;
            if json {
                let shown: Vec<User> = all.iter().map(masked).collect();
                println!("{}", serde_json::to_string_pretty(&shown)?);
                return Ok(());
            }

            if all.is_empty() {
                output::warning("No users yet. Use 'fi user create' to add one.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["User", "Linked FIs"]);
            for user in &all {
                table.add_row(vec![user.id.clone(), user.fi_keys.len().to_string()]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

fn print_user(user: &User) {
    println!("{} {}", "User:".bold(), user.id);
    if user.fi_keys.is_empty() {
        output::info("No institutions linked.");
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec!["Item", "Institution", "Access token", "Cursor"]);
    for key in &user.fi_keys {
        table.add_row(vec![
            key.item_id.clone(),
            key.institution_id.clone().unwrap_or_else(|| "-".to_string()),
            output::mask_secret(&key.access_token),
            key.sync_cursor().unwrap_or("(not synced)").to_string(),
        ]);
    }
    println!("{}", table);
}

/// Copy of the user with access tokens masked for display
fn masked(user: &User) -> User {
    let mut user = user.clone();
    for key in &mut user.fi_keys {
        key.access_token = output::mask_secret(&key.access_token);
    }
    user
}
