//! Authentication commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::Credentials;
use crate::output::{print_info, print_success};

use super::CommandContext;

/// Authentication commands.
#[derive(Debug, Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuthSubcommand {
    /// Store a bearer token (pass it with the global --token or DASHSYNC_TOKEN).
    Login,

    /// Delete the stored token.
    Logout,

    /// Show current authentication status.
    Status,
}

impl AuthCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            AuthSubcommand::Login => login(ctx),
            AuthSubcommand::Logout => logout(),
            AuthSubcommand::Status => status(ctx),
        }
    }
}

fn login(ctx: CommandContext) -> Result<()> {
    let Some(token) = ctx.token else {
        print_info("No token given.");
        print_info("Use --token or set DASHSYNC_TOKEN environment variable.");
        return Ok(());
    };

    if token.trim().is_empty() {
        anyhow::bail!("token must not be empty");
    }

    Credentials::new(token).save()?;
    print_success("Token stored.");
    Ok(())
}

fn logout() -> Result<()> {
    if Credentials::delete()? {
        print_success("Token removed.");
    } else {
        print_info("No stored token.");
    }
    Ok(())
}

fn status(ctx: CommandContext) -> Result<()> {
    if ctx.token.is_some() {
        println!(
            "{} Using token from --token/DASHSYNC_TOKEN",
            "Status:".green().bold()
        );
    } else if let Some(username) = &ctx.username {
        println!(
            "{} Using basic auth as {}",
            "Status:".green().bold(),
            username
        );
    } else if let Some(creds) = &ctx.credentials {
        println!("{} Authenticated", "Status:".green().bold());
        println!("  Token stored: {}", creds.saved_at.to_rfc3339());
    } else {
        println!("{} Not authenticated", "Status:".red().bold());
        println!("\nRun {} to store a token.", "dashsync auth login --token <TOKEN>".cyan());
    }

    Ok(())
}
