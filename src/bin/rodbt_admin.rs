//! Moderator administration for RO-DBT accounts.
//!
//! Usage: `rodbt-admin <command> [username]`
//!
//! Commands:
//! - `accept <username>`  let the account see journals and questions
//! - `revoke <username>`  withdraw acceptance
//! - `promote <username>` grant the moderator flag
//! - `demote <username>`  remove the moderator flag
//! - `list`               show every account
//!
//! Reads the same `config.yml` and `RODBT_*` overrides as the server.

use anyhow::{bail, Result};
use std::path::Path;

use rodbt::{
    config::Config,
    db::{
        self,
        repositories::{SqlxSessionRepository, SqlxUserRepository},
    },
    services::UserService,
};

const USAGE: &str = "usage: rodbt-admin <accept|revoke|promote|demote> <username>\n       rodbt-admin list";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Accept(String),
    Revoke(String),
    Promote(String),
    Demote(String),
    List,
}

fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let command = args.next();
    let username = args.next();
    if args.next().is_some() {
        bail!("too many arguments\n{}", USAGE);
    }

    let need_user = |name: &str| -> Result<String> {
        match &username {
            Some(u) if !u.is_empty() => Ok(u.clone()),
            _ => bail!("`{}` needs a username\n{}", name, USAGE),
        }
    };

    Ok(match command.as_deref() {
        Some("accept") => Command::Accept(need_user("accept")?),
        Some("revoke") => Command::Revoke(need_user("revoke")?),
        Some("promote") => Command::Promote(need_user("promote")?),
        Some("demote") => Command::Demote(need_user("demote")?),
        Some("list") if username.is_none() => Command::List,
        Some("list") => bail!("`list` takes no arguments\n{}", USAGE),
        Some(other) => bail!("unknown command `{}`\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rodbt=warn".into()),
        )
        .init();

    let command = parse_args(std::env::args().skip(1))?;

    let config = Config::load_with_env(Path::new("config.yml"))?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let users = UserService::new(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
    );

    match command {
        Command::Accept(name) => {
            users.set_registration_accepted(&name, true).await?;
            println!("{}: registration accepted", name);
        }
        Command::Revoke(name) => {
            users.set_registration_accepted(&name, false).await?;
            println!("{}: registration revoked", name);
        }
        Command::Promote(name) => {
            users.set_moderator(&name, true).await?;
            println!("{}: now a moderator", name);
        }
        Command::Demote(name) => {
            users.set_moderator(&name, false).await?;
            println!("{}: no longer a moderator", name);
        }
        Command::List => {
            println!("{:>5}  {:<30} {:<8} {:<9}", "id", "username", "accepted", "moderator");
            for user in users.list_users().await? {
                println!(
                    "{:>5}  {:<30} {:<8} {:<9}",
                    user.id, user.username, user.registration_accepted, user.is_moderator
                );
            }
        }
    }

    pool.close().await;
    Ok(())
}
