use async_trait::async_trait;

use crate::app::{AppContext, GatorError, Result};
use crate::cli::{CommandName, CommandRegistry, LoggedIn};
use crate::cli::registry::{CommandHandler, UserCommandHandler};
use crate::domain::{Feed, Item, Subscription, User};
use crate::scheduler::shutdown::{self, SignalListener};
use crate::scheduler::{format_interval, parse_interval, Scheduler};
use crate::store::Store;

/// Registry with every gator command installed.
pub async fn builtin_registry() -> CommandRegistry {
    let registry = CommandRegistry::new();

    registry.register(CommandName::Login, Login).await;
    registry.register(CommandName::Register, Register).await;
    registry.register(CommandName::Reset, Reset).await;
    registry.register(CommandName::Users, Users).await;
    registry.register(CommandName::Agg, Agg).await;
    registry.register(CommandName::AddFeed, LoggedIn(AddFeed)).await;
    registry.register(CommandName::Feeds, Feeds).await;
    registry.register(CommandName::Follow, LoggedIn(Follow)).await;
    registry.register(CommandName::Following, LoggedIn(Following)).await;
    registry.register(CommandName::Unfollow, LoggedIn(Unfollow)).await;
    registry.register(CommandName::Browse, LoggedIn(Browse)).await;

    registry
}

fn arg<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| GatorError::Usage(usage.to_string()))
}

pub struct Login;

#[async_trait]
impl CommandHandler for Login {
    async fn run(&self, ctx: &mut AppContext, args: &[String]) -> Result<()> {
        let name = arg(args, 0, "gator login <name>")?;

        if ctx.store.get_user(name)?.is_none() {
            return Err(GatorError::UserNotFound(name.to_string()));
        }

        ctx.config.set_current_user(name)?;
        println!("Logged in as {}", name);
        Ok(())
    }
}

pub struct Register;

#[async_trait]
impl CommandHandler for Register {
    async fn run(&self, ctx: &mut AppContext, args: &[String]) -> Result<()> {
        let name = arg(args, 0, "gator register <name>")?;

        if ctx.store.get_user(name)?.is_some() {
            return Err(GatorError::UserExists(name.to_string()));
        }

        let mut user = User::new(name.to_string());
        user.id = ctx.store.create_user(&user)?;
        ctx.config.set_current_user(name)?;

        tracing::info!(user_id = user.id, user = name, "registered user");
        println!("User created: {}", user.name);
        println!("  ID:      {}", user.id);
        println!("  Created: {}", user.created_at.format("%Y-%m-%d %H:%M:%S"));
        Ok(())
    }
}

pub struct Reset;

#[async_trait]
impl CommandHandler for Reset {
    async fn run(&self, ctx: &mut AppContext, _args: &[String]) -> Result<()> {
        let deleted = ctx.store.delete_all_users()?;
        println!("Deleted {} users", deleted);
        Ok(())
    }
}

pub struct Users;

#[async_trait]
impl CommandHandler for Users {
    async fn run(&self, ctx: &mut AppContext, _args: &[String]) -> Result<()> {
        let users = ctx.store.get_users()?;

        if users.is_empty() {
            println!("No users");
            return Ok(());
        }

        let current = ctx.config.current_user();
        for user in users {
            if Some(user.name.as_str()) == current {
                println!("* {} (current)", user.name);
            } else {
                println!("* {}", user.name);
            }
        }
        Ok(())
    }
}

pub struct Agg;

#[async_trait]
impl CommandHandler for Agg {
    async fn run(&self, ctx: &mut AppContext, args: &[String]) -> Result<()> {
        let interval = parse_interval(arg(args, 0, "gator agg <duration>")?)?;
        println!("Collecting feeds every {}", format_interval(interval));

        let (trigger, stop) = shutdown::channel();
        let signals = SignalListener::install()?;
        tokio::spawn(signals.forward(trigger));

        Scheduler::new(ctx.pipeline(), interval).run(stop).await;
        Ok(())
    }
}

pub struct AddFeed;

#[async_trait]
impl UserCommandHandler for AddFeed {
    async fn run(&self, ctx: &mut AppContext, user: User, args: &[String]) -> Result<()> {
        let usage = "gator addfeed <name> <url>";
        let name = arg(args, 0, usage)?;
        let url = arg(args, 1, usage)?;

        let mut feed = Feed::new(name.to_string(), url.to_string(), user.id);
        feed.id = ctx.store.create_feed(&feed)?;
        ctx.store
            .create_subscription(&Subscription::new(user.id, feed.id))?;

        tracing::info!(feed_id = feed.id, url, "added feed");
        println!("Added feed: {}", feed.display_title());
        println!("  ID:    {}", feed.id);
        println!("  URL:   {}", feed.url);
        println!("  Owner: {}", user.name);
        Ok(())
    }
}

pub struct Feeds;

#[async_trait]
impl CommandHandler for Feeds {
    async fn run(&self, ctx: &mut AppContext, _args: &[String]) -> Result<()> {
        let feeds = ctx.store.get_feeds_with_owner()?;

        if feeds.is_empty() {
            println!("No feeds");
            return Ok(());
        }

        for entry in feeds {
            println!("* {}", entry.feed.display_title());
            println!("  URL:   {}", entry.feed.url);
            println!("  Owner: {}", entry.owner_name);
        }
        Ok(())
    }
}

pub struct Follow;

#[async_trait]
impl UserCommandHandler for Follow {
    async fn run(&self, ctx: &mut AppContext, user: User, args: &[String]) -> Result<()> {
        let url = arg(args, 0, "gator follow <url>")?;

        let feed = ctx
            .store
            .get_feed_by_url(url)?
            .ok_or_else(|| GatorError::FeedNotFound(url.to_string()))?;
        let followed = ctx
            .store
            .create_subscription(&Subscription::new(user.id, feed.id))?;

        println!("{} now follows {}", followed.user_name, followed.feed_name);
        Ok(())
    }
}

pub struct Following;

#[async_trait]
impl UserCommandHandler for Following {
    async fn run(&self, ctx: &mut AppContext, user: User, _args: &[String]) -> Result<()> {
        let followed = ctx.store.get_subscriptions_for_user(user.id)?;

        if followed.is_empty() {
            println!("{} is not following any feeds", user.name);
            return Ok(());
        }

        for entry in followed {
            println!("* {}", entry.feed_name);
        }
        Ok(())
    }
}

pub struct Unfollow;

#[async_trait]
impl UserCommandHandler for Unfollow {
    async fn run(&self, ctx: &mut AppContext, user: User, args: &[String]) -> Result<()> {
        let url = arg(args, 0, "gator unfollow <url>")?;

        if !ctx.store.delete_subscription(user.id, url)? {
            return Err(GatorError::Other(format!(
                "{} is not following {}",
                user.name, url
            )));
        }

        println!("{} unfollowed {}", user.name, url);
        Ok(())
    }
}

pub struct Browse;

#[async_trait]
impl UserCommandHandler for Browse {
    async fn run(&self, ctx: &mut AppContext, user: User, args: &[String]) -> Result<()> {
        let items = browse_items(ctx, &user, args)?;

        if items.is_empty() {
            println!("No posts");
            return Ok(());
        }

        for item in items {
            println!("{}", item.display_title());
            if let Some(ref published) = item.published_at {
                println!("  Published: {}", published);
            }
            println!("  {}", item.link);
            let description = item.display_description();
            if !description.is_empty() {
                println!("  {}", description);
            }
            println!();
        }
        Ok(())
    }
}

/// Newest posts from the feeds `user` follows, capped by the command-line
/// limit or the configured default.
fn browse_items(ctx: &AppContext, user: &User, args: &[String]) -> Result<Vec<Item>> {
    let limit = browse_limit(args, ctx.config.browse.default_limit)?;
    ctx.store.get_items_for_user(user.id, limit)
}

/// The limit given on the command line, or `default` when there is none.
fn browse_limit(args: &[String], default: usize) -> Result<usize> {
    let Some(raw) = args.first() else {
        return Ok(default);
    };

    match raw.parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(GatorError::Usage(format!(
            "gator browse [limit] (limit must be a positive integer, got {:?})",
            raw
        ))),
    }
}
