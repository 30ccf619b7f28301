use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::app::{AppContext, GatorError, Result};
use crate::cli::CommandName;
use crate::domain::User;
use crate::store::Store;

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, ctx: &mut AppContext, args: &[String]) -> Result<()>;
}

/// A command that needs the current user.
#[async_trait]
pub trait UserCommandHandler: Send + Sync {
    async fn run(&self, ctx: &mut AppContext, user: User, args: &[String]) -> Result<()>;
}

/// Resolves the current user before running the wrapped handler.
pub struct LoggedIn<H>(pub H);

#[async_trait]
impl<H: UserCommandHandler> CommandHandler for LoggedIn<H> {
    async fn run(&self, ctx: &mut AppContext, args: &[String]) -> Result<()> {
        let name = ctx
            .config
            .current_user()
            .ok_or(GatorError::NotLoggedIn)?
            .to_string();
        let user = ctx
            .store
            .get_user(&name)?
            .ok_or(GatorError::UserNotFound(name))?;

        self.0.run(ctx, user, args).await
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    handlers: Mutex<HashMap<CommandName, Arc<dyn CommandHandler>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register<H>(&self, name: CommandName, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.handlers.lock().await.insert(name, Arc::new(handler));
    }

    /// Look up and run `name`. The lock is held for the whole invocation.
    pub async fn run(&self, name: CommandName, ctx: &mut AppContext, args: &[String]) -> Result<()> {
        let handlers = self.handlers.lock().await;
        let handler = handlers
            .get(&name)
            .ok_or_else(|| GatorError::Usage(format!("unknown command: {}", name)))?;

        tracing::debug!(command = %name, args = args.len(), "running command");
        handler.run(ctx, args).await
    }

    #[cfg(test)]
    pub async fn is_registered(&self, name: CommandName) -> bool {
        self.handlers.lock().await.contains_key(&name)
    }
}
