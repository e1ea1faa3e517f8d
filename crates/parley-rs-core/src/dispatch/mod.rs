//! Command parsing, resolution, gating, and execution.

mod context;
mod parse;

pub use context::{CommandContext, CommandHandler, CommandInfo, CommandServices, Reply};
pub use parse::{ParsedCommand, parse_command};

use crate::error::{AssistantError, CommandError};
use futures_util::FutureExt;
use log::{debug, info, warn};
use parley_rs_protocol::IncomingMessage;
use regex::Regex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Result of dispatching one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No command matched; the message is ordinary chatter.
    NotCommand,
    /// The bot is disabled and the sender is not the owner.
    Suppressed,
    /// A handler ran and produced a reply.
    Handled { command: String, reply: Reply },
}

/// Routes command lines to handlers.
///
/// Resolution order: aliases are rewritten to their target, then the exact
/// table is consulted, then patterns in registration order. The power gate
/// is checked before any of that.
pub struct CommandDispatcher {
    exact: HashMap<String, Arc<dyn CommandHandler>>,
    aliases: HashMap<String, String>,
    patterns: Vec<(Regex, Arc<dyn CommandHandler>)>,
    catalog: Arc<Vec<CommandInfo>>,
    services: Arc<CommandServices>,
}

impl CommandDispatcher {
    /// Create a dispatcher with no commands.
    pub fn new(services: Arc<CommandServices>) -> Self {
        Self {
            exact: HashMap::new(),
            aliases: HashMap::new(),
            patterns: Vec::new(),
            catalog: Arc::new(Vec::new()),
            services,
        }
    }

    /// Register a handler under its exact token.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let info = handler.info();
        debug!("registered command (token={})", info.token);
        if self.exact.insert(info.token.clone(), handler).is_some() {
            warn!("command token replaced (token={})", info.token);
            Arc::make_mut(&mut self.catalog).retain(|existing| existing.token != info.token);
        }
        Arc::make_mut(&mut self.catalog).push(info);
    }

    /// Register a handler resolved by matching the whole command token
    /// against `pattern`. Named groups are exposed as context captures.
    pub fn register_pattern(
        &mut self,
        pattern: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), AssistantError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            AssistantError::Validation(format!("invalid command pattern {pattern}: {err}"))
        })?;
        let info = handler.info();
        debug!(
            "registered pattern command (pattern={}, token={})",
            pattern, info.token
        );
        self.patterns.push((regex, handler));
        Arc::make_mut(&mut self.catalog).push(info);
        Ok(())
    }

    /// Map `alias` onto an already registered exact token. Unknown targets
    /// are logged and ignored.
    pub fn add_alias(&mut self, alias: &str, target: &str) -> bool {
        if !self.exact.contains_key(target) {
            warn!(
                "ignoring alias for unknown command (alias={}, target={})",
                alias, target
            );
            return false;
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        true
    }

    /// Registered commands in registration order.
    pub fn catalog(&self) -> Arc<Vec<CommandInfo>> {
        self.catalog.clone()
    }

    /// Find the handler for a command token.
    fn resolve(
        &self,
        token: &str,
    ) -> Option<(String, Arc<dyn CommandHandler>, BTreeMap<String, String>)> {
        let token = self.aliases.get(token).map(String::as_str).unwrap_or(token);
        if let Some(handler) = self.exact.get(token) {
            return Some((token.to_string(), handler.clone(), BTreeMap::new()));
        }
        self.patterns.iter().find_map(|(regex, handler)| {
            let captures = regex.captures(token)?;
            let named = regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|value| (name.to_string(), value.as_str().to_string()))
                })
                .collect();
            Some((token.to_string(), handler.clone(), named))
        })
    }

    /// Parse, gate, resolve, and run the command in `message`.
    pub async fn dispatch(
        &self,
        message: &IncomingMessage,
    ) -> Result<DispatchOutcome, CommandError> {
        let runtime = &self.services.runtime;
        if !runtime.is_enabled() && !runtime.is_master(&message.user_id) {
            debug!(
                "bot disabled; message suppressed (user={}, group={})",
                message.user_id, message.group_id
            );
            return Ok(DispatchOutcome::Suppressed);
        }
        let Some(parsed) = parse_command(&message.raw_text) else {
            return Ok(DispatchOutcome::NotCommand);
        };
        let Some((command, handler, captures)) = self.resolve(&parsed.command) else {
            return Ok(DispatchOutcome::NotCommand);
        };

        info!(
            "dispatching command (command={}, user={}, group={}, args={})",
            command,
            message.user_id,
            message.group_id,
            parsed.args.len()
        );
        let ctx = CommandContext {
            command: command.clone(),
            rest: parsed.rest.clone(),
            captures,
            key: message.key(),
            message_id: message.message_id.clone(),
            sender_name: message.sender_name.clone(),
            services: self.services.clone(),
            catalog: self.catalog.clone(),
        };

        let result = AssertUnwindSafe(handler.execute(&parsed.args, &ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(AssistantError::Internal(panic_message(payload))));

        match result {
            Ok(reply) => Ok(DispatchOutcome::Handled { command, reply }),
            Err(source) => Err(CommandError {
                command,
                args: parsed.args,
                user_id: message.user_id.clone(),
                group_id: message.group_id.clone(),
                source,
            }),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("command handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("command handler panicked: {message}")
    } else {
        "command handler panicked".to_string()
    }
}
