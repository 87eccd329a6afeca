//! Chat command - Interactive dialogue on stdin.
//!
//! Lines starting with `/` are commands; anything else is a topic.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use featsum_chat::{CallbackAction, DialogueController, Reply, SessionStore, UserId};

use super::GlobalArgs;

#[derive(Args)]
pub struct ChatArgs {
    /// User id for the session
    #[arg(long, default_value_t = 1)]
    user: UserId,
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum ChatCommand {
    Start,
    Help,
    Cancel,
    Generate,
    Toggle(String),
    Quit,
    Unknown(String),
    Text(String),
}

impl ChatCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Self::Text(line.to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        match name {
            "start" => Self::Start,
            "help" => Self::Help,
            "cancel" => Self::Cancel,
            "generate" => Self::Generate,
            "toggle" if !rest.is_empty() => Self::Toggle(rest.to_string()),
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

pub async fn execute(args: ChatArgs, global: &GlobalArgs) -> Result<()> {
    let settings = global.settings()?;
    let generator = global.report_generator(&settings)?;
    let rows = Arc::new(global.spreadsheet()?);

    let dialogue = DialogueController::new(Arc::new(SessionStore::new()), rows, Arc::new(generator))
        .with_max_message_chars(settings.display.max_message_chars);
    let user = args.user;

    print_reply(&dialogue.start(user));
    println!("(/toggle <номер|категория>, /generate, /cancel, /help, /quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let replies = match ChatCommand::parse(&line) {
            ChatCommand::Start => vec![dialogue.start(user)],
            ChatCommand::Help => vec![dialogue.help()],
            ChatCommand::Cancel => vec![dialogue.cancel(user)],
            ChatCommand::Generate => {
                print_reply(&dialogue.generating_notice());
                dialogue.generate(user).await
            }
            ChatCommand::Toggle(target) => {
                let category = resolve_category(&dialogue, user, &target);
                vec![dialogue.toggle_category(user, &category)]
            }
            ChatCommand::Quit => break,
            ChatCommand::Unknown(name) => {
                vec![Reply::text(format!("Неизвестная команда: /{}", name))]
            }
            ChatCommand::Text(text) if text.is_empty() => continue,
            ChatCommand::Text(text) => match dialogue.submit_topic(user, &text).await {
                Some(reply) => vec![reply],
                None => vec![Reply::text("Используйте /start для начала нового диалога.")],
            },
        };

        for reply in &replies {
            print_reply(reply);
        }
    }

    Ok(())
}

/// A 1-based number picks from the offered categories; anything else is a label.
fn resolve_category(dialogue: &DialogueController, user: UserId, target: &str) -> String {
    let offered = dialogue
        .session(user)
        .map(|s| s.available_categories)
        .unwrap_or_default();

    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| offered.get(i).cloned())
        .unwrap_or_else(|| target.to_string())
}

fn print_reply(reply: &Reply) {
    println!("{}", reply.text);

    let mut number = 0;
    for row in &reply.keyboard {
        let line: Vec<String> = row
            .iter()
            .map(|button| match &button.action {
                CallbackAction::ToggleCategory(_) => {
                    number += 1;
                    format!("[{}] {}", number, button.label)
                }
                CallbackAction::Generate => format!("[/generate] {}", button.label),
                CallbackAction::Cancel => format!("[/cancel] {}", button.label),
                CallbackAction::StartNew => format!("[/start] {}", button.label),
            })
            .collect();
        println!("  {}", line.join("   "));
    }
    println!();
}
