//! Minimal console front-end.
//!
//! A line-oriented stand-in for the real presentation layer: it renders the
//! session state the engine exposes and polls the reveal buffer while a
//! reply animates. Submissions are awaited to completion, which is how this
//! front-end honors the advisory `is_generating` lock.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use storyline::RequestCoordinator;
use storyline::error::EngineError;
use storyline::storage::ClientStorage;
use storyline::types::{ChatMessage, NarrativeLength, NarrativeParameters, Role};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const REVEAL_POLL: Duration = Duration::from_millis(80);

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

pub async fn run(coordinator: Arc<RequestCoordinator>, storage: ClientStorage) -> io::Result<()> {
    println!("storyline - type :help for commands");

    if coordinator.refresh_credits().await.is_ok() {
        println!("credits remaining: {}", coordinator.credits().displayed());
    }
    if coordinator.refresh_history().await.is_ok() {
        let count = coordinator.session().snapshot().chat_history.len();
        println!("loaded {count} past conversation(s)");
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            ":quit" | ":q" => break,
            ":help" => print_help(),
            ":credits" => {
                if let Err(err) = coordinator.refresh_credits().await {
                    println!("! {err}");
                }
                println!("credits remaining: {}", coordinator.credits().displayed());
            }
            ":history" => {
                if let Err(err) = coordinator.refresh_history().await {
                    println!("! {err}");
                }
                print_history(&coordinator);
            }
            ":new" => {
                coordinator.new_conversation();
                println!("started a new conversation");
            }
            ":theme" => {
                let mode = storage.theme().toggled();
                if let Err(err) = storage.save_theme(mode) {
                    println!("! {err}");
                }
                println!("theme: {}", mode.as_str());
            }
            _ if input.starts_with(":open") => {
                open_by_index(&coordinator, input.trim_start_matches(":open").trim());
            }
            _ if input.starts_with(":generate") => {
                let length = match input.trim_start_matches(":generate").trim() {
                    "long" => NarrativeLength::Long,
                    _ => NarrativeLength::Short,
                };
                let parameters = read_parameters(&stdin)?;
                submit(&coordinator, |c| async move {
                    c.submit_new(parameters, length).await
                })
                .await;
            }
            _ => match coordinator.session().current_chat_id() {
                Some(chat_id) => {
                    let prompt = input.to_string();
                    submit(&coordinator, |c| async move {
                        c.submit_continuation(&chat_id, &prompt).await
                    })
                    .await;
                }
                None => println!("no active conversation, use :generate first"),
            },
        }
    }

    Ok(())
}

async fn submit<F, Fut>(coordinator: &Arc<RequestCoordinator>, request: F)
where
    F: FnOnce(Arc<RequestCoordinator>) -> Fut,
    Fut: Future<Output = Result<(), EngineError>>,
{
    match request(Arc::clone(coordinator)).await {
        Ok(()) => print_revealing(coordinator).await,
        Err(err) => println!("! {err}"),
    }
}

/// Poll the reveal buffer and print each newly revealed chunk, the way the
/// original UI repainted the animated bubble.
async fn print_revealing(coordinator: &Arc<RequestCoordinator>) {
    let mut printed = 0;
    loop {
        let Some((text, done)) = coordinator.reveal_snapshot() else {
            break;
        };
        let fresh: String = text.chars().skip(printed).collect();
        if !fresh.is_empty() {
            print!("{fresh}");
            let _ = io::stdout().flush();
            printed = text.chars().count();
        }
        if done {
            break;
        }
        tokio::time::sleep(REVEAL_POLL).await;
    }
    println!();
}

fn print_history(coordinator: &Arc<RequestCoordinator>) {
    let state = coordinator.session().snapshot();
    if state.chat_history.is_empty() {
        println!("no conversations yet");
        return;
    }
    for (index, thread) in state.chat_history.iter().enumerate() {
        let stamp = format_stamp(thread.updated_at);
        println!("{:>3}. {}  ({})", index + 1, thread.title, stamp);
    }
}

fn open_by_index(coordinator: &Arc<RequestCoordinator>, raw: &str) {
    let state = coordinator.session().snapshot();
    let thread = raw
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|n| state.chat_history.get(n));
    match thread {
        Some(thread) => {
            let id = thread.id.clone();
            coordinator.open_thread(&id);
            for message in &coordinator.session().snapshot().current_thread {
                print_message(message);
            }
        }
        None => println!("usage: :open <number from :history>"),
    }
}

fn print_message(message: &ChatMessage) {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "storyline",
    };
    println!("[{speaker} {}] {}", format_stamp(message.created_at), message.content);
}

fn format_stamp(mut stamp: OffsetDateTime) -> String {
    if let Ok(offset) = UtcOffset::current_local_offset() {
        stamp = stamp.to_offset(offset);
    }
    stamp.format(MESSAGE_TIME_FORMAT).unwrap_or_default()
}

fn read_parameters(stdin: &io::Stdin) -> io::Result<NarrativeParameters> {
    Ok(NarrativeParameters {
        industry: ask(stdin, "industry")?,
        brand_values: ask(stdin, "brand values")?,
        target_audience: ask(stdin, "target audience")?,
        brand_mission: ask(stdin, "brand mission")?,
        unique_selling_proposition: ask(stdin, "unique selling proposition")?,
        ..Default::default()
    })
}

fn ask(stdin: &io::Stdin, label: &str) -> io::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_help() {
    println!(":generate [long]  start a narrative from brand parameters");
    println!("<free text>       continue the active conversation");
    println!(":history          list past conversations");
    println!(":open <n>         load a past conversation");
    println!(":new              start over");
    println!(":credits          show remaining credits");
    println!(":theme            toggle light/dark");
    println!(":quit             exit");
}
