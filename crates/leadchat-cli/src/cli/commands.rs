use anyhow::{Context, Result};
use leadchat_core::store::{SortDirection, SortField};
use leadchat_core::ChatRuntime;
use serde_json::json;
use tracing::warn;

use super::output::{print_json, ConversationList, ConversationRow};

/// One CLI invocation, already validated by clap
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Tabs,
    Conversations {
        tab: usize,
        search: Option<String>,
        sort: SortField,
        direction: SortDirection,
        all: bool,
    },
    Messages {
        phone: String,
    },
    Send {
        phone: String,
        content: String,
    },
    Clear {
        phone: String,
    },
    Delete {
        phone: String,
    },
    Ai {
        phone: String,
        enabled: bool,
    },
    Watch {
        tab: usize,
    },
}

pub async fn run_command(runtime: &mut ChatRuntime, command: CliCommand, pretty: bool) -> Result<()> {
    match command {
        CliCommand::Tabs => {
            let failed = runtime
                .refresh_all_tabs()
                .await
                .context("Failed to load tabs")?;
            for tab in failed {
                let error = runtime
                    .pager()
                    .state(tab)
                    .and_then(|s| s.error.clone())
                    .unwrap_or_default();
                warn!(tab, %error, "Tab count may be incomplete");
            }
            print_json(&runtime.tab_counts(), pretty)
        }

        CliCommand::Conversations {
            tab,
            search,
            sort,
            direction,
            all,
        } => {
            runtime
                .select_tab_with_search(tab, search.as_deref().unwrap_or(""))
                .await
                .context("Failed to load conversations")?;
            if all {
                runtime.load_all().await?;
            }

            let label = runtime
                .partitioner()
                .bucket(tab)
                .map(|b| b.label.as_str())
                .unwrap_or("");
            let list = ConversationList {
                tab,
                label,
                page: runtime.pager().state(tab),
                conversations: runtime
                    .visible_conversations(sort, direction)
                    .into_iter()
                    .map(ConversationRow::from)
                    .collect(),
            };
            print_json(&list, pretty)
        }

        CliCommand::Messages { phone } => {
            runtime
                .open_conversation(&phone)
                .await
                .with_context(|| format!("Failed to load messages for {}", phone))?;
            print_json(runtime.store().active_transcript(), pretty)
        }

        CliCommand::Send { phone, content } => {
            let message = runtime
                .send_message(&phone, &content)
                .await
                .with_context(|| format!("Failed to send message to {}", phone))?;
            print_json(&message, pretty)
        }

        CliCommand::Clear { phone } => {
            runtime.clear_chat(&phone).await?;
            print_json(&json!({ "success": true, "cleared": phone }), pretty)
        }

        CliCommand::Delete { phone } => {
            runtime.delete_conversation(&phone).await?;
            print_json(&json!({ "success": true, "deleted": phone }), pretty)
        }

        CliCommand::Ai { phone, enabled } => {
            runtime.toggle_ai(&phone, enabled).await?;
            print_json(&json!({ "success": true, "phoneNumber": phone, "aiEnabled": enabled }), pretty)
        }

        CliCommand::Watch { tab } => watch(runtime, tab, pretty).await,
    }
}

/// Follow the live stream and print one JSON line per store change until
/// interrupted
async fn watch(runtime: &mut ChatRuntime, tab: usize, pretty: bool) -> Result<()> {
    if let Err(e) = runtime.select_tab(tab).await {
        warn!(error = %e, "Initial page failed; continuing with live updates only");
    }
    runtime.drain_changes();

    let (mut rx, handle) = runtime.spawn_event_stream();
    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = runtime.handle_stream_message(message).await {
                    warn!(error = %e, "Failed to apply live update");
                }
                for change in runtime.drain_changes() {
                    print_json(&change, pretty)?;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.abort();
    Ok(())
}
