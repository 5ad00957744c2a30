//! `/history [username]`: a player's name history, 24 names per page.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::builder::{
    CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, EditInteractionResponse,
};
use serenity::http::Http;
use serenity::model::application::{ButtonStyle, CommandInteraction};
use serenity::model::channel::ReactionType;
use tally_collector::{paginate, EndReason, HandlerError, PageControl, PageView, Pager, Pagination};
use tally_core::{ActorId, MessageId};
use tracing::info;

use crate::context::BotContext;
use crate::embed;
use crate::error::Result;
use crate::mojang::NameEntry;

/// Embeds hold at most 25 fields; 24 keeps three full inline columns.
pub const PAGE_SIZE: usize = 24;

pub fn split_pages(entries: &[NameEntry]) -> Vec<Vec<NameEntry>> {
    entries.chunks(PAGE_SIZE).map(<[NameEntry]>::to_vec).collect()
}

/// Underscores would otherwise turn into markdown italics.
pub fn escape_name(name: &str) -> String {
    name.replace('_', "\\_")
}

pub fn summary(username: &str, changes: usize) -> String {
    match changes {
        0 => format!("{username} has never changed their name."),
        1 => format!("{username} has changed their name once."),
        n => format!("{username} has changed their name {n} times."),
    }
}

pub fn page_footer(page: usize, total: usize) -> String {
    format!("Page {} of {}", page + 1, total)
}

fn entry_value(entry: &NameEntry) -> String {
    match entry.changed_to_at {
        Some(ms) => format!("<t:{}:F>", ms / 1000),
        None => "Original name".to_string(),
    }
}

/// Enabled state of each control, `None` meaning all disabled.
pub fn control_states(pager: Option<&Pager>) -> [(PageControl, bool); 4] {
    PageControl::ALL.map(|control| {
        let enabled = pager.is_some_and(|p| p.can_move(control));
        (control, enabled)
    })
}

fn control_emoji(control: PageControl) -> &'static str {
    match control {
        PageControl::First => "\u{23ee}\u{fe0f}",
        PageControl::Previous => "\u{25c0}\u{fe0f}",
        PageControl::Next => "\u{25b6}\u{fe0f}",
        PageControl::Last => "\u{23ed}\u{fe0f}",
    }
}

fn control_label(control: PageControl) -> &'static str {
    match control {
        PageControl::First => "First",
        PageControl::Previous => "Previous",
        PageControl::Next => "Next",
        PageControl::Last => "Last",
    }
}

fn control_row(pager: Option<&Pager>) -> CreateActionRow {
    let buttons = control_states(pager)
        .into_iter()
        .map(|(control, enabled)| {
            CreateButton::new(control.id())
                .label(control_label(control))
                .emoji(ReactionType::Unicode(control_emoji(control).to_string()))
                .style(if enabled {
                    ButtonStyle::Success
                } else {
                    ButtonStyle::Secondary
                })
                .disabled(!enabled)
        })
        .collect();
    CreateActionRow::Buttons(buttons)
}

fn close_note(reason: EndReason) -> &'static str {
    if reason.is_timeout() {
        "This menu timed out. Run `/history` again to keep browsing."
    } else {
        "This menu was closed. Run `/history` again to keep browsing."
    }
}

/// Rendered history of one player.
struct History {
    username: String,
    changes: usize,
    pages: Vec<Vec<NameEntry>>,
}

impl History {
    fn new(entries: Vec<NameEntry>) -> Self {
        let entries: Vec<NameEntry> = entries
            .into_iter()
            .map(|e| NameEntry {
                name: escape_name(&e.name),
                ..e
            })
            .collect();
        let username = entries.first().map(|e| e.name.clone()).unwrap_or_default();
        Self {
            username,
            changes: entries.len().saturating_sub(1),
            pages: split_pages(&entries),
        }
    }

    fn page(&self, index: usize) -> CreateEmbed {
        let mut e = CreateEmbed::new()
            .colour(embed::SUCCESS)
            .title(format!("Name history for {}", self.username))
            .description(summary(&self.username, self.changes))
            .footer(CreateEmbedFooter::new(page_footer(index, self.pages.len())));
        for entry in self.pages.get(index).into_iter().flatten() {
            e = e.field(&entry.name, entry_value(entry), true);
        }
        e
    }
}

struct HistoryView {
    http: Arc<Http>,
    command: CommandInteraction,
    history: History,
}

#[async_trait]
impl PageView for HistoryView {
    async fn show(&mut self, pager: &Pager) -> std::result::Result<(), HandlerError> {
        let edit = EditInteractionResponse::new()
            .embed(self.history.page(pager.cursor()))
            .components(vec![control_row(Some(pager))]);
        self.command
            .edit_response(&self.http, edit)
            .await
            .map_err(HandlerError::other)?;
        Ok(())
    }

    async fn close(&mut self, last_page: usize, reason: EndReason) -> std::result::Result<(), HandlerError> {
        let edit = EditInteractionResponse::new()
            .content(close_note(reason))
            .embed(self.history.page(last_page))
            .components(vec![control_row(None)]);
        self.command
            .edit_response(&self.http, edit)
            .await
            .map_err(HandlerError::other)?;
        info!(reason = %reason, last_page, "history browsing closed");
        Ok(())
    }
}

/// History of a username or UUID; `None` for unknown players.
async fn lookup(app: &BotContext, input: &str) -> Result<Option<Vec<NameEntry>>> {
    let Some(uuid) = app.mojang.resolve(input).await? else {
        return Ok(None);
    };
    if app.mojang.profile(&uuid).await?.is_none() {
        return Ok(None);
    }
    Ok(Some(app.mojang.name_history(&uuid).await?))
}

async fn reply_error(http: &Http, command: &CommandInteraction, text: &str) -> Result<()> {
    let e = embed::status(embed::ERROR, "Name history", text, &command.user.tag());
    command
        .edit_response(http, EditInteractionResponse::new().embed(e))
        .await?;
    Ok(())
}

pub async fn run(
    app: &Arc<BotContext>,
    http: Arc<Http>,
    command: CommandInteraction,
    username: Option<String>,
) -> Result<()> {
    command.defer(&http).await?;

    let Some(input) = username.filter(|u| !u.trim().is_empty()) else {
        return reply_error(&http, &command, "Provide the username or UUID of a player.").await;
    };

    let entries = match lookup(app, &input).await {
        Ok(Some(entries)) if !entries.is_empty() => entries,
        Ok(_) => {
            let text = format!("Couldn't find a player called `{input}`.");
            return reply_error(&http, &command, &text).await;
        }
        Err(e) => {
            reply_error(&http, &command, "The Mojang API didn't answer. Try again later.").await?;
            return Err(e);
        }
    };

    let history = History::new(entries);
    let page_count = history.pages.len();
    let first = history.page(0);

    let Some(pager) = Pager::new(page_count) else {
        command
            .edit_response(&http, EditInteractionResponse::new().embed(first))
            .await?;
        return Ok(());
    };

    let sent = command
        .edit_response(
            &http,
            EditInteractionResponse::new()
                .embed(first)
                .components(vec![control_row(Some(&pager))]),
        )
        .await?;

    let pagination = Pagination {
        message_id: MessageId(sent.id.get()),
        owner: ActorId(command.user.id.get()),
        page_count,
        idle: Duration::from_secs(app.config.collectors.history_idle_secs),
        failures: Some(app.failures.clone()),
    };
    let view = HistoryView {
        http,
        command,
        history,
    };
    paginate(&app.hub, pagination, view)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<NameEntry> {
        (0..n)
            .map(|i| NameEntry {
                name: format!("name_{i}"),
                changed_to_at: (i + 1 < n).then_some(1_600_000_000_000 + i as i64),
            })
            .collect()
    }

    #[test]
    fn pages_hold_twenty_four_names() {
        let pages = split_pages(&names(50));
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 24);
        assert_eq!(pages[2].len(), 2);
        assert_eq!(split_pages(&names(24)).len(), 1);
    }

    #[test]
    fn history_escapes_and_counts() {
        let history = History::new(names(3));
        assert_eq!(history.username, "name\\_0");
        assert_eq!(history.changes, 2);
        assert_eq!(history.pages.len(), 1);
    }

    #[test]
    fn summaries() {
        assert_eq!(summary("x", 0), "x has never changed their name.");
        assert_eq!(summary("x", 1), "x has changed their name once.");
        assert_eq!(summary("x", 4), "x has changed their name 4 times.");
    }

    #[test]
    fn footer_is_one_based() {
        assert_eq!(page_footer(0, 3), "Page 1 of 3");
        assert_eq!(page_footer(2, 3), "Page 3 of 3");
    }

    #[test]
    fn entry_values() {
        let original = NameEntry { name: "a".into(), changed_to_at: None };
        let changed = NameEntry { name: "b".into(), changed_to_at: Some(1_414_059_749_000) };
        assert_eq!(entry_value(&original), "Original name");
        assert_eq!(entry_value(&changed), "<t:1414059749:F>");
    }

    #[test]
    fn close_note_names_timeouts() {
        assert!(close_note(EndReason::IdleTimeout).contains("timed out"));
        assert!(close_note(EndReason::AbsoluteTimeout).contains("timed out"));
        assert!(close_note(EndReason::Stopped).contains("was closed"));
    }

    #[test]
    fn controls_grey_out_at_the_edges() {
        let mut pager = Pager::new(3).unwrap();
        let states = control_states(Some(&pager));
        assert_eq!(
            states.map(|(_, enabled)| enabled),
            [false, false, true, true]
        );

        pager.apply(PageControl::Last);
        let states = control_states(Some(&pager));
        assert_eq!(
            states.map(|(_, enabled)| enabled),
            [true, true, false, false]
        );

        assert!(control_states(None).iter().all(|(_, enabled)| !enabled));
    }
}
