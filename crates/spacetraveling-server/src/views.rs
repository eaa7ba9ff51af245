// File: spacetraveling-server/src/views.rs
// Purpose: Maud markup for the listing, post and fallback pages
//
// All text coming from the content backend goes through maud's escaping.

use crate::pages::{post_path, PostView};
use chrono::{DateTime, Datelike, Utc};
use maud::{html, Markup, DOCTYPE};
use spacetraveling_content::{Cursor, Entry, RichTextSpan, SpanKind};

const SITE_NAME: &str = "spacetraveling";
const HTMX_SRC: &str = "https://unpkg.com/htmx.org@1.9.12";

/// Seconds before the loading page asks for the post again
const PENDING_REFRESH_SECONDS: u32 = 2;

const MONTHS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// `15 mar 2021`, or nothing for unpublished entries.
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => format!(
            "{:02} {} {}",
            date.day(),
            MONTHS[date.month0() as usize],
            date.year()
        ),
        None => String::new(),
    }
}

fn load_more_href(cursor: &Cursor) -> String {
    format!("/posts/more?cursor={}", urlencoding::encode(cursor.as_str()))
}

fn layout(title: &str, head_extra: Markup, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="pt-BR" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                (head_extra)
                title { (title) }
                script src=(HTMX_SRC) {}
            }
            body {
                header {
                    a href="/" { (SITE_NAME) }
                }
                main { (body) }
            }
        }
    }
}

fn post_summary(entry: &Entry) -> Markup {
    html! {
        li {
            a href=(post_path(&entry.id)) {
                article {
                    h2 { (entry.title) }
                    p { (entry.subtitle) }
                    div {
                        time { (format_date(entry.published_at)) }
                        span { (entry.author) }
                    }
                }
            }
        }
    }
}

/// The list item holding the "load more" button; swapped out by the
/// fragment the button fetches.
fn load_more_item(cursor: &Cursor, failed: bool) -> Markup {
    html! {
        li #load-more {
            @if failed {
                p role="alert" { "Não foi possível carregar mais posts." }
            }
            button type="button" hx-get=(load_more_href(cursor)) hx-target="#load-more" hx-swap="outerHTML" {
                "Carregar mais posts"
            }
        }
    }
}

/// Home page: the first page of posts plus the "load more" button.
pub fn home(entries: &[Entry], next: Option<&Cursor>) -> Markup {
    layout(
        SITE_NAME,
        html! {},
        html! {
            ul #posts {
                @for entry in entries {
                    (post_summary(entry))
                }
                @if let Some(cursor) = next {
                    (load_more_item(cursor, false))
                }
            }
        },
    )
}

/// Fragment answering a "load more": the new posts, then the button for the
/// following page when there is one.
pub fn more_posts(entries: &[Entry], next: Option<&Cursor>) -> Markup {
    html! {
        @for entry in entries {
            (post_summary(entry))
        }
        @if let Some(cursor) = next {
            (load_more_item(cursor, false))
        }
    }
}

/// Fragment answering a failed "load more": the same button, so the
/// reader can retry from the same cursor.
pub fn load_more_failed(cursor: &Cursor) -> Markup {
    load_more_item(cursor, true)
}

fn rich_text(spans: &[RichTextSpan]) -> Markup {
    // Consecutive list items of the same kind share one list element.
    let mut groups: Vec<(SpanKind, Vec<&RichTextSpan>)> = Vec::new();
    for span in spans {
        let extends = matches!(span.kind, SpanKind::ListItem | SpanKind::OListItem)
            && groups.last().map(|(kind, _)| *kind) == Some(span.kind);
        match groups.last_mut() {
            Some((_, items)) if extends => items.push(span),
            _ => groups.push((span.kind, vec![span])),
        }
    }

    html! {
        @for (kind, items) in &groups {
            @match kind {
                SpanKind::ListItem => {
                    ul { @for item in items { li { (item.text) } } }
                }
                SpanKind::OListItem => {
                    ol { @for item in items { li { (item.text) } } }
                }
                _ => {
                    @for item in items { (rich_text_block(item)) }
                }
            }
        }
    }
}

fn rich_text_block(span: &RichTextSpan) -> Markup {
    html! {
        @match span.kind {
            SpanKind::Heading1 => { h1 { (span.text) } }
            SpanKind::Heading2 => { h2 { (span.text) } }
            SpanKind::Heading3 => { h3 { (span.text) } }
            SpanKind::Heading4 => { h4 { (span.text) } }
            SpanKind::Heading5 => { h5 { (span.text) } }
            SpanKind::Heading6 => { h6 { (span.text) } }
            SpanKind::Preformatted => { pre { (span.text) } }
            _ => { p { (span.text) } }
        }
    }
}

pub fn post(view: &PostView) -> Markup {
    let entry = &view.entry;
    layout(
        &format!("{} | {}", entry.title, SITE_NAME),
        html! {},
        html! {
            article {
                @if !entry.banner.url.is_empty() {
                    img src=(entry.banner.url) alt="banner";
                }
                h1 { (entry.title) }
                div {
                    time { (format_date(entry.published_at)) }
                    span { (entry.author) }
                    span { (view.reading_minutes) " min" }
                }
                @for block in &entry.content {
                    section {
                        h2 { (block.heading) }
                        div { (rich_text(&block.body)) }
                    }
                }
            }
        },
    )
}

/// Placeholder for a post that is still being generated; reloads itself.
pub fn loading() -> Markup {
    layout(
        SITE_NAME,
        html! {
            meta http-equiv="refresh" content=(PENDING_REFRESH_SECONDS);
        },
        html! {
            p { "Carregando..." }
        },
    )
}

pub fn not_found() -> Markup {
    layout(
        &format!("Post não encontrado | {}", SITE_NAME),
        html! {},
        html! {
            h1 { "404" }
            p { "Post não encontrado." }
            a href="/" { "Voltar para a home" }
        },
    )
}

pub fn unavailable() -> Markup {
    layout(
        SITE_NAME,
        html! {},
        html! {
            h1 { "503" }
            p { "Conteúdo indisponível no momento. Tente novamente em instantes." }
        },
    )
}
