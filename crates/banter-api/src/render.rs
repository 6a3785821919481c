use askama::Template;
use tracing::error;
use uuid::Uuid;

use banter_types::models::Message;

/// Turns a stored message into the fragment published on chat topics.
/// Subscribers receive the output verbatim.
pub trait MessageRenderer: Send + Sync {
    fn render(&self, message: &Message) -> String;
}

/// `<div class="event">` fragment with the author handle and body.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlFragmentRenderer;

/// Message fragment template. Author and body are HTML-escaped.
#[derive(Template)]
#[template(path = "message.html")]
struct MessageFragment<'a> {
    id: Uuid,
    author: &'a str,
    body: &'a str,
}

impl MessageRenderer for HtmlFragmentRenderer {
    fn render(&self, message: &Message) -> String {
        let fragment = MessageFragment {
            id: message.id,
            author: &message.author_username,
            body: &message.body,
        };
        fragment.render().unwrap_or_else(|e| {
            error!("Failed to render message {}: {}", message.id, e);
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(author: &str, body: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author_username: author.into(),
            conversation_id: None,
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fragment_contains_author_and_body() {
        let m = message("alice", "hello there");
        let html = HtmlFragmentRenderer.render(&m);
        assert!(html.starts_with("<div class=\"event\""));
        assert!(html.contains(&format!("message_{}", m.id)));
        assert!(html.contains(">alice<"));
        assert!(html.contains(">hello there<"));
    }

    #[test]
    fn markup_in_body_is_escaped() {
        let html = HtmlFragmentRenderer.render(&message("bob", "<script>alert(1)</script> & more"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)"));
        assert!(html.contains("&amp; more"));
    }
}
