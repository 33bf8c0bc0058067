//! HTML messages posted to breakout channels and meeting chats.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::graph::{ChatMessage, ItemBody, Mention, MentionedIdentity, MentionedUser};
use crate::models::User;

/// Placeholder replaced with a link to the main meeting.
pub const MEETING_LINK_PLACEHOLDER: &str = "[meeting-link]";
/// Placeholder replaced with the receiving group's name.
pub const GROUP_NAME_PLACEHOLDER: &str = "[group-name]";

static CHAT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"meetup-join/([^/?#]+)").expect("valid chat id pattern"));

/// Chat thread id embedded in a Teams meeting join URL.
pub fn chat_id_from_join_url(join_url: &str) -> Option<String> {
    CHAT_ID
        .captures(join_url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty())
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Append one `<at>` tag per user to `content` and build the message.
fn with_mentions(mut content: String, mentioned: &[User]) -> ChatMessage {
    let mut mentions = Vec::with_capacity(mentioned.len());
    for (i, person) in mentioned.iter().enumerate() {
        content.push_str(&format!(
            " <at id=\"{}\">{}</at> ",
            i,
            escape_html(&person.display_name)
        ));
        mentions.push(Mention {
            id: i,
            mention_text: person.display_name.clone(),
            mentioned: MentionedIdentity {
                user: MentionedUser {
                    display_name: person.display_name.clone(),
                    id: person.id.clone(),
                    user_identity_type: "aadUser".to_string(),
                },
            },
        });
    }

    ChatMessage {
        body: ItemBody {
            content_type: "html".to_string(),
            content,
        },
        mentions,
    }
}

/// Channel post announcing a group's dedicated meeting.
pub fn channel_announcement(join_url: &str, mentioned: &[User]) -> ChatMessage {
    let content = format!(
        "<h1>Hey everyone!</h1>\n\
         Let's use this meeting to have a private breakout!\n\
         <br />\n\
         <h2><a href=\"{}\">Join meeting</a></h2>\n\
         <br />\n",
        escape_html(join_url)
    );
    with_mentions(content, mentioned)
}

/// Fill the broadcast placeholders for one group.
pub fn render_broadcast(template: &str, group_name: &str, main_join_url: Option<&str>) -> String {
    let link = match main_join_url {
        Some(url) => format!("<a href=\"{}\">Join main meeting</a>", escape_html(url)),
        None => String::new(),
    };
    template
        .replace(MEETING_LINK_PLACEHOLDER, &link)
        .replace(GROUP_NAME_PLACEHOLDER, &escape_html(group_name))
}

/// Broadcast message mentioning every member of the group.
pub fn broadcast_message(rendered: String, mentioned: &[User]) -> ChatMessage {
    let content = if mentioned.is_empty() {
        rendered
    } else {
        format!("{}<br /><br />", rendered)
    };
    with_mentions(content, mentioned)
}
