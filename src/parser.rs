use crate::slack::InboundEvent;

/// A command addressed to the bot: the message text with the mention
/// stripped, and the channel the reply should go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub text: String,
    pub channel: String,
}

/// Scan one poll batch for the first plain message that directly mentions
/// the bot. Only the first qualifying event is returned; the rest of the
/// batch is dropped until the next poll.
pub fn parse_bot_commands(events: &[InboundEvent], bot_id: &str) -> Option<ParsedCommand> {
    for event in events {
        if event.kind != "message" || event.subtype.is_some() {
            continue;
        }
        let Some(text) = event.text.as_deref() else {
            continue;
        };
        let Some((mentioned, rest)) = parse_direct_mention(text) else {
            continue;
        };
        if mentioned != bot_id {
            continue;
        }
        let Some(channel) = event.channel.clone() else {
            continue;
        };
        return Some(ParsedCommand {
            text: rest.to_string(),
            channel,
        });
    }
    None
}

/// A direct mention is a `<@USERID>` token at the very start of the text,
/// USERID beginning with `U` or `W`. Returns the mentioned ID and the rest
/// of the message with surrounding whitespace trimmed.
fn parse_direct_mention(text: &str) -> Option<(&str, &str)> {
    let after = text.strip_prefix("<@")?;
    let end = after.find('>')?;
    let id = &after[..end];
    if !id.starts_with('U') && !id.starts_with('W') {
        return None;
    }
    Some((id, after[end + 1..].trim()))
}
