//! Adaptive Card payloads sent during account linking.

use serde_json::{json, Value};

const ADAPTIVE_CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const ADAPTIVE_CARD_VERSION: &str = "1.2";

/// Card asking an unlinked Teams user to connect their account
///
/// Deterministic: the same URL always renders the same card.
pub fn build_linking_card(linking_url: &str) -> Value {
    json!({
        "type": "AdaptiveCard",
        "$schema": ADAPTIVE_CARD_SCHEMA,
        "version": ADAPTIVE_CARD_VERSION,
        "body": [
            {
                "type": "TextBlock",
                "text": "Your Microsoft Teams identity will be linked to your account when you click **Link**. You need to link your account before you can take action on issues from Teams.",
                "wrap": true
            }
        ],
        "actions": [
            {
                "type": "Action.OpenUrl",
                "title": "Link",
                "url": linking_url
            }
        ]
    })
}

/// Card confirming that the link completed
pub fn build_linked_card() -> Value {
    json!({
        "type": "AdaptiveCard",
        "$schema": ADAPTIVE_CARD_SCHEMA,
        "version": ADAPTIVE_CARD_VERSION,
        "body": [
            {
                "type": "TextBlock",
                "text": "Your Microsoft Teams identity has been linked to your account. You can now resolve, ignore and assign issues directly from Teams.",
                "wrap": true
            }
        ]
    })
}
