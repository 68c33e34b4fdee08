use uuid::Uuid;

use crate::config::Config;
use crate::error::BuildError;
use crate::message::{BaseMessage, MessagePayload};

/// Builds the canonical message from a caller payload.  Failure here means
/// nothing was sent; the error propagates unmodified and the operation is
/// still safe to retry upstream.
pub trait MessageBuilder {
    fn build_for_send(&self, payload: &MessagePayload) -> Result<BaseMessage, BuildError>;
}

/// Default builder: validates addresses and header content, and stamps a
/// generated message id.
///
/// Every payload field that ends up in a message header is rejected if it
/// contains CR or LF; the wire form renders headers line by line, so a
/// line break in caller content would otherwise become an extra header.
pub struct PayloadMessageBuilder {
    helo_name: String,
}

fn valid_header_value(s: &str) -> bool {
    !s.contains('\r') && !s.contains('\n')
}

impl PayloadMessageBuilder {
    pub fn new(config: &Config) -> PayloadMessageBuilder {
        PayloadMessageBuilder {
            helo_name: config.helo_name.clone(),
        }
    }
}

impl MessageBuilder for PayloadMessageBuilder {
    fn build_for_send(&self, payload: &MessagePayload) -> Result<BaseMessage, BuildError> {
        if payload.from.trim().is_empty() {
            return Err(BuildError::MissingFrom);
        }
        if !valid_header_value(&payload.from) {
            return Err(BuildError::InvalidHeaderValue("from".to_owned()));
        }
        if !valid_header_value(&payload.subject) {
            return Err(BuildError::InvalidHeaderValue("subject".to_owned()));
        }
        for recipient in &payload.to {
            // Just a sanity check; lettre re-validates at the envelope
            if !recipient.email.contains('@') || !valid_header_value(&recipient.email) {
                return Err(BuildError::InvalidRecipient(recipient.email.clone()));
            }
            if let Some(ref name) = recipient.name {
                if !valid_header_value(name) {
                    return Err(BuildError::InvalidHeaderValue("to".to_owned()));
                }
            }
        }
        for reference in &payload.references {
            if !valid_header_value(reference) {
                return Err(BuildError::InvalidHeaderValue("references".to_owned()));
            }
        }
        if let Some(ref in_reply_to) = payload.in_reply_to {
            if !valid_header_value(in_reply_to) {
                return Err(BuildError::InvalidHeaderValue("in-reply-to".to_owned()));
            }
        }

        let message_id = format!(
            "{}@{}",
            Uuid::new_v4().hyphenated().to_string(),
            self.helo_name
        );

        Ok(BaseMessage {
            message_id,
            from: payload.from.clone(),
            subject: payload.subject.clone(),
            body: payload.body.clone(),
            to: payload.to.clone(),
            references: payload.references.clone(),
            in_reply_to: payload.in_reply_to.clone(),
            is_sent: false,
        })
    }
}
