use lettre::{EmailAddress, Envelope, SendableEmail};

/// A single recipient of an outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// The recipient's email address
    pub email: String,

    /// Display name, if known
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(email: &str) -> Recipient {
        Recipient {
            email: email.to_owned(),
            name: None,
        }
    }

    /// Rendered form for a To: header
    pub fn as_mailbox(&self) -> String {
        match self.name {
            Some(ref name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// The caller-supplied material a canonical message is built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub from: String,
    pub subject: String,

    /// HTML body.  May already carry tracking markup produced upstream.
    pub body: String,

    pub to: Vec<Recipient>,

    /// Threading headers carried over onto every copy sent
    pub references: Vec<String>,
    pub in_reply_to: Option<String>,
}

/// The canonical message recorded as "sent".
///
/// Owned exclusively by the orchestrator for the duration of one operation,
/// and persisted exactly once, after all deliveries complete.  The body
/// starts out carrying tracking markup and is stripped back to plain
/// content before the record is saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseMessage {
    /// Generated message id (`uuid@helo_name`)
    pub message_id: String,

    pub from: String,
    pub subject: String,
    pub body: String,
    pub to: Vec<Recipient>,

    pub references: Vec<String>,
    pub in_reply_to: Option<String>,

    /// False until the post-send commit
    pub is_sent: bool,
}

/// A per-recipient copy of a `BaseMessage`, prepared for the wire.
///
/// This is the transport's entire input contract: one recipient, a
/// personalized body, and the threading headers copied verbatim from the
/// canonical message so the copy threads correctly in the recipient's mail
/// client.  Created fresh for each loop iteration and never persisted.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub message_id: String,
    pub from: String,
    pub to: Recipient,
    pub subject: String,
    pub body: String,
    pub references: Vec<String>,
    pub in_reply_to: Option<String>,
}

impl OutboundMessage {
    /// Copy everything but the body from the canonical message
    pub fn for_recipient(base: &BaseMessage, recipient: &Recipient, body: String) -> OutboundMessage {
        OutboundMessage {
            message_id: base.message_id.clone(),
            from: base.from.clone(),
            to: recipient.clone(),
            subject: base.subject.clone(),
            body,
            references: base.references.clone(),
            in_reply_to: base.in_reply_to.clone(),
        }
    }

    /// Render the RFC 5322 wire form
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(self.body.len() + 256);
        out.push_str(&format!("From: {}\r\n", self.from));
        out.push_str(&format!("To: {}\r\n", self.to.as_mailbox()));
        out.push_str(&format!("Subject: {}\r\n", self.subject));
        out.push_str(&format!("Message-ID: <{}>\r\n", self.message_id));
        if let Some(ref irt) = self.in_reply_to {
            out.push_str(&format!("In-Reply-To: {}\r\n", irt));
        }
        if !self.references.is_empty() {
            out.push_str(&format!("References: {}\r\n", self.references.join(" ")));
        }
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/html; charset=utf-8\r\n");
        out.push_str("\r\n");
        out.push_str(&self.body);
        out.into_bytes()
    }

    /// Adapt to lettre.  `lettre::EmailAddress` re-checks address validity,
    /// but the builder already validated these so this should always pass.
    pub fn as_sendable_email(&self) -> Result<SendableEmail, ::lettre::error::Error> {
        let envelope = Envelope::new(
            Some(EmailAddress::new(self.from.clone())?),
            vec![EmailAddress::new(self.to.email.clone())?],
        )?;
        Ok(SendableEmail::new(
            envelope,
            self.message_id.clone(),
            self.as_bytes(),
        ))
    }
}
