use crate::config::Config;
use crate::message::{BaseMessage, Recipient};

/// Caller flags controlling which kinds of tracking markup the personalized
/// copies carry
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingOptions {
    pub open_tracking: bool,
    pub link_tracking: bool,
}

/// Produces the per-recipient body sent over the wire, and strips tracking
/// markup back out of the canonical body before it is recorded.
///
/// `build_body` must be pure: it is called once per recipient inside the
/// dispatch loop and must not observe or mutate anything outside its
/// arguments.
pub trait TrackingBodyBuilder {
    /// Derive the personalized body for one recipient
    fn build_body(
        &self,
        recipient: &Recipient,
        message: &BaseMessage,
        options: &TrackingOptions,
    ) -> String;

    /// Remove tracking markup, restoring the plain content that the
    /// canonical record should show
    fn strip_body(&self, body: &str) -> String;
}

/// Pixel-and-link tracking against a configured tracking host.
///
/// Open tracking appends (or reuses) a 1x1 pixel pointing at
/// `{host}/open/{message_id}`; link tracking rewrites `href` targets to
/// `{host}/link/{message_id}?u={hex(url)}`.  Personalization tags both with
/// `r={hex(recipient email)}` so opens and clicks attribute to the right
/// recipient.
pub struct TrackedBodyBuilder {
    host: String,
}

impl TrackedBodyBuilder {
    pub fn new(config: &Config) -> TrackedBodyBuilder {
        TrackedBodyBuilder {
            host: config.tracking_host.clone(),
        }
    }

    fn open_url(&self, message_id: &str) -> String {
        format!("{}/open/{}", self.host, message_id)
    }

    /// Rewrite every absolute http(s) link to point at the tracking host.
    /// Links already on the tracking host are left alone.
    fn rewrite_links(&self, body: &str, message_id: &str) -> String {
        let mut out = String::with_capacity(body.len() + 64);
        let mut rest = body;
        while let Some(pos) = rest.find("href=\"") {
            let start = pos + 6;
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let end = match tail.find('"') {
                Some(e) => e,
                None => {
                    out.push_str(tail);
                    return out;
                }
            };
            let url = &tail[..end];
            if url.starts_with("http") && !url.starts_with(&self.host) {
                out.push_str(&format!(
                    "{}/link/{}?u={}",
                    self.host,
                    message_id,
                    hex::encode(url)
                ));
            } else {
                out.push_str(url);
            }
            rest = &tail[end..];
        }
        out.push_str(rest);
        out
    }

    /// Tag the pixel and every tracked link with the recipient identifier
    fn personalize(&self, body: &str, message_id: &str, recipient: &Recipient) -> String {
        let tag = hex::encode(&recipient.email);

        let open_url = self.open_url(message_id);
        let tagged = body.replace(
            &format!("{}\"", open_url),
            &format!("{}?r={}\"", open_url, tag),
        );

        let link_prefix = format!("{}/link/{}?u=", self.host, message_id);
        let mut out = String::with_capacity(tagged.len() + 64);
        let mut rest: &str = &tagged;
        while let Some(pos) = rest.find(&link_prefix) {
            let after = pos + link_prefix.len();
            let tail = &rest[after..];
            let end = match tail.find('"') {
                Some(e) => e,
                None => {
                    out.push_str(rest);
                    return out;
                }
            };
            out.push_str(&rest[..after + end]);
            if !tail[..end].contains("&r=") {
                out.push_str(&format!("&r={}", tag));
            }
            rest = &tail[end..];
        }
        out.push_str(rest);
        out
    }

    fn strip_pixels(&self, body: &str) -> String {
        let marker = format!("{}/open/", self.host);
        let mut out = String::with_capacity(body.len());
        let mut rest = body;
        while let Some(pos) = rest.find("<img") {
            let tag_end = match rest[pos..].find('>') {
                Some(e) => pos + e + 1,
                None => break,
            };
            if rest[pos..tag_end].contains(&marker) {
                out.push_str(&rest[..pos]);
            } else {
                out.push_str(&rest[..tag_end]);
            }
            rest = &rest[tag_end..];
        }
        out.push_str(rest);
        out
    }

    /// Restore the original target of every tracked link
    fn unwrap_links(&self, body: &str) -> String {
        let prefix = format!("{}/link/", self.host);
        let mut out = String::with_capacity(body.len());
        let mut rest = body;
        while let Some(pos) = rest.find(&prefix) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            let end = match tail.find('"') {
                Some(e) => e,
                None => {
                    out.push_str(tail);
                    return out;
                }
            };
            let url = &tail[..end];
            let restored = url.find("?u=").and_then(|upos| {
                let encoded = &url[upos + 3..];
                let encoded = match encoded.find('&') {
                    Some(a) => &encoded[..a],
                    None => encoded,
                };
                hex_decode_utf8(encoded)
            });
            match restored {
                Some(original) => out.push_str(&original),
                None => out.push_str(url),
            }
            rest = &tail[end..];
        }
        out.push_str(rest);
        out
    }
}

impl TrackingBodyBuilder for TrackedBodyBuilder {
    fn build_body(
        &self,
        recipient: &Recipient,
        message: &BaseMessage,
        options: &TrackingOptions,
    ) -> String {
        let mut body = message.body.clone();

        if options.link_tracking {
            body = self.rewrite_links(&body, &message.message_id);
        }

        if options.open_tracking {
            let open_url = self.open_url(&message.message_id);
            if !body.contains(&open_url) {
                body.push_str(&format!(
                    "<img width=\"1\" height=\"1\" alt=\"\" src=\"{}\">",
                    open_url
                ));
            }
        }

        if options.open_tracking || options.link_tracking {
            body = self.personalize(&body, &message.message_id, recipient);
        }

        body
    }

    fn strip_body(&self, body: &str) -> String {
        self.unwrap_links(&self.strip_pixels(body))
    }
}

fn hex_decode_utf8(s: &str) -> Option<String> {
    hex::decode(s)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
