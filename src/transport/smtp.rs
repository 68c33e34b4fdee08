use std::net::ToSocketAddrs;
use std::time::Duration;

use lettre::smtp::authentication::{Credentials, Mechanism};
use lettre::smtp::client::net::ClientTlsParameters;
use lettre::smtp::extension::ClientId;
use lettre::smtp::response::Severity;
use lettre::smtp::{ClientSecurity, SmtpClient};
use lettre::Transport as LettreTransport;
use native_tls::{Protocol, TlsConnector};

use crate::config::{AuthMechanism, Config};
use crate::message::{OutboundMessage, Recipient};
use crate::transport::{Transport, TransportError};

/// Delivers through a configured SMTP relay, one recipient per session
pub struct SmtpRelayTransport {
    config: Config,
}

impl SmtpRelayTransport {
    pub fn new(config: Config) -> SmtpRelayTransport {
        SmtpRelayTransport { config }
    }

    fn client_security(&self) -> Result<ClientSecurity, TransportError> {
        if !self.config.relay.use_tls {
            return Ok(ClientSecurity::None);
        }

        let tls_builder = match TlsConnector::builder()
            .min_protocol_version(Some(Protocol::Tlsv12))
            .build()
        {
            Ok(connector) => connector,
            Err(e) => {
                return Err(TransportError::new(format!(
                    "failed to create TLS connector: {:?}",
                    e
                )));
            }
        };

        let tls_parameters =
            ClientTlsParameters::new(self.config.relay.domain_name.clone(), tls_builder);

        if self.config.require_tls {
            Ok(ClientSecurity::Required(tls_parameters))
        } else {
            Ok(ClientSecurity::Opportunistic(tls_parameters))
        }
    }
}

impl Transport for SmtpRelayTransport {
    fn send_to(
        &mut self,
        message: &OutboundMessage,
        recipient: &Recipient,
    ) -> Result<(), TransportError> {
        // The builder validated addresses when the message was built, so
        // this conversion should always pass.
        let sendable_email = match message.as_sendable_email() {
            Ok(se) => se,
            Err(e) => {
                warn!("invalid email address error: {:?}", e);
                return Err(TransportError::new(format!(
                    "invalid email address error: {:?}",
                    e
                )));
            }
        };

        let client_security = self.client_security()?;

        let relay = &self.config.relay;
        let sockaddr = match (&*relay.domain_name, relay.port).to_socket_addrs() {
            Err(e) => {
                warn!(
                    "ToSocketAddrs failed for ({}, {}): {:?}",
                    relay.domain_name, relay.port, e
                );
                return Err(TransportError::new(format!(
                    "ToSocketAddrs failed for ({}, {}): {:?}",
                    relay.domain_name, relay.port, e
                )));
            }
            Ok(mut iter) => match iter.next() {
                Some(sa) => sa,
                None => {
                    return Err(TransportError::new(format!(
                        "no addresses for ({}, {})",
                        relay.domain_name, relay.port
                    )));
                }
            },
        };

        let mailer = match SmtpClient::new(sockaddr, client_security) {
            Ok(m) => m,
            Err(e) => {
                return Err(TransportError::new(format!(
                    "unable to setup SMTP transport: {:?}",
                    e
                )));
            }
        };

        let mut mailer = mailer
            .hello_name(ClientId::Domain(self.config.helo_name.clone()))
            .smtp_utf8(true) // is only used if the server supports it
            .timeout(Some(Duration::from_secs(self.config.smtp_timeout_secs)));

        if let Some(ref auth) = relay.auth {
            let mechanism = match auth.mechanism {
                AuthMechanism::Plain => Mechanism::Plain,
                AuthMechanism::Login => Mechanism::Login,
            };
            mailer = mailer
                .authentication_mechanism(mechanism)
                .credentials(Credentials::new(
                    auth.username.clone(),
                    auth.password.clone(),
                ));
        }

        let mut mailer = mailer.transport();

        debug!(
            "starting SMTP delivery to {} at {}",
            recipient.email, relay.domain_name
        );

        let result = match mailer.send(sendable_email) {
            Ok(response) => match response.code.severity {
                Severity::PositiveCompletion | Severity::PositiveIntermediate => {
                    info!("delivery success: {:?}", response);
                    Ok(())
                }
                Severity::TransientNegativeCompletion
                | Severity::PermanentNegativeCompletion => {
                    info!("delivery failed: {:?}", response);
                    Err(TransportError::new(format!("{:?}", response)))
                }
            },
            Err(e) => {
                info!("delivery failed: {:?}", e);
                Err(TransportError::new(format!("{:?}", e)))
            }
        };

        mailer.close();

        result
    }
}
