//! Credential maintenance.

use std::io::Write;

use gantry_api::{ApiError, Credential, CredentialStore, ManagementClient, Retrier};

use crate::cli::AuthCommands;
use crate::error::CliError;
use crate::output::{Message, OutputFormat};

/// Clients whose credential can be replaced on demand.
pub trait RefreshCredential {
    /// Pull the newest credential from the store and start using it.
    fn refresh_credential(&self) -> Result<Credential, ApiError>;
}

impl<C, S> RefreshCredential for Retrier<C, S>
where
    C: ManagementClient + Clone,
    S: CredentialStore,
{
    fn refresh_credential(&self) -> Result<Credential, ApiError> {
        self.refresh_now()
    }
}

/// Handler for `auth` subcommands.
pub struct AuthCommand<'a, R> {
    refresher: &'a R,
}

impl<'a, R: RefreshCredential> AuthCommand<'a, R> {
    /// Creates a new auth command handler.
    #[must_use]
    pub const fn new(refresher: &'a R) -> Self {
        Self { refresher }
    }

    /// Executes an auth subcommand.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat, command: &AuthCommands) -> Result<(), CliError> {
        match command {
            AuthCommands::Refresh => {
                let credential = self.refresher.refresh_credential()?;
                format.write(
                    writer,
                    &Message::success(format!("API credential refreshed ({})", credential.masked())),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    impl RefreshCredential for Fixed {
        fn refresh_credential(&self) -> Result<Credential, ApiError> {
            self.0.map(Credential::new).ok_or(ApiError::NoActiveCredential)
        }
    }

    #[test]
    fn refresh_prints_masked_key() {
        let mut buf = Vec::new();
        AuthCommand::new(&Fixed(Some("gantry_0123456789")))
            .execute(&mut buf, &OutputFormat::default(), &AuthCommands::Refresh)
            .expect("refresh");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "✓ API credential refreshed (gant********)\n"
        );
    }

    #[test]
    fn empty_store_fails() {
        let err = AuthCommand::new(&Fixed(None))
            .execute(&mut Vec::<u8>::new(), &OutputFormat::default(), &AuthCommands::Refresh)
            .unwrap_err();
        assert!(matches!(err, CliError::Api(ApiError::NoActiveCredential)));
    }
}
