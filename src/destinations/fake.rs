//! Recording transport for tests: scripted failures, captured calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use zeroize::Zeroizing;

use super::transport::{BotIdentity, DeliveryTransport, DestinationCredentials, TransportError};
use crate::sources::Artifact;

#[derive(Debug, Default)]
pub struct RecordingTransport {
    document_failures: Mutex<VecDeque<TransportError>>,
    message_failures: Mutex<VecDeque<TransportError>>,
    documents: Mutex<Vec<(String, u64, String)>>,
    messages: Mutex<Vec<String>>,
    document_attempts: Mutex<usize>,
    tokens_seen: Mutex<Vec<String>>,
}

impl RecordingTransport {
    /// Fail the next document uploads with these errors, in order.
    pub fn fail_documents(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.document_failures.lock().unwrap().extend(errors);
    }

    pub fn fail_messages(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.message_failures.lock().unwrap().extend(errors);
    }

    /// Upload attempts, including failed ones
    pub fn document_calls(&self) -> usize {
        *self.document_attempts.lock().unwrap()
    }

    /// Successful uploads as (file name, size, caption)
    pub fn documents(&self) -> Vec<(String, u64, String)> {
        self.documents.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryTransport for RecordingTransport {
    async fn send_document(
        &self,
        credentials: &DestinationCredentials,
        artifact: &Artifact,
        caption: &str,
    ) -> Result<(), TransportError> {
        *self.document_attempts.lock().unwrap() += 1;
        self.tokens_seen
            .lock()
            .unwrap()
            .push(credentials.bot_token.to_string());
        if let Some(err) = self.document_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.documents.lock().unwrap().push((
            artifact.file_name.clone(),
            artifact.size,
            caption.to_string(),
        ));
        Ok(())
    }

    async fn send_message(
        &self,
        _credentials: &DestinationCredentials,
        text: &str,
    ) -> Result<(), TransportError> {
        if let Some(err) = self.message_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn verify(&self, _credentials: &DestinationCredentials) -> Result<BotIdentity, TransportError> {
        Ok(BotIdentity {
            id: 1,
            username: Some("fake_bot".to_string()),
            first_name: "Fake".to_string(),
        })
    }
}

pub fn credentials() -> DestinationCredentials {
    DestinationCredentials {
        bot_token: Zeroizing::new("123:token".to_string()),
        chat_id: Zeroizing::new("-100".to_string()),
    }
}
