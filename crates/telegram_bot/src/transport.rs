//! Outbound side of the chat platform.
//!
//! Handlers never talk to teloxide directly; they go through [`Transport`] so
//! the dialog logic can run against a recording fake in tests.

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{CallbackQueryId, InlineKeyboardMarkup, InputFile, KeyboardMarkup, MessageId},
};

#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(String);

impl From<teloxide::RequestError> for TransportError {
    fn from(err: teloxide::RequestError) -> Self {
        Self(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Keyboard {
    Inline(InlineKeyboardMarkup),
    Reply(KeyboardMarkup),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a message and returns its id.
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<i32, TransportError>;

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError>;

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<(), TransportError>;
}

pub struct TeloxideTransport {
    bot: Bot,
}

impl TeloxideTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TeloxideTransport {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<i32, TransportError> {
        let request = self.bot.send_message(ChatId(chat_id), text);
        let sent = match keyboard {
            Some(Keyboard::Inline(kb)) => request.reply_markup(kb).await?,
            Some(Keyboard::Reply(kb)) => request.reply_markup(kb.resize_keyboard()).await?,
            None => request.await?,
        };
        Ok(sent.id.0)
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        let request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text);
        match keyboard {
            Some(kb) => request.reply_markup(kb).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()))
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.bot
            .send_document(
                ChatId(chat_id),
                InputFile::memory(data).file_name(file_name.to_string()),
            )
            .await?;
        Ok(())
    }
}
