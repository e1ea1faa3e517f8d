//! Messaging gateway that prints replies to a terminal.

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_rs_protocol::{DeliveryError, MessagingGateway, OutgoingMessage};
use std::io::{self, Write};

/// Gateway for a single local "group" backed by a writer (stdout by default).
pub struct ConsoleGateway {
    group_id: String,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleGateway {
    pub fn stdout(group_id: impl Into<String>) -> Self {
        Self::with_writer(group_id, Box::new(io::stdout()))
    }

    pub fn with_writer(group_id: impl Into<String>, out: Box<dyn Write + Send>) -> Self {
        Self {
            group_id: group_id.into(),
            out: Mutex::new(out),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}

fn format_message(group_id: &str, message: &OutgoingMessage) -> String {
    let mut line = format!("[{group_id}]");
    if let Some(reply_to) = &message.reply_to {
        line.push_str(&format!(" (re {reply_to})"));
    }
    if let Some(image) = &message.image {
        line.push_str(&format!(" <image, {} bytes>", image.len()));
    }
    if let Some(text) = &message.text {
        line.push(' ');
        line.push_str(text);
    }
    line
}

#[async_trait]
impl MessagingGateway for ConsoleGateway {
    async fn send_message(
        &self,
        group_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        let line = format_message(group_id, &message);
        let mut out = self.out.lock();
        writeln!(out, "{line}")
            .and_then(|_| out.flush())
            .map_err(|err| DeliveryError::Unavailable(format!("console write failed: {err}")))
    }

    async fn list_groups(&self) -> Result<Vec<String>, DeliveryError> {
        Ok(vec![self.group_id.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn prints_text_and_image_lines() {
        let buffer = SharedBuffer::default();
        let gateway = ConsoleGateway::with_writer("local", Box::new(buffer.clone()));

        gateway
            .send_message("local", OutgoingMessage::text("hello").with_reply_to("7"))
            .await
            .expect("text");
        gateway
            .send_message("local", OutgoingMessage::image(vec![1, 2, 3]))
            .await
            .expect("image");

        let written = String::from_utf8(buffer.0.lock().clone()).expect("utf8");
        assert_eq!(written, "[local] (re 7) hello\n[local] <image, 3 bytes>\n");
        assert_eq!(
            gateway.list_groups().await.expect("groups"),
            vec!["local".to_string()]
        );
    }
}
