//! Interactive question loop

use async_trait::async_trait;
use docchat_core::Result;
use docchat_rag::DocChat;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const BANNER: &str = "docchat - ask questions about the document. Type 'exit' to quit.\n\n";
const GOODBYE: &str = "Goodbye!\n";
const EXIT_WORDS: [&str; 3] = ["exit", "quit", "sair"];

/// Something that answers a single question
#[async_trait]
pub trait Ask: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String>;
}

#[async_trait]
impl Ask for DocChat {
    async fn ask(&self, question: &str) -> Result<String> {
        DocChat::ask(self, question).await
    }
}

fn is_exit(input: &str) -> bool {
    EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

/// Read questions line by line until an exit word or end of input.
///
/// Answer failures are printed and the loop continues.
pub async fn run<R, W, A>(input: R, mut output: W, assistant: &A) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    A: Ask + ?Sized,
{
    let mut lines = input.lines();
    output.write_all(BANNER.as_bytes()).await?;

    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            output.write_all(GOODBYE.as_bytes()).await?;
            break;
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit(question) {
            output.write_all(GOODBYE.as_bytes()).await?;
            break;
        }

        match assistant.ask(question).await {
            Ok(answer) => {
                output
                    .write_all(format!("\nAssistant: {answer}\n\n").as_bytes())
                    .await?;
            }
            Err(e) => {
                tracing::error!("Failed to answer question: {e}");
                output
                    .write_all(format!("\n[error] Could not answer the question: {e}\n\n").as_bytes())
                    .await?;
            }
        }
    }

    output.flush().await
}
