//! Prints raw deltas as they arrive, without the live display.

use ask_harness::{AskClient, AskConfig, AskError, Question, SYSTEM_PROMPT, SseEvent, extract_delta};
use futures::StreamExt as _;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AskError> {
    let client = AskClient::new(AskConfig::from_env()?)?;
    let question = Question::new("Name three prime numbers.")?;

    let mut events = client.open_stream(SYSTEM_PROMPT, &question).await?;
    while let Some(event) = events.next().await {
        match event? {
            SseEvent::Data(payload) => match extract_delta(&payload) {
                Ok(delta) => print!("{}", delta.text()),
                Err(err) => eprintln!("skipped chunk: {err}"),
            },
            SseEvent::Done => break,
        }
    }
    println!();
    Ok(())
}
