//! Interactive chat loop.

use std::io::{self, Write};

use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::error::ChatError;
use crate::session::{ChatSession, Reply};
use crate::types::ChatStream;

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    Clear,
    Retry,
    History,
    Quit,
    Help,
    Empty,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        match line {
            "/clear" => Self::Clear,
            "/retry" => Self::Retry,
            "/history" => Self::History,
            "/quit" | "/exit" => Self::Quit,
            "/help" => Self::Help,
            other if other.starts_with('/') => Self::Unknown(other.to_string()),
            other => Self::Send(other.to_string()),
        }
    }
}

const HELP: &str = "/clear   forget the conversation\n\
/retry   regenerate the last failed reply\n\
/history show what is sent with the next message\n\
/quit    leave";

/// Send one message and print the reply.
pub async fn send_once(session: &ChatSession, text: String, buffered: bool) -> Result<(), ChatError> {
    if buffered {
        let reply = session.send_buffered(text).await?;
        println!("{reply}");
        Ok(())
    } else {
        let stream = session.send_streaming(text).await?;
        print_stream(stream).await
    }
}

/// Read commands from stdin until EOF or `/quit`.
///
/// Chat failures are printed and the loop carries on; only a failure to read
/// input ends it with an error.
pub async fn run(session: &ChatSession, buffered: bool) -> io::Result<()> {
    run_lines(session, BufReader::new(tokio::io::stdin()), buffered).await
}

async fn run_lines<R>(session: &ChatSession, input: R, buffered: bool) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    eprintln!("Chatting with {} — /help for commands", session.model_id());

    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let outcome = match ReplCommand::parse(&line) {
            ReplCommand::Send(text) => send_once(session, text, buffered).await,
            ReplCommand::Retry => match session.last_failed() {
                Some(id) => match session.retry(id).await {
                    Ok(Reply::Stream(stream)) => print_stream(stream).await,
                    Ok(Reply::Text(text)) => {
                        println!("{text}");
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                None => {
                    eprintln!("Nothing to retry.");
                    Ok(())
                }
            },
            ReplCommand::Clear => {
                session.clear_history();
                session.clear_transcript();
                eprintln!("History cleared.");
                Ok(())
            }
            ReplCommand::History => {
                for message in session.history() {
                    eprintln!("{:>9}  {} chars", message.role.to_string(), message.budget_len());
                }
                Ok(())
            }
            ReplCommand::Help => {
                eprintln!("{HELP}");
                Ok(())
            }
            ReplCommand::Unknown(cmd) => {
                eprintln!("Unknown command {cmd}; /help for commands");
                Ok(())
            }
            ReplCommand::Quit => break,
            ReplCommand::Empty => Ok(()),
        };

        if let Err(e) = outcome {
            eprintln!("❌ {e}");
            if e.is_retryable() {
                eprintln!("   /retry to regenerate");
            }
        }
    }

    Ok(())
}

async fn print_stream(mut stream: ChatStream) -> Result<(), ChatError> {
    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                print!("{chunk}");
                let _ = stdout.flush();
            }
            Err(e) => {
                println!();
                return Err(e);
            }
        }
    }
    println!();
    Ok(())
}
