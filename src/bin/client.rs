use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use chatrelay::chat::{write_chunked, FrameDecoder};

/// Chunk size for lines typed by a human.
const CHUNK_SIZE: usize = 1000;

/// Interactive chatrelay client.
#[derive(Parser, Debug)]
#[command(name = "chatrelay-client", version, about)]
struct Cli {
    /// Relay host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Relay port.
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Display name (prompted for when omitted).
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let name = match cli.name {
        Some(name) => name,
        None => {
            print!("Enter your username: ");
            let _ = std::io::Write::flush(&mut std::io::stdout());
            match stdin.next_line().await {
                Ok(Some(line)) if !line.trim().is_empty() => line.trim().to_string(),
                _ => {
                    eprintln!("A username is required");
                    std::process::exit(1);
                }
            }
        }
    };

    let stream = match TcpStream::connect((cli.host.as_str(), cli.port)).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Failed to connect to {}:{}: {e}", cli.host, cli.port);
            std::process::exit(1);
        }
    };
    let (mut reader, mut writer) = stream.into_split();
    if let Err(e) = writer.write_all(name.as_bytes()).await {
        eprintln!("Failed to send username: {e}");
        std::process::exit(1);
    }

    let mut receiver = tokio::spawn(async move {
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; 1024];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    println!("Disconnected from server");
                    return;
                }
                Ok(n) => {
                    for event in decoder.feed(&buf[..n]) {
                        println!("{}: {}", event.sender, event.body);
                    }
                }
                Err(e) => {
                    eprintln!("An error occurred: {e}");
                    return;
                }
            }
        }
    });

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    _ => break,
                };
                if line.trim().eq_ignore_ascii_case("quit") {
                    break;
                }
                if let Err(e) = write_chunked(&mut writer, &line, CHUNK_SIZE, Duration::ZERO).await {
                    eprintln!("Failed to send message: {e}");
                    break;
                }
            }
            _ = &mut receiver => break,
        }
    }

    let _ = writer.shutdown().await;
}
