use crate::request::Request;
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Line-oriented client connection to the hub. Requests go out stamped
/// with this client's id; responses come back one line per request.
pub struct HubClient {
    client_id: i32,
    writer: OwnedWriteHalf,
    reader: Lines<BufReader<OwnedReadHalf>>,
}

impl HubClient {
    pub async fn connect(client_id: i32, addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to hub at {addr}"))?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            client_id,
            writer: write_half,
            reader: BufReader::new(read_half).lines(),
        })
    }

    pub fn client_id(&self) -> i32 {
        self.client_id
    }

    /// Send a request, attributing it to this client if it is not
    /// already attributed.
    pub async fn send_request(&mut self, request: Request) -> anyhow::Result<()> {
        let request = if request.client_id == Request::UNATTRIBUTED {
            request.with_client_id(self.client_id)
        } else {
            request
        };
        self.writer
            .write_all(format!("{request}\n").as_bytes())
            .await?;
        Ok(())
    }

    /// Next response line, or `None` once the hub closes the connection.
    pub async fn read_response(&mut self) -> anyhow::Result<Option<String>> {
        let line = self.reader.next_line().await?;
        Ok(line)
    }
}
