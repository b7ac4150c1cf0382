use anyhow::{Context, Result};
use std::process::ExitStatus;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncBufRead, BufReader};
use tokio::process::Child;

/// A running (or replayed) client invocation with one captured output stream.
pub struct ClientProcess {
    output: Box<dyn AsyncBufRead + Send + Unpin>,
    child: Option<Child>,
}

impl ClientProcess {
    /// Wrap a spawned child process and the pipe taken from it.
    pub fn spawned<R>(child: Child, output: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            output: Box::new(BufReader::new(output)),
            child: Some(child),
        }
    }

    /// Output that does not come from a child process, such as a saved listing.
    pub fn from_reader<R>(output: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            output: Box::new(BufReader::new(output)),
            child: None,
        }
    }

    /// Read the next line, without its line terminator.
    ///
    /// Returns `None` at end of stream. Invalid UTF-8 is replaced rather than
    /// treated as an error, since archive member names are arbitrary bytes.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self
            .output
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read archive client output")?;
        if n == 0 {
            return Ok(None);
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Stop the client without waiting for the rest of its output.
    pub async fn kill(self) -> Result<()> {
        drop(self.output);
        if let Some(mut child) = self.child {
            child.kill().await.context("Failed to stop archive client")?;
        }
        Ok(())
    }

    /// Wait for the client to exit.
    ///
    /// Returns `None` when there is no underlying process.
    pub async fn wait(self) -> Result<Option<ExitStatus>> {
        // Drop the pipe first so a client blocked on a full pipe can exit.
        drop(self.output);
        match self.child {
            Some(mut child) => {
                let status = child
                    .wait()
                    .await
                    .context("Failed to wait for archive client")?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }
}
