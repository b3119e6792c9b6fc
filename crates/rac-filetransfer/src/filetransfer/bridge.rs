//! Request/reply plumbing between the file manager panels and the worker
//! that performs listings and copies.

use tokio::sync::mpsc;

use super::error::{FileTransferError, FileTransferResult};
use super::types::{FileReply, FileRequest, PanelType};

/// UI half: issues requests, receives replies.
#[derive(Debug)]
pub struct FileTransferBridge {
    requests: mpsc::Sender<FileRequest>,
    replies: mpsc::Receiver<FileReply>,
}

/// Worker half: receives requests, answers each with one reply.
#[derive(Debug)]
pub struct FileTransferWorker {
    requests: mpsc::Receiver<FileRequest>,
    replies: mpsc::Sender<FileReply>,
}

impl FileTransferBridge {
    /// Both halves, each direction buffered up to `capacity` messages.
    pub fn channel(capacity: usize) -> (FileTransferBridge, FileTransferWorker) {
        let (req_tx, req_rx) = mpsc::channel(capacity.max(1));
        let (rep_tx, rep_rx) = mpsc::channel(capacity.max(1));
        (
            FileTransferBridge { requests: req_tx, replies: rep_rx },
            FileTransferWorker { requests: req_rx, replies: rep_tx },
        )
    }

    pub async fn request(&self, request: FileRequest) -> FileTransferResult<()> {
        log::debug!("File request for {} panel: {:?}", request.target_panel().as_str(), request);
        self.requests.send(request).await?;
        Ok(())
    }

    pub async fn request_drive_list(&self, panel: PanelType) -> FileTransferResult<()> {
        self.request(FileRequest::DriveList { panel }).await
    }

    pub async fn request_directory_list(
        &self,
        panel: PanelType,
        path: impl Into<String>,
    ) -> FileTransferResult<()> {
        let path = path.into();
        if path.is_empty() {
            return Err(FileTransferError::Rejected("Directory path is empty".into()));
        }
        self.request(FileRequest::DirectoryList { panel, path }).await
    }

    pub async fn send_file(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> FileTransferResult<()> {
        let (from, to) = transfer_paths(from, to)?;
        self.request(FileRequest::SendFile { from, to }).await
    }

    pub async fn receive_file(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> FileTransferResult<()> {
        let (from, to) = transfer_paths(from, to)?;
        self.request(FileRequest::ReceiveFile { from, to }).await
    }

    /// Next reply, or `Disconnected` once the worker is gone and nothing is
    /// left buffered.
    pub async fn next_reply(&mut self) -> FileTransferResult<FileReply> {
        self.replies.recv().await.ok_or(FileTransferError::Disconnected)
    }
}

fn transfer_paths(
    from: impl Into<String>,
    to: impl Into<String>,
) -> FileTransferResult<(String, String)> {
    let (from, to) = (from.into(), to.into());
    if from.is_empty() || to.is_empty() {
        return Err(FileTransferError::Rejected("Transfer needs both a source and a destination".into()));
    }
    Ok((from, to))
}

impl FileTransferWorker {
    /// `None` once the UI half is dropped and the queue is drained.
    pub async fn next_request(&mut self) -> Option<FileRequest> {
        self.requests.recv().await
    }

    pub async fn reply(&self, reply: FileReply) -> FileTransferResult<()> {
        if let FileReply::Failed { panel, path, error } = &reply {
            log::warn!("File request on {} panel failed for {}: {}", panel.as_str(), path, error);
        }
        self.replies.send(reply).await?;
        Ok(())
    }
}
