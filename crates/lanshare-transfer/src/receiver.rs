//! Inbound side of a transfer: a long-lived listener that hands each
//! accepted connection to its own task.
//!
//! At most `max_concurrent` handlers run at once. A connection that arrives
//! while every permit is taken is closed before the acknowledgement, so the
//! sender sees a handshake failure and nothing is written to disk.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::fs::File;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use lanshare_shared::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_MAX_TRANSFERS,
    DEFAULT_RECEIVER_PORT, FOLDER_CHECKSUM,
};
use lanshare_shared::Handshake;

use crate::archive::unpack_archive;
use crate::checksum::{file_checksum_async, tree_size};
use crate::error::TransferError;
use crate::protocol::{copy_exact, read_handshake, write_ack};

/// Prefix of in-progress files in the storage directory.
pub const PARTIAL_PREFIX: &str = ".lanshare-";

// ---------------------------------------------------------------------------
// Configuration / notification types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub bind_addr: SocketAddr,
    /// Received items land directly below this directory.
    pub storage_dir: PathBuf,
    /// Upper bound on simultaneously running connection handlers.
    pub max_concurrent: usize,
    pub chunk_size: usize,
    /// How long a new connection may stay silent before its handshake
    /// arrives. The payload stream itself has no deadline.
    pub handshake_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_RECEIVER_PORT)),
            storage_dir: PathBuf::from("received"),
            max_concurrent: DEFAULT_MAX_TRANSFERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        }
    }
}

/// Sent upward once an item is fully stored (and unpacked, for directories).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedItem {
    pub display_name: String,
    pub sender_addr: SocketAddr,
    pub is_directory: bool,
    pub path: PathBuf,
    /// File length, or total bytes of the unpacked tree.
    pub size: u64,
    /// Hex BLAKE3 recomputed from disk, or the folder sentinel. Not compared
    /// against anything here.
    pub checksum: String,
}

// ---------------------------------------------------------------------------
// Partial output guard
// ---------------------------------------------------------------------------

/// Staging file in the storage directory. Deleted on drop unless committed.
struct PartialFile {
    path: PathBuf,
    file: File,
    committed: bool,
}

impl PartialFile {
    async fn create(storage_dir: &Path) -> std::io::Result<Self> {
        let path = storage_dir.join(format!(
            "{PARTIAL_PREFIX}{}.part",
            uuid::Uuid::new_v4().simple()
        ));
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            file,
            committed: false,
        })
    }

    /// Move the finished file to `dest`, replacing anything already there.
    async fn commit(mut self, dest: &Path) -> std::io::Result<()> {
        self.file.sync_all().await?;
        tokio::fs::rename(&self.path, dest).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove partial file"),
        }
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

struct HandlerContext {
    storage_dir: PathBuf,
    chunk_size: usize,
    handshake_timeout: Duration,
    notify: mpsc::Sender<ReceivedItem>,
}

pub struct TransferReceiver {
    listener: TcpListener,
    permits: Arc<Semaphore>,
    ctx: Arc<HandlerContext>,
}

/// Running receiver task plus the means to stop it.
pub struct ReceiverHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReceiverHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait for the accept loop to exit. Handlers already
    /// running finish on their own.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Receiver task panicked");
        }
    }
}

impl TransferReceiver {
    /// Bind the listener and make sure the storage directory exists.
    pub async fn bind(
        config: ReceiverConfig,
        notify: mpsc::Sender<ReceivedItem>,
    ) -> Result<Self, TransferError> {
        tokio::fs::create_dir_all(&config.storage_dir).await?;
        let listener = TcpListener::bind(config.bind_addr).await?;

        info!(
            addr = %listener.local_addr()?,
            storage = %config.storage_dir.display(),
            max_concurrent = config.max_concurrent,
            "Receiver listening"
        );

        Ok(Self {
            listener,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            ctx: Arc::new(HandlerContext {
                storage_dir: config.storage_dir,
                chunk_size: config.chunk_size,
                handshake_timeout: config.handshake_timeout,
                notify,
            }),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept until `shutdown` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Receiver shutting down");
                        break;
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => self.dispatch(socket, peer),
                    Err(e) => {
                        // Usually descriptor exhaustion; back off instead of spinning.
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }
    }

    /// Run the accept loop on a background task.
    pub fn spawn(self) -> std::io::Result<ReceiverHandle> {
        let local_addr = self.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        Ok(ReceiverHandle {
            local_addr,
            shutdown,
            task,
        })
    }

    fn dispatch(&self, socket: TcpStream, peer: SocketAddr) {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(peer = %peer, "Receiver busy, rejecting connection");
                drop(socket);
                return;
            }
        };

        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let _permit = permit;
            match receive_one(socket, peer, &ctx).await {
                Ok(item) => {
                    info!(
                        item = %item.display_name,
                        peer = %peer,
                        size = item.size,
                        directory = item.is_directory,
                        "Item received"
                    );
                    if ctx.notify.send(item).await.is_err() {
                        debug!("No listener for received items");
                    }
                }
                Err(e) => warn!(peer = %peer, step = %e.step(), error = %e, "Transfer failed"),
            }
        });
    }
}

/// Full lifecycle of one connection. The socket is dropped, and therefore
/// closed, on every return path.
async fn receive_one(
    mut socket: TcpStream,
    peer: SocketAddr,
    ctx: &HandlerContext,
) -> Result<ReceivedItem, TransferError> {
    let handshake = tokio::time::timeout(ctx.handshake_timeout, read_handshake(&mut socket))
        .await
        .map_err(|_| TransferError::Handshake("timed out waiting for handshake".into()))??;
    debug!(
        peer = %peer,
        item = %handshake.item_name,
        len = handshake.payload_len,
        kind = ?handshake.kind,
        "Handshake received"
    );

    let mut partial = PartialFile::create(&ctx.storage_dir).await?;
    write_ack(&mut socket).await?;
    copy_exact(
        &mut socket,
        &mut partial.file,
        handshake.payload_len,
        ctx.chunk_size,
    )
    .await?;

    if handshake.kind.is_directory() {
        store_directory(partial, &handshake, peer, ctx).await
    } else {
        let dest = ctx.storage_dir.join(&handshake.item_name);
        partial.commit(&dest).await?;
        let checksum = file_checksum_async(&dest).await?;
        Ok(ReceivedItem {
            display_name: handshake.item_name,
            sender_addr: peer,
            is_directory: false,
            path: dest,
            size: handshake.payload_len,
            checksum,
        })
    }
}

/// Staging directory in the storage directory. Removed on drop unless
/// committed.
struct PartialDir {
    path: PathBuf,
    committed: bool,
}

impl PartialDir {
    fn new(storage_dir: &Path) -> Self {
        Self {
            path: storage_dir.join(format!(
                "{PARTIAL_PREFIX}{}.d",
                uuid::Uuid::new_v4().simple()
            )),
            committed: false,
        }
    }

    /// Replace whatever sits at `dest` with the staged tree.
    async fn commit(mut self, dest: &Path) -> std::io::Result<()> {
        match tokio::fs::symlink_metadata(dest).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(dest).await?,
            Ok(_) => tokio::fs::remove_file(dest).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::rename(&self.path, dest).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialDir {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial extraction"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove partial extraction"),
        }
    }
}

/// Unpack a fully received archive into a staging directory, then move it
/// over the destination. The archive is always removed and an existing
/// destination is only touched once extraction succeeded.
async fn store_directory(
    archive: PartialFile,
    handshake: &Handshake,
    peer: SocketAddr,
    ctx: &HandlerContext,
) -> Result<ReceivedItem, TransferError> {
    let display_name = handshake.display_name().to_string();
    let dest = ctx.storage_dir.join(&display_name);
    let staged = PartialDir::new(&ctx.storage_dir);

    let archive_path = archive.path.clone();
    let unpack_dest = staged.path.clone();
    let summary = tokio::task::spawn_blocking(move || unpack_archive(&archive_path, &unpack_dest))
        .await
        .map_err(std::io::Error::other)??;
    drop(archive);
    debug!(dir = %display_name, files = summary.files, bytes = summary.bytes, "Archive unpacked");

    staged.commit(&dest).await?;

    let tree = dest.clone();
    let (size, _files) = tokio::task::spawn_blocking(move || tree_size(&tree))
        .await
        .map_err(std::io::Error::other)??;

    Ok(ReceivedItem {
        display_name,
        sender_addr: peer,
        is_directory: true,
        path: dest,
        size,
        checksum: FOLDER_CHECKSUM.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use rand::RngCore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::error::TransferStep;
    use crate::protocol::{read_ack, write_handshake};
    use crate::sender::{SenderConfig, TransferSender};

    async fn start(
        storage: &Path,
        max_concurrent: usize,
    ) -> (ReceiverHandle, mpsc::Receiver<ReceivedItem>) {
        start_with_timeout(storage, max_concurrent, Duration::from_secs(5)).await
    }

    async fn start_with_timeout(
        storage: &Path,
        max_concurrent: usize,
        handshake_timeout: Duration,
    ) -> (ReceiverHandle, mpsc::Receiver<ReceivedItem>) {
        let (tx, rx) = mpsc::channel(8);
        let config = ReceiverConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            storage_dir: storage.to_path_buf(),
            max_concurrent,
            chunk_size: 4096,
            handshake_timeout,
        };
        let receiver = TransferReceiver::bind(config, tx).await.unwrap();
        (receiver.spawn().unwrap(), rx)
    }

    fn sender(staging: &Path) -> TransferSender {
        TransferSender::new(SenderConfig {
            staging_dir: staging.to_path_buf(),
            ..Default::default()
        })
    }

    fn entry_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn wait_until_empty(dir: &Path) {
        for _ in 0..100 {
            if entry_names(dir).is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("storage not empty: {:?}", entry_names(dir));
    }

    #[tokio::test]
    async fn test_file_arrives_with_matching_checksum() {
        let outbox = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let (handle, mut rx) = start(storage.path(), 4).await;

        let mut data = vec![0u8; 10_000];
        rand::thread_rng().fill_bytes(&mut data);
        let src = outbox.path().join("report.pdf");
        std::fs::write(&src, &data).unwrap();

        let report = sender(outbox.path())
            .send(&src, handle.local_addr())
            .await
            .unwrap();
        let item = rx.recv().await.unwrap();

        assert_eq!(report.bytes_sent, 10_000);
        assert_eq!(item.display_name, "report.pdf");
        assert!(!item.is_directory);
        assert_eq!(item.size, 10_000);
        assert_eq!(item.path, storage.path().join("report.pdf"));
        assert_eq!(std::fs::read(&item.path).unwrap(), data);
        assert_eq!(item.checksum, report.checksum);
        assert_eq!(entry_names(storage.path()), vec!["report.pdf"]);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_directory_is_unpacked_without_leftover_archive() {
        let outbox = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let (handle, mut rx) = start(storage.path(), 4).await;

        let src = outbox.path().join("photos");
        std::fs::create_dir_all(src.join("raw")).unwrap();
        std::fs::write(src.join("a.jpg"), vec![1u8; 20_000]).unwrap();
        std::fs::write(src.join("b.jpg"), vec![2u8; 20_000]).unwrap();
        std::fs::write(src.join("raw/c.nef"), vec![3u8; 10_000]).unwrap();

        let report = sender(staging.path())
            .send(&src, handle.local_addr())
            .await
            .unwrap();
        let item = rx.recv().await.unwrap();

        assert_eq!(report.item_name, "photos.tar");
        assert_eq!(report.checksum, FOLDER_CHECKSUM);
        assert_eq!(item.display_name, "photos");
        assert!(item.is_directory);
        assert_eq!(item.size, 50_000);

        let dest = storage.path().join("photos");
        assert_eq!(tree_size(&dest).unwrap(), (50_000, 3));
        assert_eq!(std::fs::read(dest.join("raw/c.nef")).unwrap(), vec![3u8; 10_000]);
        assert_eq!(entry_names(storage.path()), vec!["photos"]);
        assert_eq!(entry_names(staging.path()), Vec::<String>::new());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_truncated_stream_leaves_nothing_behind() {
        let storage = tempfile::tempdir().unwrap();
        let (handle, mut rx) = start(storage.path(), 4).await;

        let mut socket = TcpStream::connect(handle.local_addr()).await.unwrap();
        write_handshake(&mut socket, &Handshake::file("big.iso", 1_000))
            .await
            .unwrap();
        read_ack(&mut socket).await.unwrap();
        socket.write_all(&[0u8; 100]).await.unwrap();
        drop(socket);

        wait_until_empty(storage.path()).await;
        assert!(rx.try_recv().is_err());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_cleaned_up() {
        let storage = tempfile::tempdir().unwrap();
        let (handle, mut rx) = start(storage.path(), 4).await;

        // A full-length payload that is not a valid tar stream.
        let garbage = vec![0xabu8; 2048];
        let mut socket = TcpStream::connect(handle.local_addr()).await.unwrap();
        write_handshake(&mut socket, &Handshake::directory("photos", garbage.len() as u64))
            .await
            .unwrap();
        read_ack(&mut socket).await.unwrap();
        socket.write_all(&garbage).await.unwrap();
        socket.shutdown().await.unwrap();

        wait_until_empty(storage.path()).await;
        assert!(rx.try_recv().is_err());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_busy_receiver_rejects_before_ack() {
        let outbox = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let (handle, _rx) = start(storage.path(), 1).await;

        // Holds the only permit by never sending a handshake.
        let _stalled = TcpStream::connect(handle.local_addr()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let src = outbox.path().join("note.txt");
        std::fs::write(&src, b"hello").unwrap();
        let err = sender(outbox.path())
            .send(&src, handle.local_addr())
            .await
            .unwrap_err();

        assert_eq!(err.step(), TransferStep::Handshake);
        assert!(!storage.path().join("note.txt").exists());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_silent_connections_release_their_slots() {
        let outbox = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let (handle, mut rx) =
            start_with_timeout(storage.path(), 2, Duration::from_millis(200)).await;

        let _idle_a = TcpStream::connect(handle.local_addr()).await.unwrap();
        let _idle_b = TcpStream::connect(handle.local_addr()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        let src = outbox.path().join("note.txt");
        std::fs::write(&src, b"hello").unwrap();
        sender(outbox.path())
            .send(&src, handle.local_addr())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().display_name, "note.txt");
        assert_eq!(std::fs::read(storage.path().join("note.txt")).unwrap(), b"hello");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_directory_replaces_existing_one() {
        let outbox = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let (handle, mut rx) = start(storage.path(), 4).await;

        let old = storage.path().join("photos");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::write(old.join("stale.jpg"), b"old").unwrap();

        let src = outbox.path().join("photos");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.jpg"), vec![1u8; 100]).unwrap();

        sender(staging.path())
            .send(&src, handle.local_addr())
            .await
            .unwrap();
        let item = rx.recv().await.unwrap();

        assert_eq!(item.size, 100);
        assert_eq!(entry_names(&old), vec!["a.jpg"]);
        assert_eq!(entry_names(storage.path()), vec!["photos"]);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_corrupt_archive_keeps_existing_directory_untouched() {
        let storage = tempfile::tempdir().unwrap();
        let (handle, mut rx) = start(storage.path(), 4).await;

        let old = storage.path().join("photos");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::write(old.join("keep.jpg"), b"old").unwrap();

        let garbage = vec![0xabu8; 2048];
        let mut socket = TcpStream::connect(handle.local_addr()).await.unwrap();
        write_handshake(&mut socket, &Handshake::directory("photos", garbage.len() as u64))
            .await
            .unwrap();
        read_ack(&mut socket).await.unwrap();
        socket.write_all(&garbage).await.unwrap();
        socket.shutdown().await.unwrap();

        // The handler closes the connection only after its cleanup ran.
        let mut rest = Vec::new();
        let _ = socket.read_to_end(&mut rest).await;

        assert_eq!(entry_names(storage.path()), vec!["photos"]);
        assert_eq!(entry_names(&old), vec!["keep.jpg"]);
        assert!(rx.try_recv().is_err());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_listener_survives_bad_handshake() {
        let outbox = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let (handle, mut rx) = start(storage.path(), 4).await;

        let mut bad = TcpStream::connect(handle.local_addr()).await.unwrap();
        bad.write_all(&[0, 0, 0, 3, 0xff, 0xff, 0xff]).await.unwrap();
        drop(bad);

        let src = outbox.path().join("after.txt");
        std::fs::write(&src, b"still here").unwrap();
        sender(outbox.path())
            .send(&src, handle.local_addr())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().display_name, "after.txt");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let storage = tempfile::tempdir().unwrap();
        let (handle, _rx) = start(storage.path(), 4).await;
        let addr = handle.local_addr();

        handle.shutdown().await;
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
