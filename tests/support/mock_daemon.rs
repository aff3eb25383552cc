//! Mock p0f daemon for exercising lookups end to end
//!
//! Listens on a socket in a fresh temporary directory and answers every
//! connection the same way. The daemon runs on its own thread with its own
//! runtime, so it works both for blocking lookups and from async tests.
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use empath_p0f::protocol::{QUERY_SIZE, Query, Response};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    sync::oneshot,
};

/// How the daemon treats each connection
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Read the query and answer with this response
    Reply(Response),
    /// Read the query and answer with these bytes, then hang up
    Raw(Vec<u8>),
    /// Read the query and never answer
    Silent,
    /// Read the query and hang up without answering
    Hangup,
}

pub struct MockDaemon {
    _dir: TempDir,
    path: PathBuf,
    queries: Arc<Mutex<Vec<Query>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MockDaemon {
    pub fn start(behaviour: Behaviour) -> Self {
        let dir = tempfile::tempdir().expect("temporary directory");
        let path = dir.path().join("p0f.sock");

        let queries = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let thread = {
            let path = path.clone();
            let queries = Arc::clone(&queries);
            let connections = Arc::clone(&connections);

            thread::spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("mock daemon runtime");

                runtime.block_on(accept_loop(
                    path,
                    behaviour,
                    queries,
                    connections,
                    ready_tx,
                    shutdown_rx,
                ));
            })
        };

        ready_rx.recv().expect("mock daemon failed to start");

        Self {
            _dir: dir,
            path,
            queries,
            connections,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_str(&self) -> &str {
        self.path.to_str().expect("temporary paths are UTF-8")
    }

    /// Queries received so far
    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().expect("query log").clone()
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn accept_loop(
    path: PathBuf,
    behaviour: Behaviour,
    queries: Arc<Mutex<Vec<Query>>>,
    connections: Arc<AtomicUsize>,
    ready: mpsc::Sender<()>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let listener = UnixListener::bind(&path).expect("bind mock daemon socket");
    let _ = ready.send(());

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                let Ok((stream, _)) = accepted else { break };
                connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, behaviour.clone(), Arc::clone(&queries)));
            }
        }
    }
}

async fn serve(mut stream: UnixStream, behaviour: Behaviour, queries: Arc<Mutex<Vec<Query>>>) {
    let mut buffer = [0; QUERY_SIZE];
    if stream.read_exact(&mut buffer).await.is_err() {
        return;
    }

    if let Ok(query) = Query::decode(&buffer) {
        queries.lock().expect("query log").push(query);
    }

    match behaviour {
        Behaviour::Reply(response) => {
            let bytes = response.encode().expect("encode response");
            let _ = stream.write_all(&bytes).await;
        }
        Behaviour::Raw(bytes) => {
            let _ = stream.write_all(&bytes).await;
        }
        Behaviour::Silent => tokio::time::sleep(Duration::from_secs(60)).await,
        Behaviour::Hangup => {}
    }
}
