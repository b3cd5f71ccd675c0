//! In-memory SFTP server for tests.
//!
//! [`MemoryServer`] is a [`Connector`] that serves a small in-memory tree with
//! `russh_sftp::server::run` over a duplex pipe, so the real SFTP client is
//! exercised end to end without a network.

use russh_sftp::{
    client::SftpSession,
    protocol::{
        Attrs, Data, File, FileAttributes, Handle, Name, OpenFlags, Status, StatusCode, Version,
    },
    server::Handler,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use crate::{
    config::SessionConfig,
    error::{Error, Result},
    path::{base_name, join_path},
    session::{Connection, Connector, Credentials, RemoteSession, Transport},
};

/// Modification time of every node
pub const MTIME: u64 = 1_700_000_000;

const DIR_MODE: u32 = 0o040_755;
const FILE_MODE: u32 = 0o100_644;

enum Node {
    Dir,
    File(Vec<u8>),
}

struct Tree {
    nodes: BTreeMap<String, Node>,
    denied: HashSet<String>,
}

impl Tree {
    fn check_access(&self, path: &str) -> std::result::Result<(), StatusCode> {
        if self.denied.contains(path) {
            Err(StatusCode::PermissionDenied)
        } else {
            Ok(())
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        matches!(self.nodes.get(path), Some(Node::Dir))
    }

    fn children(&self, dir: &str) -> impl Iterator<Item = (&String, &Node)> {
        let dir = dir.to_owned();
        self.nodes
            .iter()
            .filter(move |(path, _)| path.as_str() != "/" && parent(path) == dir)
    }

    fn attrs(node: &Node) -> FileAttributes {
        let (size, permissions) = match node {
            Node::Dir => (0, DIR_MODE),
            Node::File(data) => (data.len() as u64, FILE_MODE),
        };

        FileAttributes {
            size: Some(size),
            permissions: Some(permissions),
            mtime: Some(MTIME as u32),
            atime: Some(MTIME as u32),
            ..Default::default()
        }
    }
}

fn normalize(path: &str) -> String {
    let joined = join_path(["/", path]);
    match joined.trim_end_matches('/') {
        "" => "/".to_owned(),
        trimmed => trimmed.to_owned(),
    }
}

fn parent(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_owned(),
        Some((dir, _)) => dir.to_owned(),
    }
}

/// Serves an in-memory tree and counts the transports it hands out
#[derive(Clone)]
pub struct MemoryServer {
    tree: Arc<Mutex<Tree>>,
    password: String,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MemoryServer {
    /// Empty tree (only `/`) accepting `password`
    pub fn new(password: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_owned(), Node::Dir);

        Self {
            tree: Arc::new(Mutex::new(Tree {
                nodes,
                denied: HashSet::new(),
            })),
            password: password.to_owned(),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap()
    }

    pub fn add_dir(&self, path: &str) {
        self.tree().nodes.insert(normalize(path), Node::Dir);
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.tree()
            .nodes
            .insert(normalize(path), Node::File(data.to_vec()));
    }

    /// Every request touching `path` fails with permission denied
    pub fn deny(&self, path: &str) {
        self.tree().denied.insert(normalize(path));
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.tree().nodes.get(&normalize(path)) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.tree().nodes.contains_key(&normalize(path))
    }

    pub fn opened_transports(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed_transports(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new("memory", 22, "tester", self.password.as_str())
    }

    /// A session connected with the accepted password
    pub async fn session(&self) -> RemoteSession {
        RemoteSession::connect(self, self.credentials(), &SessionConfig::default())
            .await
            .unwrap()
    }
}

struct MemoryTransport {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Connector for MemoryServer {
    async fn open(&self, credentials: &Credentials, config: &SessionConfig) -> Result<Connection> {
        if credentials.password() != self.password {
            return Err(Error::auth_failed("server rejected password"));
        }

        let (client, server) = tokio::io::duplex(64 * 1024);
        russh_sftp::server::run(server, MemoryHandler::new(Arc::clone(&self.tree))).await;

        let channel = SftpSession::new(client).await.map_err(Error::handshake)?;
        channel.set_timeout(config.request_timeout_secs);
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Connection {
            transport: Box::new(MemoryTransport {
                closed: Arc::clone(&self.closed),
            }),
            channel,
        })
    }
}

enum OpenHandle {
    File(String),
    Dir(Option<Vec<File>>),
}

struct MemoryHandler {
    tree: Arc<Mutex<Tree>>,
    handles: HashMap<String, OpenHandle>,
    next_handle: u32,
}

type Reply<T> = std::result::Result<T, StatusCode>;

fn ok(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".to_owned(),
        language_tag: "en-US".to_owned(),
    }
}

impl MemoryHandler {
    fn new(tree: Arc<Mutex<Tree>>) -> Self {
        Self {
            tree,
            handles: HashMap::new(),
            next_handle: 0,
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap()
    }

    fn allocate(&mut self, handle: OpenHandle) -> String {
        self.next_handle += 1;
        let name = self.next_handle.to_string();
        self.handles.insert(name.clone(), handle);
        name
    }

    fn file_path(&self, handle: &str) -> Reply<String> {
        match self.handles.get(handle) {
            Some(OpenHandle::File(path)) => Ok(path.clone()),
            _ => Err(StatusCode::Failure),
        }
    }

    fn do_open(&mut self, filename: &str, pflags: OpenFlags) -> Reply<String> {
        let path = normalize(filename);
        {
            let mut tree = self.tree();
            tree.check_access(&path)?;

            let writing = pflags.intersects(OpenFlags::WRITE | OpenFlags::CREATE);
            match tree.nodes.get_mut(&path) {
                Some(Node::Dir) => return Err(StatusCode::Failure),
                Some(Node::File(data)) => {
                    if writing && pflags.contains(OpenFlags::TRUNCATE) {
                        data.clear();
                    }
                }
                None if writing && pflags.contains(OpenFlags::CREATE) => {
                    if !tree.is_dir(&parent(&path)) {
                        return Err(StatusCode::NoSuchFile);
                    }
                    tree.nodes.insert(path.clone(), Node::File(Vec::new()));
                }
                None => return Err(StatusCode::NoSuchFile),
            }
        }

        Ok(self.allocate(OpenHandle::File(path)))
    }

    fn do_read(&self, handle: &str, offset: u64, len: u32) -> Reply<Vec<u8>> {
        let path = self.file_path(handle)?;
        let tree = self.tree();
        let Some(Node::File(data)) = tree.nodes.get(&path) else {
            return Err(StatusCode::NoSuchFile);
        };

        let start = usize::try_from(offset).map_err(|_| StatusCode::Failure)?;
        if start >= data.len() {
            return Err(StatusCode::Eof);
        }
        let end = data.len().min(start + len as usize);
        Ok(data[start..end].to_vec())
    }

    fn do_write(&self, handle: &str, offset: u64, chunk: &[u8]) -> Reply<()> {
        let path = self.file_path(handle)?;
        let mut tree = self.tree();
        let Some(Node::File(data)) = tree.nodes.get_mut(&path) else {
            return Err(StatusCode::NoSuchFile);
        };

        let start = usize::try_from(offset).map_err(|_| StatusCode::Failure)?;
        let end = start + chunk.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(chunk);
        Ok(())
    }

    fn do_stat(&self, path: &str) -> Reply<FileAttributes> {
        self.tree()
            .nodes
            .get(&normalize(path))
            .map(Tree::attrs)
            .ok_or(StatusCode::NoSuchFile)
    }

    fn do_opendir(&mut self, path: &str) -> Reply<String> {
        let path = normalize(path);
        let entries = {
            let tree = self.tree();
            tree.check_access(&path)?;
            match tree.nodes.get(&path) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(StatusCode::Failure),
                None => return Err(StatusCode::NoSuchFile),
            }

            let mut entries: Vec<File> = tree
                .children(&path)
                .map(|(child, node)| File {
                    filename: base_name(child).to_owned(),
                    longname: base_name(child).to_owned(),
                    attrs: Tree::attrs(node),
                })
                .collect();
            // reverse order so clients cannot rely on the server sorting
            entries.reverse();
            entries
        };

        Ok(self.allocate(OpenHandle::Dir(Some(entries))))
    }

    fn do_readdir(&mut self, handle: &str) -> Reply<Vec<File>> {
        match self.handles.get_mut(handle) {
            Some(OpenHandle::Dir(entries)) => match entries.take() {
                Some(files) if !files.is_empty() => Ok(files),
                _ => Err(StatusCode::Eof),
            },
            _ => Err(StatusCode::Failure),
        }
    }

    fn do_mkdir(&self, path: &str) -> Reply<()> {
        let path = normalize(path);
        let mut tree = self.tree();
        tree.check_access(&path)?;

        if tree.nodes.contains_key(&path) {
            return Err(StatusCode::Failure);
        }
        if !tree.is_dir(&parent(&path)) {
            return Err(StatusCode::NoSuchFile);
        }
        tree.nodes.insert(path, Node::Dir);
        Ok(())
    }

    fn do_rmdir(&self, path: &str) -> Reply<()> {
        let path = normalize(path);
        let mut tree = self.tree();
        tree.check_access(&path)?;

        match tree.nodes.get(&path) {
            None => return Err(StatusCode::NoSuchFile),
            Some(Node::File(_)) => return Err(StatusCode::Failure),
            Some(Node::Dir) => {}
        }
        if path == "/" || tree.children(&path).next().is_some() {
            return Err(StatusCode::Failure);
        }
        tree.nodes.remove(&path);
        Ok(())
    }

    fn do_remove(&self, path: &str) -> Reply<()> {
        let path = normalize(path);
        let mut tree = self.tree();
        tree.check_access(&path)?;

        match tree.nodes.get(&path) {
            None => Err(StatusCode::NoSuchFile),
            Some(Node::Dir) => Err(StatusCode::Failure),
            Some(Node::File(_)) => {
                tree.nodes.remove(&path);
                Ok(())
            }
        }
    }

    fn do_rename(&self, old: &str, new: &str) -> Reply<()> {
        let (old, new) = (normalize(old), normalize(new));
        let mut tree = self.tree();
        tree.check_access(&old)?;
        tree.check_access(&new)?;

        if !tree.nodes.contains_key(&old) {
            return Err(StatusCode::NoSuchFile);
        }
        if tree.nodes.contains_key(&new) {
            return Err(StatusCode::Failure);
        }
        if !tree.is_dir(&parent(&new)) {
            return Err(StatusCode::NoSuchFile);
        }

        let prefix = format!("{old}/");
        let moved: Vec<String> = tree
            .nodes
            .keys()
            .filter(|key| **key == old || key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = tree.nodes.remove(&key) {
                let renamed = format!("{new}{}", &key[old.len()..]);
                tree.nodes.insert(renamed, node);
            }
        }
        Ok(())
    }
}

impl Handler for MemoryHandler {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    fn init(
        &mut self,
        _version: u32,
        _extensions: HashMap<String, String>,
    ) -> impl Future<Output = Reply<Version>> + Send {
        async { Ok(Version::new()) }
    }

    fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> impl Future<Output = Reply<Handle>> + Send {
        let result = self.do_open(&filename, pflags).map(|handle| Handle { id, handle });
        async move { result }
    }

    fn close(&mut self, id: u32, handle: String) -> impl Future<Output = Reply<Status>> + Send {
        let result = self
            .handles
            .remove(&handle)
            .map(|_| ok(id))
            .ok_or(StatusCode::Failure);
        async move { result }
    }

    fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> impl Future<Output = Reply<Data>> + Send {
        let result = self.do_read(&handle, offset, len).map(|data| Data { id, data });
        async move { result }
    }

    fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> impl Future<Output = Reply<Status>> + Send {
        let result = self.do_write(&handle, offset, &data).map(|()| ok(id));
        async move { result }
    }

    fn stat(&mut self, id: u32, path: String) -> impl Future<Output = Reply<Attrs>> + Send {
        let result = self.do_stat(&path).map(|attrs| Attrs { id, attrs });
        async move { result }
    }

    fn lstat(&mut self, id: u32, path: String) -> impl Future<Output = Reply<Attrs>> + Send {
        let result = self.do_stat(&path).map(|attrs| Attrs { id, attrs });
        async move { result }
    }

    fn fstat(&mut self, id: u32, handle: String) -> impl Future<Output = Reply<Attrs>> + Send {
        let result = self
            .file_path(&handle)
            .and_then(|path| self.do_stat(&path))
            .map(|attrs| Attrs { id, attrs });
        async move { result }
    }

    fn opendir(&mut self, id: u32, path: String) -> impl Future<Output = Reply<Handle>> + Send {
        let result = self.do_opendir(&path).map(|handle| Handle { id, handle });
        async move { result }
    }

    fn readdir(&mut self, id: u32, handle: String) -> impl Future<Output = Reply<Name>> + Send {
        let result = self.do_readdir(&handle).map(|files| Name { id, files });
        async move { result }
    }

    fn mkdir(
        &mut self,
        id: u32,
        path: String,
        _attrs: FileAttributes,
    ) -> impl Future<Output = Reply<Status>> + Send {
        let result = self.do_mkdir(&path).map(|()| ok(id));
        async move { result }
    }

    fn rmdir(&mut self, id: u32, path: String) -> impl Future<Output = Reply<Status>> + Send {
        let result = self.do_rmdir(&path).map(|()| ok(id));
        async move { result }
    }

    fn remove(&mut self, id: u32, filename: String) -> impl Future<Output = Reply<Status>> + Send {
        let result = self.do_remove(&filename).map(|()| ok(id));
        async move { result }
    }

    fn rename(
        &mut self,
        id: u32,
        oldpath: String,
        newpath: String,
    ) -> impl Future<Output = Reply<Status>> + Send {
        let result = self.do_rename(&oldpath, &newpath).map(|()| ok(id));
        async move { result }
    }

    fn realpath(&mut self, id: u32, path: String) -> impl Future<Output = Reply<Name>> + Send {
        let path = normalize(&path);
        async move {
            Ok(Name {
                id,
                files: vec![File {
                    filename: path.clone(),
                    longname: path,
                    attrs: FileAttributes::default(),
                }],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_normalize_to_absolute() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("a//b/"), "/a/b");
        assert_eq!(parent("/a/b"), "/a");
        assert_eq!(parent("/a"), "/");
    }

    #[test]
    fn tree_helpers() {
        let server = MemoryServer::new("p");
        server.add_dir("/d");
        server.add_file("/d/f", b"x");
        assert!(server.exists("/d/"));
        assert_eq!(server.contents("/d/f").unwrap(), b"x");
        assert!(server.contents("/d").is_none());
    }
}
