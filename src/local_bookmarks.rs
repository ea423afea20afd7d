//! Chromium-style bookmark file substrate.
//!
//! Stores the whole bookmark tree in a single JSON file (`roots` holding
//! folder nodes with nested `children`), read and rewritten wholesale on
//! every operation so that edits made outside this process are always
//! picked up. Listener dispatch happens synchronously after a successful
//! mutation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::substrate::{
    BookmarkEvent, BookmarkEventKind, BookmarkNode, BookmarkSubstrate, EventListener, ListenerId,
    SubstrateError, BOOKMARK_BAR_ID,
};

const OTHER_ROOT_ID: &str = "2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum NodeKind {
    Folder,
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileNode {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_added: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<FileNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BookmarkFile {
    version: u32,
    roots: HashMap<String, FileNode>,
}

impl BookmarkFile {
    fn empty() -> Self {
        let mut roots = HashMap::new();
        roots.insert(
            "bookmark_bar".to_string(),
            FileNode {
                id: BOOKMARK_BAR_ID.to_string(),
                name: "Bookmarks bar".to_string(),
                kind: NodeKind::Folder,
                url: None,
                date_added: None,
                children: Vec::new(),
            },
        );
        roots.insert(
            "other".to_string(),
            FileNode {
                id: OTHER_ROOT_ID.to_string(),
                name: "Other bookmarks".to_string(),
                kind: NodeKind::Folder,
                url: None,
                date_added: None,
                children: Vec::new(),
            },
        );
        Self { version: 1, roots }
    }

    fn root_ids(&self) -> Vec<&str> {
        self.roots.values().map(|n| n.id.as_str()).collect()
    }
}

struct ListenerTable {
    next_id: u64,
    entries: HashMap<u64, (BookmarkEventKind, EventListener)>,
}

/// File-backed bookmark substrate.
pub struct LocalBookmarkFile {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process. External
    // writers are handled by re-reading the file on every operation.
    io_lock: Mutex<()>,
    listeners: Mutex<ListenerTable>,
}

impl LocalBookmarkFile {
    /// Open the substrate at `path`, creating an empty bookmark file
    /// (root folders only) when none exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            let file = BookmarkFile::empty();
            let data = serde_json::to_string_pretty(&file)?;
            std::fs::write(&path, data)
                .with_context(|| format!("Failed to initialize bookmark file {:?}", path))?;
            debug!("Initialized bookmark file at {:?}", path);
        }

        Ok(Self {
            path,
            io_lock: Mutex::new(()),
            listeners: Mutex::new(ListenerTable {
                next_id: 0,
                entries: HashMap::new(),
            }),
        })
    }

    fn load(&self) -> Result<BookmarkFile> {
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read bookmark file {:?}", self.path))?;
        let file: BookmarkFile = serde_json::from_str(&data)
            .map_err(|e| SubstrateError::Corrupt(e.to_string()))?;
        Ok(file)
    }

    fn save(&self, file: &BookmarkFile) -> Result<()> {
        let data = serde_json::to_string_pretty(file)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("Failed to write bookmark file {:?}", self.path))?;
        Ok(())
    }

    fn emit(&self, kind: BookmarkEventKind, id: &str) {
        let callbacks: Vec<EventListener> = {
            let table = self.listeners.lock().expect("listener table poisoned");
            table
                .entries
                .values()
                .filter(|(k, _)| *k == kind)
                .map(|(_, listener)| listener.clone())
                .collect()
        };

        let event = BookmarkEvent {
            kind,
            id: id.to_string(),
        };
        for callback in callbacks {
            callback(&event);
        }
    }
}

/// Next unused numeric id. Root ids 1 and 2 are reserved.
fn next_id(file: &BookmarkFile) -> u64 {
    fn walk(node: &FileNode, max: &mut u64) {
        if let Ok(n) = node.id.parse::<u64>() {
            *max = (*max).max(n);
        }
        for child in &node.children {
            walk(child, max);
        }
    }

    let mut max = 2;
    for root in file.roots.values() {
        walk(root, &mut max);
    }
    max + 1
}

fn find_node<'a>(file: &'a BookmarkFile, id: &str) -> Option<(&'a FileNode, Option<&'a str>)> {
    fn walk<'a>(
        node: &'a FileNode,
        parent: Option<&'a str>,
        id: &str,
    ) -> Option<(&'a FileNode, Option<&'a str>)> {
        if node.id == id {
            return Some((node, parent));
        }
        for child in &node.children {
            if let Some(found) = walk(child, Some(node.id.as_str()), id) {
                return Some(found);
            }
        }
        None
    }

    file.roots.values().find_map(|root| walk(root, None, id))
}

fn find_folder_mut<'a>(file: &'a mut BookmarkFile, id: &str) -> Option<&'a mut FileNode> {
    fn walk<'a>(node: &'a mut FileNode, id: &str) -> Option<&'a mut FileNode> {
        if node.id == id {
            return Some(node);
        }
        for child in &mut node.children {
            if let Some(found) = walk(child, id) {
                return Some(found);
            }
        }
        None
    }

    file.roots.values_mut().find_map(|root| walk(root, id))
}

/// Detach a node from wherever it currently sits. Root folders cannot be
/// detached.
fn detach_node(file: &mut BookmarkFile, id: &str) -> Option<FileNode> {
    fn walk(node: &mut FileNode, id: &str) -> Option<FileNode> {
        if let Some(pos) = node.children.iter().position(|c| c.id == id) {
            return Some(node.children.remove(pos));
        }
        for child in &mut node.children {
            if let Some(found) = walk(child, id) {
                return Some(found);
            }
        }
        None
    }

    file.roots.values_mut().find_map(|root| walk(root, id))
}

fn to_bookmark_node(node: &FileNode, parent_id: Option<&str>) -> BookmarkNode {
    BookmarkNode {
        id: node.id.clone(),
        parent_id: parent_id.map(|p| p.to_string()),
        title: node.name.clone(),
        url: node.url.clone(),
        folder: node.kind == NodeKind::Folder,
        date_added: node.date_added,
    }
}

#[async_trait]
impl BookmarkSubstrate for LocalBookmarkFile {
    async fn search(&self, title: &str) -> Result<Vec<BookmarkNode>> {
        let _guard = self.io_lock.lock().expect("io lock poisoned");
        let file = self.load()?;

        fn walk(node: &FileNode, parent: Option<&str>, title: &str, out: &mut Vec<BookmarkNode>) {
            if node.name == title {
                out.push(to_bookmark_node(node, parent));
            }
            for child in &node.children {
                walk(child, Some(node.id.as_str()), title, out);
            }
        }

        let mut matches = Vec::new();
        for root in file.roots.values() {
            walk(root, None, title, &mut matches);
        }
        // Root iteration order comes from a map; keep results stable.
        matches.sort_by(|a, b| {
            let an = a.id.parse::<u64>().unwrap_or(u64::MAX);
            let bn = b.id.parse::<u64>().unwrap_or(u64::MAX);
            an.cmp(&bn)
        });
        Ok(matches)
    }

    async fn get(&self, id: &str) -> Result<BookmarkNode> {
        let _guard = self.io_lock.lock().expect("io lock poisoned");
        let file = self.load()?;
        let (node, parent) =
            find_node(&file, id).ok_or_else(|| SubstrateError::NotFound(id.to_string()))?;
        Ok(to_bookmark_node(node, parent))
    }

    async fn create(
        &self,
        parent_id: &str,
        title: &str,
        url: Option<&str>,
    ) -> Result<BookmarkNode> {
        let created = {
            let _guard = self.io_lock.lock().expect("io lock poisoned");
            let mut file = self.load()?;
            let id = next_id(&file).to_string();
            let node = FileNode {
                id: id.clone(),
                name: title.to_string(),
                kind: if url.is_some() {
                    NodeKind::Url
                } else {
                    NodeKind::Folder
                },
                url: url.map(|u| u.to_string()),
                date_added: Some(chrono::Utc::now().timestamp_millis()),
                children: Vec::new(),
            };

            let parent = find_folder_mut(&mut file, parent_id)
                .ok_or_else(|| SubstrateError::NotFound(parent_id.to_string()))?;
            if parent.kind != NodeKind::Folder {
                anyhow::bail!("Cannot create a bookmark under non-folder node {}", parent_id);
            }
            let result = to_bookmark_node(&node, Some(parent_id));
            parent.children.push(node);
            self.save(&file)?;
            debug!("Created bookmark node {} under {}", id, parent_id);
            result
        };

        self.emit(BookmarkEventKind::Created, &created.id);
        Ok(created)
    }

    async fn move_node(&self, id: &str, new_parent_id: &str) -> Result<BookmarkNode> {
        let moved = {
            let _guard = self.io_lock.lock().expect("io lock poisoned");
            let mut file = self.load()?;

            if file.root_ids().contains(&id) {
                anyhow::bail!("Cannot move root folder {}", id);
            }
            if find_folder_mut(&mut file, new_parent_id).is_none() {
                return Err(SubstrateError::NotFound(new_parent_id.to_string()).into());
            }

            let node =
                detach_node(&mut file, id).ok_or_else(|| SubstrateError::NotFound(id.to_string()))?;
            let result = to_bookmark_node(&node, Some(new_parent_id));
            let parent = find_folder_mut(&mut file, new_parent_id)
                .ok_or_else(|| SubstrateError::NotFound(new_parent_id.to_string()))?;
            parent.children.push(node);
            self.save(&file)?;
            debug!("Moved bookmark node {} to {}", id, new_parent_id);
            result
        };

        self.emit(BookmarkEventKind::Moved, id);
        Ok(moved)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let removed = {
            let _guard = self.io_lock.lock().expect("io lock poisoned");
            let mut file = self.load()?;

            if file.root_ids().contains(&id) {
                anyhow::bail!("Cannot remove root folder {}", id);
            }

            match detach_node(&mut file, id) {
                Some(_) => {
                    self.save(&file)?;
                    debug!("Removed bookmark node {}", id);
                    true
                }
                None => false,
            }
        };

        if removed {
            self.emit(BookmarkEventKind::Removed, id);
        }
        Ok(removed)
    }

    async fn children(&self, folder_id: &str) -> Result<Vec<BookmarkNode>> {
        let _guard = self.io_lock.lock().expect("io lock poisoned");
        let file = self.load()?;
        let (node, _) = find_node(&file, folder_id)
            .ok_or_else(|| SubstrateError::NotFound(folder_id.to_string()))?;
        Ok(node
            .children
            .iter()
            .map(|child| to_bookmark_node(child, Some(folder_id)))
            .collect())
    }

    fn add_listener(&self, kind: BookmarkEventKind, listener: EventListener) -> ListenerId {
        let mut table = self.listeners.lock().expect("listener table poisoned");
        let id = table.next_id;
        table.next_id += 1;
        table.entries.insert(id, (kind, listener));
        ListenerId(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        let mut table = self.listeners.lock().expect("listener table poisoned");
        table.entries.remove(&id.0);
    }
}
