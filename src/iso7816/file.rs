//! Dedicated files and the tree they form below the master file.
//!
//! Files live in a fixed-size arena; every file links to its first child
//! and its next sibling, so a parent owns the chain of its children and
//! the tree can be walked without recursion.

use heapless::Vec;

use super::tlv::{self, BufferFull};

pub type FileId = [u8; 2];

pub const MASTER_FILE_ID: FileId = [0x3F, 0x00];
pub const MAX_NAME_LEN: usize = 16;

/// Enough for `6F 1B 82 01 38 83 02 xx xx 84 10 <16 bytes>`.
pub const MAX_FCI_LEN: usize = 2 + 3 + 4 + 2 + MAX_NAME_LEN;

pub const TAG_FCI_TEMPLATE: u8 = 0x6F;
pub const TAG_FILE_DESCRIPTOR: u8 = 0x82;
pub const TAG_FILE_IDENTIFIER: u8 = 0x83;
pub const TAG_DF_NAME: u8 = 0x84;

/// File descriptor byte of a DF: not shareable, dedicated file.
pub const DESCRIPTOR_DF: u8 = 0x38;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileError {
    NameTooLong,
    /// A sibling already uses this file identifier.
    DuplicateFileId,
    /// The parent reference does not belong to this tree.
    UnknownParent,
    /// No room left in the arena.
    TooManyFiles,
}

/// Handle to a file inside a [`FileSystem`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FileRef(usize);

#[derive(Clone, Debug)]
pub struct DedicatedFile {
    id: FileId,
    name: Vec<u8, MAX_NAME_LEN>,
    parent: Option<FileRef>,
    first_child: Option<FileRef>,
    next_sibling: Option<FileRef>,
}

impl DedicatedFile {
    fn new(id: FileId, parent: Option<FileRef>) -> Self {
        Self {
            id,
            name: Vec::new(),
            parent,
            first_child: None,
            next_sibling: None,
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    /// The DF name, empty when none was set.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn parent(&self) -> Option<FileRef> {
        self.parent
    }

    pub fn is_master_file(&self) -> bool {
        self.parent.is_none()
    }
}

/// A tree of up to `N` dedicated files rooted at the master file.
#[derive(Clone, Debug)]
pub struct FileSystem<const N: usize> {
    files: Vec<DedicatedFile, N>,
}

impl<const N: usize> Default for FileSystem<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FileSystem<N> {
    /// Creates a tree holding only the master file `3F00`.
    pub fn new() -> Self {
        let mut files = Vec::new();
        // N == 0 leaves an empty tree, `master_file` then refers to nothing
        files.push(DedicatedFile::new(MASTER_FILE_ID, None)).ok();
        Self { files }
    }

    pub fn master_file(&self) -> FileRef {
        FileRef(0)
    }

    pub fn get(&self, file: FileRef) -> Option<&DedicatedFile> {
        self.files.get(file.0)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Creates a DF below `parent`, optionally with a DF name.
    pub fn create_dedicated_file(
        &mut self,
        parent: FileRef,
        id: FileId,
        name: Option<&[u8]>,
    ) -> Result<FileRef, FileError> {
        let name = match name {
            Some(name) => Vec::from_slice(name).map_err(|_| FileError::NameTooLong)?,
            None => Vec::new(),
        };
        if self.get(parent).is_none() {
            return Err(FileError::UnknownParent);
        }
        if self.children(parent).any(|child| self.files[child.0].id == id) {
            return Err(FileError::DuplicateFileId);
        }

        let new = FileRef(self.files.len());
        let mut file = DedicatedFile::new(id, Some(parent));
        file.name = name;
        self.files.push(file).map_err(|_| FileError::TooManyFiles)?;

        // append to the end of the sibling chain, children stay in creation order
        let last = self.children(parent).last();
        match last {
            Some(last) => self.files[last.0].next_sibling = Some(new),
            None => self.files[parent.0].first_child = Some(new),
        }
        Ok(new)
    }

    pub fn children(&self, parent: FileRef) -> Children<'_, N> {
        Children {
            files: self,
            next: self.get(parent).and_then(|file| file.first_child),
        }
    }

    /// Depth-first, pre-order walk of the subtree rooted at `root`.
    pub fn walk(&self, root: FileRef) -> Walk<'_, N> {
        Walk {
            files: self,
            root,
            next: self.get(root).map(|_| root),
        }
    }

    pub fn select_by_file_id(&self, root: FileRef, id: &[u8]) -> Option<FileRef> {
        self.walk(root).find(|file| self.files[file.0].id[..] == *id)
    }

    /// Finds a DF whose name equals `name` exactly. Files without a name never match.
    pub fn select_by_name(&self, root: FileRef, name: &[u8]) -> Option<FileRef> {
        if name.is_empty() {
            return None;
        }
        self.walk(root).find(|file| self.files[file.0].name[..] == *name)
    }

    /// Appends the FCI template of `file` to `buffer`, returns the bytes written.
    ///
    /// On `BufferFull` nothing is appended.
    pub fn build_fci<const M: usize>(
        &self,
        file: FileRef,
        buffer: &mut Vec<u8, M>,
    ) -> Result<usize, BufferFull> {
        // an unknown reference has no FCI to render
        let file = self.get(file).ok_or(BufferFull)?;

        let mut fcp = Vec::<u8, MAX_FCI_LEN>::new();
        tlv::append_integer(&mut fcp, TAG_FILE_DESCRIPTOR, DESCRIPTOR_DF)?;
        tlv::append_array(&mut fcp, TAG_FILE_IDENTIFIER, &file.id)?;
        if !file.name.is_empty() {
            tlv::append_array(&mut fcp, TAG_DF_NAME, &file.name)?;
        }

        tlv::append_array(buffer, TAG_FCI_TEMPLATE, &fcp)
    }
}

pub struct Children<'a, const N: usize> {
    files: &'a FileSystem<N>,
    next: Option<FileRef>,
}

impl<const N: usize> Iterator for Children<'_, N> {
    type Item = FileRef;

    fn next(&mut self) -> Option<FileRef> {
        let current = self.next?;
        self.next = self.files.files[current.0].next_sibling;
        Some(current)
    }
}

pub struct Walk<'a, const N: usize> {
    files: &'a FileSystem<N>,
    root: FileRef,
    next: Option<FileRef>,
}

impl<const N: usize> Iterator for Walk<'_, N> {
    type Item = FileRef;

    fn next(&mut self) -> Option<FileRef> {
        let current = self.next?;
        let files = &self.files.files;

        self.next = match files[current.0].first_child {
            Some(child) => Some(child),
            None => {
                // climb until a sibling exists, never leaving the subtree
                let mut node = current;
                loop {
                    if node == self.root {
                        break None;
                    }
                    if let Some(sibling) = files[node.0].next_sibling {
                        break Some(sibling);
                    }
                    match files[node.0].parent {
                        Some(parent) => node = parent,
                        None => break None,
                    }
                }
            }
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (FileSystem<8>, FileRef, FileRef, FileRef) {
        let mut files = FileSystem::new();
        let mf = files.master_file();
        let a = files.create_dedicated_file(mf, [0x10, 0x00], Some(b"alpha")).unwrap();
        let b = files.create_dedicated_file(a, [0x10, 0x01], None).unwrap();
        let c = files.create_dedicated_file(mf, [0x20, 0x00], Some(b"gamma")).unwrap();
        (files, a, b, c)
    }

    #[test]
    fn master_file_selects_itself() {
        let files = FileSystem::<4>::new();
        let mf = files.master_file();
        assert_eq!(files.select_by_file_id(mf, &MASTER_FILE_ID), Some(mf));
        assert!(files.get(mf).unwrap().is_master_file());
    }

    #[test]
    fn walk_is_depth_first() {
        let (files, a, b, c) = tree();
        let mf = files.master_file();
        let order: Vec<FileRef, 8> = files.walk(mf).collect();
        assert_eq!(&order[..], &[mf, a, b, c]);

        let sub: Vec<FileRef, 8> = files.walk(a).collect();
        assert_eq!(&sub[..], &[a, b]);
    }

    #[test]
    fn select_by_id_and_name() {
        let (files, a, b, c) = tree();
        let mf = files.master_file();
        assert_eq!(files.select_by_file_id(mf, &[0x10, 0x01]), Some(b));
        assert_eq!(files.select_by_file_id(mf, &[0x20, 0x00]), Some(c));
        assert_eq!(files.select_by_file_id(a, &[0x20, 0x00]), None);
        assert_eq!(files.select_by_file_id(mf, &[0x10]), None);

        assert_eq!(files.select_by_name(mf, b"alpha"), Some(a));
        assert_eq!(files.select_by_name(mf, b"gamma"), Some(c));
        assert_eq!(files.select_by_name(mf, b"gam"), None);
        assert_eq!(files.select_by_name(mf, b""), None);
    }

    #[test]
    fn name_too_long_is_rejected() {
        let mut files = FileSystem::<4>::new();
        let mf = files.master_file();
        let name = [b'x'; MAX_NAME_LEN + 1];
        assert_eq!(
            files.create_dedicated_file(mf, [0x10, 0x00], Some(&name)),
            Err(FileError::NameTooLong)
        );
        assert_eq!(files.len(), 1);
        assert!(files
            .create_dedicated_file(mf, [0x10, 0x00], Some(&name[..MAX_NAME_LEN]))
            .is_ok());
    }

    #[test]
    fn sibling_ids_are_unique() {
        let (mut files, a, _, _) = tree();
        let mf = files.master_file();
        assert_eq!(
            files.create_dedicated_file(mf, [0x10, 0x00], None),
            Err(FileError::DuplicateFileId)
        );
        // same id below a different parent is fine
        assert!(files.create_dedicated_file(a, [0x20, 0x00], None).is_ok());
    }

    #[test]
    fn arena_capacity_is_enforced() {
        let mut files = FileSystem::<2>::new();
        let mf = files.master_file();
        files.create_dedicated_file(mf, [0x10, 0x00], None).unwrap();
        assert_eq!(
            files.create_dedicated_file(mf, [0x20, 0x00], None),
            Err(FileError::TooManyFiles)
        );
        assert_eq!(
            files.create_dedicated_file(FileRef(7), [0x20, 0x00], None),
            Err(FileError::UnknownParent)
        );
    }

    #[test]
    fn fci_of_master_file() {
        let files = FileSystem::<1>::new();
        let mut buffer = Vec::<u8, 32>::new();
        assert_eq!(files.build_fci(files.master_file(), &mut buffer), Ok(9));
        assert_eq!(
            &buffer[..],
            &[0x6F, 0x07, 0x82, 0x01, 0x38, 0x83, 0x02, 0x3F, 0x00]
        );
    }

    #[test]
    fn fci_carries_name_when_set() {
        let (files, a, _, _) = tree();
        let mut buffer = Vec::<u8, 32>::new();
        files.build_fci(a, &mut buffer).unwrap();
        assert_eq!(
            &buffer[..],
            &[
                0x6F, 0x0E, 0x82, 0x01, 0x38, 0x83, 0x02, 0x10, 0x00, 0x84, 0x05, b'a', b'l',
                b'p', b'h', b'a'
            ]
        );
    }

    #[test]
    fn fci_does_not_overflow() {
        let files = FileSystem::<1>::new();
        let mut buffer = Vec::<u8, 8>::new();
        assert_eq!(files.build_fci(files.master_file(), &mut buffer), Err(BufferFull));
        assert!(buffer.is_empty());
    }
}
