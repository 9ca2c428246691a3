use std::path::{Path, PathBuf};

use super::compare::{validate_attr_length, AttrType};
use super::page::LeafHeader;
use crate::constants::DEFAULT_BUFFER_CAPACITY;
use crate::error::AmError;
use crate::pf::{PagedFile, ReplacementPolicy};

/// `"<base>.<indexNo>"`, per spec.md §6.
pub fn index_file_name<P: AsRef<Path>>(base: P, index_no: u32) -> PathBuf {
    let mut name = base.as_ref().as_os_str().to_owned();
    name.push(format!(".{}", index_no));
    PathBuf::from(name)
}

/// Create an index file: validates `attrType`/`attrLength`, writes page 0 as
/// a placeholder empty leaf, and closes the file. Both builders call this
/// before constructing the real tree.
pub fn create_index<P: AsRef<Path>>(
    base: P,
    index_no: u32,
    attr_type: char,
    attr_length: usize,
) -> Result<(), AmError> {
    AttrType::from_char(attr_type)?;
    validate_attr_length(attr_length)?;

    let path = index_file_name(base, index_no);
    PagedFile::create(&path)?;
    let mut pf = PagedFile::open(&path, DEFAULT_BUFFER_CAPACITY, ReplacementPolicy::Lru)?;
    let page = pf.alloc_page()?;
    LeafHeader::empty(attr_length as i32).write(&mut *page.bytes_mut());
    page.unpin(true)?;
    pf.close()?;
    Ok(())
}

/// An open index file: a `PagedFile` plus the attribute type/length every
/// page-format routine needs to interpret key bytes.
pub struct AmFileHandle {
    pf: PagedFile,
    attr_type: AttrType,
    attr_length: usize,
}

impl AmFileHandle {
    pub fn open<P: AsRef<Path>>(
        base: P,
        index_no: u32,
        attr_type: char,
        attr_length: usize,
    ) -> Result<Self, AmError> {
        let attr_type = AttrType::from_char(attr_type)?;
        validate_attr_length(attr_length)?;
        let path = index_file_name(base, index_no);
        let pf = PagedFile::open(&path, DEFAULT_BUFFER_CAPACITY, ReplacementPolicy::Lru)?;
        Ok(Self {
            pf,
            attr_type,
            attr_length,
        })
    }

    pub fn close(self) -> Result<(), AmError> {
        self.pf.close().map_err(Into::into)
    }

    pub fn pf(&mut self) -> &mut PagedFile {
        &mut self.pf
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn attr_length(&self) -> usize {
        self.attr_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_base(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("am_file_test_{}_{}", std::process::id(), name));
        p
    }

    #[test]
    fn index_file_name_appends_index_no() {
        let name = index_file_name("student", 3);
        assert_eq!(name.to_str().unwrap(), "student.3");
    }

    #[test]
    fn create_then_open_round_trip() {
        let base = temp_base("create_open");
        create_index(&base, 1, 'i', 4).unwrap();

        let mut am = AmFileHandle::open(&base, 1, 'i', 4).unwrap();
        assert_eq!(am.attr_type(), AttrType::Int);
        assert_eq!(am.attr_length(), 4);
        assert_eq!(am.pf().page_count(), 1);
        am.close().unwrap();

        let _ = PagedFile::destroy(index_file_name(&base, 1));
    }

    #[test]
    fn rejects_bad_attr_type() {
        let base = temp_base("bad_type");
        assert!(create_index(&base, 1, 'x', 4).is_err());
    }
}
