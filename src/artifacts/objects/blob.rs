//! Git blob object
//!
//! Blobs store raw file content. Unlike the other object kinds they are kept
//! as bytes: diff content may be binary and must not be forced through UTF-8.
//!
//! ## Format
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use bytes::{BufMut, Bytes, BytesMut};
use derive_new::new;

#[derive(Debug, Clone, new)]
pub struct Blob {
    content: Bytes,
}

impl Blob {
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }
}

impl Packable for Blob {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let header = format!("{} {}\0", self.object_type().as_str(), self.content.len());

        let mut blob_bytes = BytesMut::with_capacity(header.len() + self.content.len());
        blob_bytes.put_slice(header.as_bytes());
        blob_bytes.put_slice(&self.content);

        Ok(blob_bytes.freeze())
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }
}

/// Hash raw content the way it would be stored as a blob
pub fn hash_blob(content: &[u8]) -> anyhow::Result<ObjectId> {
    Blob::new(Bytes::copy_from_slice(content)).object_id()
}
