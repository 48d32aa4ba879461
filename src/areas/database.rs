use crate::artifacts::diff::content::ObjectStore;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};

/// Loose object storage under `.git/objects`
#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

// TODO: read packfiles so objects fetched by real git are visible too
impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// The decompressed object, header included
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(object_id.to_path());

        self.read_object(object_path)
    }

    pub fn store(&self, object: impl Object) -> anyhow::Result<ObjectId> {
        let object_id = object.object_id()?;
        let object_path = self.path.join(object_id.to_path());
        let object_content = object.serialize()?;

        // objects are immutable, an existing file already holds this content
        if !object_path.exists() {
            std::fs::create_dir_all(
                object_path
                    .parent()
                    .context(format!("Invalid object path {}", object_path.display()))?,
            )
            .context(format!(
                "Unable to create object directory {}",
                object_path.display()
            ))?;

            self.write_object(object_path, object_content)?;
        }

        Ok(object_id)
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let (object_type, content) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(Some(Blob::new(content))),
            _ => Ok(None),
        }
    }

    /// Object type and content with the header stripped. The content is a
    /// view of the decompressed object, not a copy.
    fn parse_object_as_bytes(&self, object_id: &ObjectId) -> anyhow::Result<(ObjectType, Bytes)> {
        let object_content = self.load(object_id)?;
        let mut object_reader = Cursor::new(&object_content[..]);

        let (object_type, size) = ObjectType::parse_header(&mut object_reader)
            .context(format!("Corrupt object header for {object_id}"))?;
        let start = object_reader.position() as usize;

        if (object_content.len() - start) as u64 != size {
            anyhow::bail!(
                "Object {object_id} declares {size} bytes but holds {}",
                object_content.len() - start
            );
        }

        Ok((object_type, object_content.slice(start..)))
    }

    fn read_object(&self, object_path: PathBuf) -> anyhow::Result<Bytes> {
        let object_content = std::fs::read(&object_path).context(format!(
            "Unable to read object file {}",
            object_path.display()
        ))?;

        Self::decompress(object_content.into())
    }

    fn write_object(&self, object_path: PathBuf, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context(format!("Invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_object_path)
            .context(format!(
                "Unable to open object file {}",
                temp_object_path.display()
            ))?;

        file.write_all(&object_content).context(format!(
            "Unable to write object file {}",
            temp_object_path.display()
        ))?;

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, &object_path).context(format!(
            "Unable to rename object file to {}",
            object_path.display()
        ))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }
}

impl ObjectStore for Database {
    fn read(&self, oid: &ObjectId) -> anyhow::Result<Bytes> {
        match self.parse_object_as_bytes(oid)? {
            (ObjectType::Blob, content) => Ok(content),
            (object_type, _) => anyhow::bail!("Object {oid} is a {object_type}, not a blob"),
        }
    }

    /// Reads only as much of the object as its header needs
    fn size(&self, oid: &ObjectId) -> anyhow::Result<u64> {
        let object_path = self.path.join(oid.to_path());
        let file = std::fs::File::open(&object_path).context(format!(
            "Unable to read object file {}",
            object_path.display()
        ))?;
        let mut reader = BufReader::new(flate2::read::ZlibDecoder::new(file));

        let (_, size) = ObjectType::parse_header(&mut reader)
            .context(format!("Corrupt object header for {oid}"))?;

        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        (dir, database)
    }

    #[rstest]
    fn stored_blob_reads_back_without_header(database: (TempDir, Database)) {
        let (_dir, database) = database;

        let oid = database
            .store(Blob::new(Bytes::from_static(b"hello world\n")))
            .unwrap();

        assert_eq!(oid.as_ref(), "3b18e512dba79e4c8300dd08aeb37f8e728b8dad");
        assert!(database.exists(&oid));
        assert_eq!(database.read(&oid).unwrap(), Bytes::from_static(b"hello world\n"));
        assert_eq!(database.size(&oid).unwrap(), 12);
    }

    #[rstest]
    fn storing_twice_is_harmless(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let blob = Blob::new(Bytes::from_static(b"same"));

        let first = database.store(blob.clone()).unwrap();
        let second = database.store(blob).unwrap();

        assert_eq!(first, second);
    }

    #[rstest]
    fn store_leaves_no_temp_files_behind(database: (TempDir, Database)) {
        let (_dir, database) = database;

        let oid = database.store(Blob::new(Bytes::from_static(b"tidy\n"))).unwrap();

        let object_dir = database.path.join(&oid.as_ref()[..2]);
        let names: Vec<_> = std::fs::read_dir(&object_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![oid.as_ref()[2..].to_string()]);
    }

    #[rstest]
    fn temp_names_do_not_repeat() {
        let first = Database::generate_temp_name();
        let second = Database::generate_temp_name();

        assert!(first.starts_with("tmp-obj-"));
        assert_ne!(first, second);
    }

    #[rstest]
    fn missing_object_is_an_error(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let oid = ObjectId::try_parse("1111111111111111111111111111111111111111").unwrap();

        assert!(!database.exists(&oid));
        assert!(database.read(&oid).is_err());
        assert!(database.size(&oid).is_err());
    }
}
