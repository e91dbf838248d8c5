use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use codeq::error_context_ext::ErrorContextExt;
use codeq::Decode;
use codeq::Encode;
use log::info;

use crate::codec::RecordCodec;
use crate::types::Index;
use crate::types::NodeId;
use crate::types::Term;
use crate::Config;

/// Raft state that must survive a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaftMeta {
    pub term: Term,
    pub voted_for: Option<NodeId>,

    /// The last index covered by a snapshot; records up to it may be gone
    /// from the journal.
    pub snapshot_index: Index,
    pub snapshot_term: Term,
}

impl codeq::Encode for RaftMeta {
    fn encode<W: io::Write>(&self, mut w: W) -> Result<usize, io::Error> {
        let mut n = 0;

        let ver = 1u8;
        n += ver.encode(&mut w)?;

        n += self.term.encode(&mut w)?;
        n += self.voted_for.encode(&mut w)?;
        n += self.snapshot_index.encode(&mut w)?;
        n += self.snapshot_term.encode(&mut w)?;

        Ok(n)
    }
}

impl codeq::Decode for RaftMeta {
    fn decode<R: io::Read>(mut r: R) -> Result<Self, io::Error> {
        let ver: u8 = codeq::Decode::decode(&mut r)?;

        match ver {
            1 => Ok(Self {
                term: codeq::Decode::decode(&mut r)?,
                voted_for: codeq::Decode::decode(&mut r)?,
                snapshot_index: codeq::Decode::decode(&mut r)?,
                snapshot_term: codeq::Decode::decode(&mut r)?,
            }),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported raft meta version: {}", ver),
            )),
        }
    }
}

/// Stores [`RaftMeta`] in a single file, replaced atomically on every update.
///
/// The file is the encoded meta followed by a u64 checksum of it.
#[derive(Debug)]
pub struct MetaStore {
    path: String,
    meta: RaftMeta,
}

impl MetaStore {
    pub fn open(config: &Config) -> Result<Self, io::Error> {
        let path = config.meta_path();

        let meta = match fs::read(&path) {
            Ok(buf) => Self::decode_file(&buf)
                .context(|| format!("load raft meta from {}", path))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                RaftMeta::default()
            }
            Err(e) => {
                return Err(io::Error::new(
                    e.kind(),
                    format!("read raft meta from {}: {}", path, e),
                ));
            }
        };

        info!("Raft meta loaded from {}: {:?}", path, meta);

        Ok(Self { path, meta })
    }

    pub fn meta(&self) -> &RaftMeta {
        &self.meta
    }

    /// Durably replace the stored meta. Nothing is written if it is unchanged.
    pub fn store(&mut self, meta: RaftMeta) -> Result<(), io::Error> {
        if meta == self.meta {
            return Ok(());
        }

        let buf = Self::encode_file(&meta)?;
        let tmp = format!("{}.tmp", self.path);

        {
            let mut f = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)
                .context(|| format!("create {}", tmp))?;
            f.write_all(&buf).context(|| format!("write {}", tmp))?;
            f.sync_all().context(|| format!("sync {}", tmp))?;
        }

        fs::rename(&tmp, &self.path)
            .context(|| format!("rename {} to {}", tmp, self.path))?;
        Self::sync_dir(&self.path)?;

        self.meta = meta;
        Ok(())
    }

    #[cfg(unix)]
    fn sync_dir(path: &str) -> Result<(), io::Error> {
        let dir = std::path::Path::new(path)
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."));
        fs::File::open(dir)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_dir(_path: &str) -> Result<(), io::Error> {
        Ok(())
    }

    fn encode_file(meta: &RaftMeta) -> Result<Vec<u8>, io::Error> {
        let mut buf = Vec::new();
        meta.encode(&mut buf)?;

        let mut checksum = [0u8; 8];
        BigEndian::write_u64(&mut checksum, RecordCodec::checksum(&buf));
        buf.extend_from_slice(&checksum);
        Ok(buf)
    }

    fn decode_file(buf: &[u8]) -> Result<RaftMeta, io::Error> {
        if buf.len() < 8 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("raft meta file is too short: {} bytes", buf.len()),
            ));
        }

        let (body, tail) = buf.split_at(buf.len() - 8);
        let expected = BigEndian::read_u64(tail);
        let actual = RecordCodec::checksum(body);
        if expected != actual {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "raft meta checksum mismatch: expected {:#010x}, actual {:#010x}",
                    expected, actual
                ),
            ));
        }

        RaftMeta::decode(body)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;

    use pretty_assertions::assert_eq;

    use super::MetaStore;
    use super::RaftMeta;
    use crate::tests::context::TestContext;

    #[test]
    fn test_meta_store_reopen() -> Result<(), io::Error> {
        let ctx = TestContext::new()?;

        {
            let store = MetaStore::open(&ctx.config)?;
            assert_eq!(store.meta(), &RaftMeta::default());
        }

        let meta = RaftMeta {
            term: 3,
            voted_for: Some(2),
            snapshot_index: 10,
            snapshot_term: 2,
        };

        {
            let mut store = MetaStore::open(&ctx.config)?;
            store.store(meta)?;
            assert_eq!(store.meta(), &meta);
        }

        let store = MetaStore::open(&ctx.config)?;
        assert_eq!(store.meta(), &meta);

        Ok(())
    }

    #[test]
    fn test_meta_store_damaged() -> Result<(), io::Error> {
        let ctx = TestContext::new()?;

        {
            let mut store = MetaStore::open(&ctx.config)?;
            store.store(RaftMeta {
                term: 1,
                ..Default::default()
            })?;
        }

        let path = ctx.config.meta_path();
        let mut buf = fs::read(&path)?;
        buf[3] ^= 0xff;
        fs::write(&path, &buf)?;

        let err = MetaStore::open(&ctx.config).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        Ok(())
    }
}
